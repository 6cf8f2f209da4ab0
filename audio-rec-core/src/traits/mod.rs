pub mod capture_delegate;
pub mod device_provider;
pub mod encoder;
pub mod export_sink;
