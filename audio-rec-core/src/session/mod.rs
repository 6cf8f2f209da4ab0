pub mod cancel;
pub mod capture;
pub mod slot;
