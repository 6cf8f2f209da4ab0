//! WASAPI call failures and their mapping onto `CaptureError`.

use audio_rec_core::CaptureError;

/// A failed COM / WASAPI call.
#[derive(Debug, thiserror::Error)]
pub enum WasapiError {
    #[error("{call} failed: {source}")]
    Call {
        call: &'static str,
        #[source]
        source: windows::core::Error,
    },
    #[error("no capture endpoint available")]
    NoEndpoint,
}

impl From<WasapiError> for CaptureError {
    fn from(error: WasapiError) -> Self {
        match error {
            WasapiError::NoEndpoint => CaptureError::DeviceUnavailable,
            WasapiError::Call { call, source } => {
                CaptureError::ConfigurationFailed(format!("{}: {}", call, source))
            }
        }
    }
}

/// Attach the name of the failing call to a `windows::core::Result`.
pub(crate) trait WasapiResultExt<T> {
    fn call(self, call: &'static str) -> Result<T, WasapiError>;
}

impl<T> WasapiResultExt<T> for windows::core::Result<T> {
    fn call(self, call: &'static str) -> Result<T, WasapiError> {
        self.map_err(|source| WasapiError::Call { call, source })
    }
}
