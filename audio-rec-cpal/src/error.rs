//! cpal failures and their mapping onto `CaptureError`.

use audio_rec_core::CaptureError;

/// A failed cpal call.
#[derive(Debug, thiserror::Error)]
pub enum CpalError {
    #[error("no default input device")]
    NoDefaultDevice,
    #[error("input device {0:?} not found")]
    DeviceNotFound(String),
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("failed to read the default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build the input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start the input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("input stream failed: {0}")]
    Stream(#[from] cpal::StreamError),
}

impl From<CpalError> for CaptureError {
    fn from(error: CpalError) -> Self {
        if let Some(description) = error.backend_description() {
            if mentions_permission(description) {
                return CaptureError::PermissionDenied;
            }
        }
        match error {
            CpalError::UnsupportedFormat(_)
            | CpalError::DefaultConfig(cpal::DefaultStreamConfigError::StreamTypeNotSupported)
            | CpalError::Build(cpal::BuildStreamError::StreamConfigNotSupported)
            | CpalError::Build(cpal::BuildStreamError::InvalidArgument) => {
                CaptureError::ConfigurationFailed(error.to_string())
            }
            _ => CaptureError::DeviceUnavailable,
        }
    }
}

impl CpalError {
    fn backend_description(&self) -> Option<&str> {
        let err = match self {
            CpalError::Devices(cpal::DevicesError::BackendSpecific { err })
            | CpalError::DefaultConfig(cpal::DefaultStreamConfigError::BackendSpecific { err })
            | CpalError::Build(cpal::BuildStreamError::BackendSpecific { err })
            | CpalError::Play(cpal::PlayStreamError::BackendSpecific { err })
            | CpalError::Stream(cpal::StreamError::BackendSpecific { err }) => err,
            _ => return None,
        };
        Some(&err.description)
    }
}

/// Hosts surface a blocked microphone as backend text, not a typed error.
fn mentions_permission(description: &str) -> bool {
    let description = description.to_ascii_lowercase();
    ["permission", "denied", "not authorized", "not permitted"]
        .iter()
        .any(|needle| description.contains(needle))
}
