use thiserror::Error;

/// Errors that can occur while acquiring, recording or finalizing audio.
///
/// Errors that end an attempt (acquisition, encoder and device failures,
/// a finalize timeout) leave the session in `Idle` with no partial artifact.
/// `InvalidState` from a rejected call, and `Timeout` from waiting on a
/// recording that is still running, leave the session where it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("device not available")]
    DeviceUnavailable,

    #[error("encoder failure: {0}")]
    EncoderFailure(String),

    #[error("device request cancelled")]
    Cancelled,

    #[error("another capture session is already active")]
    SessionBusy,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("timeout")]
    Timeout,

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Whether the error came from the device request rather than from
    /// an already-running recording.
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::DeviceUnavailable | Self::Cancelled | Self::SessionBusy
        )
    }
}
