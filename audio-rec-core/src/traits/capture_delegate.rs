use crate::models::artifact::ArtifactReady;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Subscriber for capture session notifications.
///
/// All methods are called synchronously on the thread that drives the
/// session. Implementations should marshal to a UI thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, _state: CaptureState) {}

    /// Called when an attempt fails. The session is already idle.
    fn on_error(&self, _error: &CaptureError) {}

    /// Called once per completed cycle, after the session returned to idle.
    fn on_artifact_ready(&self, _ready: &ArtifactReady) {}
}
