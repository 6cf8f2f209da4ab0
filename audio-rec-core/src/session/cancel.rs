use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::error::CaptureError;

/// Cancels a pending device request.
///
/// Clones share one flag, so a UI thread can cancel while the session's
/// thread is blocked inside `DeviceStreamProvider::acquire`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(CaptureError::Cancelled)` once cancelled.
    pub fn check(&self) -> Result<(), CaptureError> {
        if self.is_cancelled() {
            Err(CaptureError::Cancelled)
        } else {
            Ok(())
        }
    }
}
