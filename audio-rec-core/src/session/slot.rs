use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::models::error::CaptureError;

static GLOBAL_SLOT: OnceLock<SessionSlot> = OnceLock::new();

/// A slot only one capture session can occupy at a time.
///
/// Sessions claim their slot when leaving `Idle` and give it back on every
/// path that returns to `Idle`. `SessionSlot::global()` is shared by every
/// session in the process unless one is given a private slot.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    occupied: Arc<AtomicBool>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot.
    pub fn global() -> Self {
        GLOBAL_SLOT.get_or_init(SessionSlot::new).clone()
    }

    pub fn try_claim(&self) -> Result<SlotGuard, CaptureError> {
        self.occupied
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CaptureError::SessionBusy)?;
        Ok(SlotGuard {
            occupied: Arc::clone(&self.occupied),
        })
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::SeqCst)
    }
}

/// Occupancy of a `SessionSlot`; released on drop.
#[derive(Debug)]
pub struct SlotGuard {
    occupied: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.occupied.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_busy_until_guard_drops() {
        let slot = SessionSlot::new();
        let guard = slot.try_claim().unwrap();
        assert!(slot.is_occupied());
        assert_eq!(slot.try_claim().unwrap_err(), CaptureError::SessionBusy);

        drop(guard);
        assert!(!slot.is_occupied());
        assert!(slot.try_claim().is_ok());
    }

    #[test]
    fn global_slot_is_shared() {
        let a = SessionSlot::global();
        let b = SessionSlot::global();
        assert!(Arc::ptr_eq(&a.occupied, &b.occupied));
    }
}
