//! The cell a runtime lives in between creation and teardown.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Holds the runtime until its handle count reaches zero, then stays empty.
///
/// A panic inside a bridge call poisons the lock, and the slot hands the
/// runtime out regardless. Finalizers unpin and release from `Drop`; refusing
/// them the runtime would leave the pin in the registry and the count stuck
/// above zero, so the runtime would never close.
pub(crate) struct RuntimeSlot<R>(Mutex<Option<R>>);

impl<R> RuntimeSlot<R> {
    pub(crate) const fn new(runtime: R) -> Self {
        Self(Mutex::new(Some(runtime)))
    }

    /// Lock the slot, recovering it from a poisoned lock
    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<R>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the runtime out for teardown
    pub(crate) fn take(&self) -> Option<R> {
        self.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn test_poisoned_slot_still_yields_runtime() {
        let slot = RuntimeSlot::new(7);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> u8 {
            let _guard = slot.lock();
            panic!("bridge call panicked");
        }));
        drop(outcome.unwrap_err());

        assert_eq!(*slot.lock(), Some(7));
        assert_eq!(slot.take(), Some(7));
        assert!(slot.take().is_none());
    }
}
