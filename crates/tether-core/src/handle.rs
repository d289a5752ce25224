//! Shared, counted ownership of one embedded runtime instance.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BridgeError, Result};
use crate::runtime::EmbeddedRuntime;
use crate::slot::RuntimeSlot;

/// Identity of a runtime instance, stable for the handle's whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

struct Shared<R> {
    id: HandleId,
    count: AtomicUsize,
    /// `None` once the count reached zero
    instance: RuntimeSlot<R>,
}

/// Reference-counted handle to an embedded runtime.
///
/// The runtime is alive exactly while the count is positive. [`acquire`]
/// and [`release`] are the only ways to move the count; the transition from
/// one to zero destroys the runtime synchronously and for good.
///
/// Every acquisition must be matched by exactly one release. Releasing twice
/// for the same acquisition is a caller bug; wrappers such as
/// [`ValueReference`](crate::ValueReference) and
/// [`BridgeObject`](crate::BridgeObject) make it impossible by construction.
///
/// [`acquire`]: RuntimeHandle::acquire
/// [`release`]: RuntimeHandle::release
pub struct RuntimeHandle<R> {
    shared: Arc<Shared<R>>,
}

impl<R: EmbeddedRuntime> RuntimeHandle<R> {
    /// Take ownership of a freshly created runtime. The count starts at one.
    pub fn new(runtime: R) -> Self {
        let id = HandleId::new();
        debug!(runtime = %id, "runtime created");
        Self {
            shared: Arc::new(Shared {
                id,
                count: AtomicUsize::new(1),
                instance: RuntimeSlot::new(runtime),
            }),
        }
    }

    /// Identity of the runtime behind this handle
    #[must_use]
    pub fn id(&self) -> HandleId {
        self.shared.id
    }

    /// Current number of acquisitions
    #[must_use]
    pub fn count(&self) -> usize {
        self.shared.count.load(Ordering::Acquire)
    }

    /// Check whether the runtime has not been destroyed yet
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.count() > 0
    }

    /// Check whether two handles share one runtime
    #[must_use]
    pub fn same_runtime(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Add an acquisition and return a handle sharing the same runtime.
    ///
    /// # Errors
    /// Returns `RuntimeDisposed` if the count already reached zero; a dead
    /// runtime is never resurrected.
    pub fn acquire(&self) -> Result<Self> {
        let previous = self
            .shared
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| match count {
                0 => None,
                live => live.checked_add(1),
            })
            .map_err(|_| BridgeError::RuntimeDisposed(self.id()))?;

        debug!(runtime = %self.id(), count = previous + 1, "runtime acquired");
        Ok(Self {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Drop one acquisition, destroying the runtime when it was the last.
    ///
    /// Returns the remaining count.
    ///
    /// # Errors
    /// Returns `RuntimeDisposed` if the count is already zero. The count never
    /// underflows.
    pub fn release(&self) -> Result<usize> {
        let previous = self
            .shared
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .map_err(|_| BridgeError::RuntimeDisposed(self.id()))?;

        let remaining = previous - 1;
        debug!(runtime = %self.id(), count = remaining, "runtime released");
        if remaining == 0 {
            self.destroy();
        }
        Ok(remaining)
    }

    /// Run `operation` with exclusive access to the live runtime.
    ///
    /// The runtime lock is held for the duration of `operation`. Do not drop
    /// bridge wrappers of the same runtime inside it.
    ///
    /// # Errors
    /// Returns `RuntimeDisposed` if the runtime was already destroyed
    pub fn with_runtime<T>(&self, operation: impl FnOnce(&mut R) -> T) -> Result<T> {
        let mut slot = self.shared.instance.lock();
        let runtime = slot
            .as_mut()
            .ok_or(BridgeError::RuntimeDisposed(self.shared.id))?;
        Ok(operation(runtime))
    }

    fn destroy(&self) {
        let instance = self.shared.instance.take();
        let Some(runtime) = instance else {
            return;
        };

        let leaked = runtime.registry().len();
        if leaked > 0 {
            warn!(
                runtime = %self.id(),
                leaked,
                "runtime destroyed while values were still pinned"
            );
        }
        runtime.close();
        debug!(runtime = %self.id(), "runtime destroyed");
    }
}

impl<R> fmt::Debug for RuntimeHandle<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RuntimeHandle")
            .field("id", &self.shared.id)
            .field("count", &self.shared.count.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRuntime;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn test_new_handle_starts_at_one() {
        let (runtime, closed) = MockRuntime::new();
        let handle = RuntimeHandle::new(runtime);

        assert_eq!(handle.count(), 1);
        assert!(handle.is_alive());
        assert_eq!(closed.get(), 0);
    }

    #[test]
    fn test_destroyed_exactly_on_last_release() {
        let (runtime, closed) = MockRuntime::new();
        let handle = RuntimeHandle::new(runtime);
        let second = handle.acquire().unwrap();
        let third = second.acquire().unwrap();
        assert_eq!(handle.count(), 3);

        assert_eq!(third.release().unwrap(), 2);
        assert_eq!(closed.get(), 0);
        assert_eq!(handle.release().unwrap(), 1);
        assert_eq!(closed.get(), 0);
        handle.with_runtime(|_| ()).unwrap();

        assert_eq!(second.release().unwrap(), 0);
        assert_eq!(closed.get(), 1);
        assert!(!handle.is_alive());
    }

    #[test]
    fn test_acquire_after_destroy_fails() {
        let (runtime, closed) = MockRuntime::new();
        let handle = RuntimeHandle::new(runtime);
        handle.release().unwrap();

        assert!(matches!(
            handle.acquire(),
            Err(BridgeError::RuntimeDisposed(id)) if id == handle.id()
        ));
        assert_eq!(handle.count(), 0);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_release_after_destroy_does_not_underflow() {
        let (runtime, closed) = MockRuntime::new();
        let handle = RuntimeHandle::new(runtime);
        handle.release().unwrap();

        assert!(matches!(
            handle.release(),
            Err(BridgeError::RuntimeDisposed(_))
        ));
        assert_eq!(handle.count(), 0);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_with_runtime_after_destroy_fails() {
        let (runtime, _closed) = MockRuntime::new();
        let handle = RuntimeHandle::new(runtime);
        handle.release().unwrap();

        assert!(matches!(
            handle.with_runtime(|_| ()),
            Err(BridgeError::RuntimeDisposed(_))
        ));
    }

    #[test]
    fn test_acquired_handles_share_runtime() {
        let (runtime, _closed) = MockRuntime::new();
        let handle = RuntimeHandle::new(runtime);
        let acquired = handle.acquire().unwrap();

        assert!(handle.same_runtime(&acquired));
        assert_eq!(handle.id(), acquired.id());

        let (other_runtime, _other_closed) = MockRuntime::new();
        let other = RuntimeHandle::new(other_runtime);
        assert!(!handle.same_runtime(&other));
        assert_ne!(handle.id(), other.id());
    }

    #[test]
    fn test_arbitrary_acquire_release_sequences() {
        // 'a' acquires, 'r' releases; the runtime dies only on the 1 -> 0 step
        let sequences = ["r", "ar r", "aaarrrr", "araarrr", "aarraarrr"];
        for sequence in sequences {
            let (runtime, closed) = MockRuntime::new();
            let handle = RuntimeHandle::new(runtime);
            let mut expected = 1usize;

            for step in sequence.chars().filter(|step| !step.is_whitespace()) {
                if step == 'a' {
                    drop(handle.acquire().unwrap());
                    expected += 1;
                } else {
                    expected -= 1;
                    assert_eq!(handle.release().unwrap(), expected);
                }
                assert_eq!(handle.count(), expected);
                assert_eq!(closed.get(), usize::from(expected == 0));
            }
        }
    }

    #[test]
    fn test_release_after_panicking_call() {
        let (runtime, closed) = MockRuntime::new();
        let handle = RuntimeHandle::new(runtime);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handle.with_runtime(|_| -> usize { panic!("host callback panicked") })
        }));
        drop(outcome.unwrap_err());

        let pinned = handle.with_runtime(|runtime| runtime.registry().len()).unwrap();
        assert_eq!(pinned, 0);
        assert_eq!(handle.release().unwrap(), 0);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_debug_shows_count() {
        let (runtime, _closed) = MockRuntime::new();
        let handle = RuntimeHandle::new(runtime);
        let rendered = format!("{handle:?}");
        assert!(rendered.contains("count: 1"));
    }
}
