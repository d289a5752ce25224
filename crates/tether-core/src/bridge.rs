//! Host-visible wrappers that drive release when they are dropped.

use core::fmt;

use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::handle::RuntimeHandle;
use crate::reference::ValueReference;
use crate::runtime::EmbeddedRuntime;

enum Owned<R: EmbeddedRuntime> {
    /// The runtime wrapper itself, holding one acquisition directly
    Runtime {
        handle: RuntimeHandle<R>,
        released: bool,
    },
    Value(ValueReference<R>),
}

/// Wrapper handed to host code for either a runtime or one of its values.
///
/// Dropping the wrapper is its finalization: a value wrapper unpins its value
/// and then releases its runtime acquisition, a runtime wrapper releases its
/// acquisition. Wrappers of one runtime may be dropped in any order and on any
/// thread the runtime type allows; the runtime is destroyed by whichever
/// release brings its count to zero.
pub struct BridgeObject<R: EmbeddedRuntime> {
    owned: Owned<R>,
}

impl<R: EmbeddedRuntime> BridgeObject<R> {
    /// Wrap a freshly created runtime, taking over its initial acquisition.
    pub fn root(runtime: R) -> Self {
        Self {
            owned: Owned::Runtime {
                handle: RuntimeHandle::new(runtime),
                released: false,
            },
        }
    }

    /// Create another runtime wrapper for an existing runtime.
    ///
    /// # Errors
    /// Returns `RuntimeDisposed` if the runtime is gone
    pub fn attach(handle: &RuntimeHandle<R>) -> Result<Self> {
        Ok(Self {
            owned: Owned::Runtime {
                handle: handle.acquire()?,
                released: false,
            },
        })
    }

    /// Pin `value` and wrap the resulting reference.
    ///
    /// # Errors
    /// Returns the error of [`ValueReference::create`]
    pub fn pin(handle: &RuntimeHandle<R>, value: R::Value) -> Result<Self> {
        ValueReference::create(handle, value).map(Self::from_reference)
    }

    /// Wrap an existing reference; the wrapper disposes it when dropped.
    pub fn from_reference(reference: ValueReference<R>) -> Self {
        Self {
            owned: Owned::Value(reference),
        }
    }

    /// Handle of the runtime this wrapper depends on, even after disposal
    #[must_use]
    pub fn handle(&self) -> &RuntimeHandle<R> {
        match &self.owned {
            Owned::Runtime { handle, .. } => handle,
            Owned::Value(reference) => reference.handle(),
        }
    }

    /// Handle to use for further bridge calls through this wrapper.
    ///
    /// # Errors
    /// Returns `StaleReference` for a disposed value wrapper and
    /// `RuntimeDisposed` for a disposed runtime wrapper
    pub fn live_handle(&self) -> Result<&RuntimeHandle<R>> {
        match &self.owned {
            Owned::Runtime {
                handle,
                released: true,
            } => Err(BridgeError::RuntimeDisposed(handle.id())),
            Owned::Runtime { handle, .. } => Ok(handle),
            Owned::Value(reference) if reference.is_disposed() => {
                Err(BridgeError::StaleReference(reference.id()))
            }
            Owned::Value(reference) => Ok(reference.handle()),
        }
    }

    /// The wrapped reference, `None` for a runtime wrapper
    #[must_use]
    pub fn reference(&self) -> Option<&ValueReference<R>> {
        match &self.owned {
            Owned::Runtime { .. } => None,
            Owned::Value(reference) => Some(reference),
        }
    }

    /// Get a copy of the wrapped value.
    ///
    /// # Errors
    /// Returns `StaleReference` once disposed, and `NotAValue` for a runtime
    /// wrapper
    pub fn value(&self) -> Result<R::Value> {
        match &self.owned {
            Owned::Runtime { handle, .. } => Err(BridgeError::NotAValue(handle.id())),
            Owned::Value(reference) => reference.get(),
        }
    }

    /// Check whether this wraps the runtime itself
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self.owned, Owned::Runtime { .. })
    }

    /// Check whether this wrapper already gave up what it owned
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        match &self.owned {
            Owned::Runtime { released, .. } => *released,
            Owned::Value(reference) => reference.is_disposed(),
        }
    }

    /// Release what this wrapper owns ahead of drop. Idempotent.
    ///
    /// # Errors
    /// Returns the error of the underlying release; the wrapper counts as
    /// disposed either way
    pub fn dispose(&mut self) -> Result<()> {
        match &mut self.owned {
            Owned::Runtime { released: true, .. } => Ok(()),
            Owned::Runtime { handle, released } => {
                *released = true;
                handle.release().map(drop)
            }
            Owned::Value(reference) => reference.dispose(),
        }
    }
}

impl<R: EmbeddedRuntime> Drop for BridgeObject<R> {
    fn drop(&mut self) {
        if self.is_disposed() {
            return;
        }
        let runtime = self.handle().id();
        match self.dispose() {
            Ok(()) => debug!(runtime = %runtime, "bridge object finalized"),
            Err(error) => warn!(runtime = %runtime, %error, "bridge object finalization failed"),
        }
    }
}

/// Runtime wrappers of one runtime are equal. Value wrappers are equal when
/// neither is disposed, both were pinned on the same runtime, and they share a
/// registry id or the runtime reports their values as the same value.
impl<R: EmbeddedRuntime> PartialEq for BridgeObject<R> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.owned, &other.owned) {
            (Owned::Runtime { handle: left, .. }, Owned::Runtime { handle: right, .. }) => {
                left.id() == right.id()
            }
            (Owned::Value(left), Owned::Value(right)) => {
                if left.is_disposed() || right.is_disposed() || left.origin() != right.origin() {
                    return false;
                }
                left.id() == right.id() || same_pinned_value(left, right)
            }
            _ => false,
        }
    }
}

/// Compare two pins of one runtime by value; released or unreachable pins
/// are never equal.
fn same_pinned_value<R: EmbeddedRuntime>(
    left: &ValueReference<R>,
    right: &ValueReference<R>,
) -> bool {
    left.handle()
        .with_runtime(|runtime| {
            let registry = runtime.registry();
            match (registry.lookup(left.id()), registry.lookup(right.id())) {
                (Ok(first), Ok(second)) => runtime.same_value(first, second),
                _ => false,
            }
        })
        .unwrap_or(false)
}

impl<R: EmbeddedRuntime> fmt::Debug for BridgeObject<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owned {
            Owned::Runtime { handle, released } => formatter
                .debug_struct("BridgeObject::Runtime")
                .field("handle", handle)
                .field("released", released)
                .finish(),
            Owned::Value(reference) => formatter
                .debug_tuple("BridgeObject::Value")
                .field(reference)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRuntime;

    #[test]
    fn test_root_drop_destroys_runtime() {
        let (runtime, closed) = MockRuntime::new();
        let root = BridgeObject::root(runtime);
        assert!(root.is_root());
        assert_eq!(root.handle().count(), 1);

        drop(root);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_value_keeps_runtime_alive_after_root_drop() {
        let (runtime, closed) = MockRuntime::new();
        let root = BridgeObject::root(runtime);
        let value = BridgeObject::pin(root.handle(), "kept".to_owned()).unwrap();
        assert_eq!(root.handle().count(), 2);

        drop(root);
        assert_eq!(closed.get(), 0);
        assert_eq!(value.value().unwrap(), "kept");

        drop(value);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_explicit_dispose_then_drop() {
        let (runtime, closed) = MockRuntime::new();
        let root = BridgeObject::root(runtime);
        let mut value = BridgeObject::pin(root.handle(), "early".to_owned()).unwrap();

        value.dispose().unwrap();
        value.dispose().unwrap();
        assert!(value.is_disposed());
        assert_eq!(root.handle().count(), 1);
        assert!(matches!(
            value.value(),
            Err(BridgeError::StaleReference(_))
        ));
        assert!(matches!(
            value.live_handle(),
            Err(BridgeError::StaleReference(_))
        ));

        drop(value);
        assert_eq!(root.handle().count(), 1);
        drop(root);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_disposed_root_refuses_calls() {
        let (runtime, closed) = MockRuntime::new();
        let mut root = BridgeObject::root(runtime);
        let attached = BridgeObject::attach(root.handle()).unwrap();

        root.dispose().unwrap();
        assert!(matches!(
            root.live_handle(),
            Err(BridgeError::RuntimeDisposed(_))
        ));
        attached.live_handle().unwrap();
        assert_eq!(closed.get(), 0);

        drop(attached);
        assert_eq!(closed.get(), 1);
        drop(root);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    #[allow(clippy::eq_op, reason = "Reflexivity is what is being tested")]
    fn test_equality_compares_pinned_values() {
        let (runtime, _closed) = MockRuntime::new();
        let root = BridgeObject::root(runtime);
        let attached = BridgeObject::attach(root.handle()).unwrap();
        assert_eq!(root, attached);

        let first = BridgeObject::pin(root.handle(), "same".to_owned()).unwrap();
        let second = BridgeObject::pin(root.handle(), "same".to_owned()).unwrap();
        let different = BridgeObject::pin(root.handle(), "different".to_owned()).unwrap();
        assert_eq!(first, first);
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_ne!(root, first);
        assert_eq!(root.handle().count(), 5);

        let (other_runtime, _other_closed) = MockRuntime::new();
        let other = BridgeObject::root(other_runtime);
        let foreign = BridgeObject::pin(other.handle(), "same".to_owned()).unwrap();
        assert_ne!(root, other);
        assert_ne!(first, foreign);
    }

    #[test]
    fn test_disposed_pin_is_not_equal_to_same_value() {
        let (runtime, _closed) = MockRuntime::new();
        let root = BridgeObject::root(runtime);
        let kept = BridgeObject::pin(root.handle(), "shared".to_owned()).unwrap();
        let mut gone = BridgeObject::pin(root.handle(), "shared".to_owned()).unwrap();
        assert_eq!(kept, gone);

        gone.dispose().unwrap();
        assert_ne!(kept, gone);
        assert_ne!(gone, kept);
    }

    #[test]
    fn test_drop_after_value_unpinned_elsewhere() {
        let (runtime, closed) = MockRuntime::new();
        let root = BridgeObject::root(runtime);
        let value = BridgeObject::pin(root.handle(), "moved".to_owned()).unwrap();
        let id = value.reference().unwrap().id();
        assert_eq!(root.handle().count(), 2);

        let released = root
            .handle()
            .with_runtime(|runtime| runtime.registry_mut().release(id))
            .unwrap();
        assert_eq!(released.unwrap(), "moved");

        drop(value);
        assert_eq!(root.handle().count(), 1);
        assert_eq!(closed.get(), 0);
        assert!(
            root.handle()
                .with_runtime(|runtime| runtime.registry().is_empty())
                .unwrap()
        );

        drop(root);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    #[allow(clippy::eq_op, reason = "Reflexivity is what is being tested")]
    fn test_disposed_value_is_not_equal_to_itself() {
        let (runtime, _closed) = MockRuntime::new();
        let root = BridgeObject::root(runtime);
        let mut value = BridgeObject::pin(root.handle(), "gone".to_owned()).unwrap();
        value.dispose().unwrap();

        assert!(value != value);
    }

    #[test]
    fn test_root_has_no_value() {
        let (runtime, _closed) = MockRuntime::new();
        let root = BridgeObject::root(runtime);
        assert!(root.reference().is_none());
        assert!(matches!(root.value(), Err(BridgeError::NotAValue(_))));
    }
}
