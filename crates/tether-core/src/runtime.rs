//! Contract an embedded scripting runtime fulfils for the bridge.

use crate::registry::Registry;

/// An embedded runtime whose values can be pinned from the host side.
///
/// The runtime owns its [`Registry`]; the bridge only reaches it through a
/// [`RuntimeHandle`](crate::RuntimeHandle), which serializes access.
pub trait EmbeddedRuntime {
    /// Value type living on the runtime's evaluation stack.
    type Value: Clone;

    /// The runtime's pinning table
    fn registry(&self) -> &Registry<Self::Value>;

    /// Mutable access to the pinning table
    fn registry_mut(&mut self) -> &mut Registry<Self::Value>;

    /// Whether two pinned values are the same value as the runtime itself
    /// judges it, such as `===` for a JavaScript engine
    fn same_value(&self, left: &Self::Value, right: &Self::Value) -> bool;

    /// Tear the runtime down.
    ///
    /// Called exactly once, when the last acquisition of its handle is
    /// released. The default simply drops the runtime.
    fn close(self)
    where
        Self: Sized,
    {
    }
}
