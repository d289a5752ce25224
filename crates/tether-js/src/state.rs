//! Host-side handles on JavaScript states.

use boa_engine::JsValue;
use tether_core::{BridgeObject, EmbeddedRuntime as _, HandleId, Registry, RuntimeHandle};
use tracing::debug;

use crate::access;
use crate::config::{EngineConfig, LimitsConfig};
use crate::conversion::{self, marshal};
use crate::engine::JsEngine;
use crate::error::ScriptResult;
use crate::object::JsRef;
use crate::value::{Argument, Key, ScriptValue};

/// One JavaScript state as seen by host code.
///
/// The state stays open while any `JsState` for it or any [`JsRef`] pinned
/// on it is alive; dropping the last one closes the context. Two `JsState`
/// values are equal when they refer to the same context.
#[derive(Debug)]
pub struct JsState {
    /// Runtime wrapper holding one acquisition
    root: BridgeObject<JsEngine>,
}

impl JsState {
    /// Open a state with default limits and a registry that grows on demand
    pub fn new() -> Self {
        Self::open(JsEngine::with_registry(&LimitsConfig::default(), Registry::new()))
    }

    /// Open a state with `config` applied
    ///
    /// # Errors
    /// Returns `Config` if the configuration fails validation or the registry
    /// cannot be sized as configured
    pub fn with_config(config: &EngineConfig) -> ScriptResult<Self> {
        config.validate()?;
        Ok(Self::open(JsEngine::new(config)?))
    }

    fn open(engine: JsEngine) -> Self {
        let root = BridgeObject::root(engine);
        debug!(state = %root.handle().id(), "opened JavaScript state");
        Self { root }
    }

    pub(crate) fn from_handle(handle: &RuntimeHandle<JsEngine>) -> ScriptResult<Self> {
        Ok(Self {
            root: BridgeObject::attach(handle)?,
        })
    }

    /// Another handle on the same context, kept open independently of this one
    ///
    /// # Errors
    /// Returns `RuntimeDisposed` if this handle was already closed
    pub fn attach(&self) -> ScriptResult<Self> {
        Self::from_handle(self.handle()?)
    }

    fn handle(&self) -> ScriptResult<&RuntimeHandle<JsEngine>> {
        Ok(self.root.live_handle()?)
    }

    fn global(&self) -> ScriptResult<(&RuntimeHandle<JsEngine>, JsValue)> {
        let handle = self.handle()?;
        let global = handle.with_runtime(|engine| JsValue::from(engine.context().global_object()))?;
        Ok((handle, global))
    }

    /// Identity of the underlying context
    pub fn id(&self) -> HandleId {
        self.root.handle().id()
    }

    /// Evaluate `code` and return its completion value
    ///
    /// # Errors
    /// Returns `Execution` if the code fails to parse or throws
    pub fn eval(&self, code: &str) -> ScriptResult<ScriptValue> {
        let handle = self.handle()?;
        let value = handle.with_runtime(|engine| engine.eval(code))??;
        marshal(handle, value)
    }

    /// Evaluate `code`, spreading an array result into its elements.
    ///
    /// `undefined` yields no values; any other result yields one.
    ///
    /// # Errors
    /// Returns `Execution` if the code fails to parse or throws
    pub fn eval_multi(&self, code: &str) -> ScriptResult<Vec<ScriptValue>> {
        let handle = self.handle()?;
        let values = handle.with_runtime(|engine| -> ScriptResult<Vec<JsValue>> {
            let result = engine.eval(code)?;
            if result.is_undefined() {
                return Ok(Vec::new());
            }
            match result.as_object() {
                Some(object) if object.is_array() => {
                    Ok(conversion::array_elements(&object, engine.context())?)
                }
                _ => Ok(vec![result]),
            }
        })??;
        values.into_iter().map(|value| marshal(handle, value)).collect()
    }

    /// Reference to the global object
    ///
    /// # Errors
    /// Returns an error if the state was closed through this handle
    pub fn globals(&self) -> ScriptResult<JsRef> {
        let (handle, global) = self.global()?;
        JsRef::pin(handle, global)
    }

    /// Read a global
    ///
    /// # Errors
    /// Returns `Execution` if a getter throws
    pub fn get(&self, name: &str) -> ScriptResult<ScriptValue> {
        let (handle, global) = self.global()?;
        access::get(handle, &global, &Key::from(name))
    }

    /// Write a global
    ///
    /// # Errors
    /// Returns `ForeignReference` if `value` belongs to another state
    pub fn set<'arg>(&self, name: &str, value: impl Into<Argument<'arg>>) -> ScriptResult<()> {
        let (handle, global) = self.global()?;
        access::set(handle, &global, &Key::from(name), &value.into())
    }

    /// Store a fresh empty object in the global `name`
    ///
    /// # Errors
    /// Returns an error if the object cannot be stored or pinned
    pub fn new_object_at(&self, name: &str) -> ScriptResult<JsRef> {
        let (handle, global) = self.global()?;
        access::new_object_at(handle, &global, &Key::from(name))
    }

    /// Call the global function `name` with `this` undefined
    ///
    /// # Errors
    /// Returns `NotCallable` if the global is not a function, `Execution` if it throws
    pub fn call(&self, name: &str, arguments: &[Argument<'_>]) -> ScriptResult<ScriptValue> {
        let (handle, global) = self.global()?;
        let function = access::get_raw(handle, &global, &Key::from(name))?;
        access::call(handle, &function, &JsValue::undefined(), arguments)
    }

    /// Number of values currently pinned for host references
    ///
    /// # Errors
    /// Returns an error if the state was closed through this handle
    pub fn pinned_count(&self) -> ScriptResult<usize> {
        Ok(self
            .handle()?
            .with_runtime(|engine| engine.registry().len())?)
    }

    /// Number of live acquisitions on the context: one per open `JsState`
    /// plus one per live [`JsRef`]
    pub fn reference_count(&self) -> usize {
        self.root.handle().count()
    }

    /// Give up this handle's hold on the context ahead of drop.
    ///
    /// The context itself closes once every other handle and reference is
    /// gone. Later calls do nothing.
    ///
    /// # Errors
    /// Returns `RuntimeDisposed` if the context was already torn down
    pub fn close(&mut self) -> ScriptResult<()> {
        Ok(self.root.dispose()?)
    }

    /// Check whether [`close`](Self::close) already ran
    pub fn is_closed(&self) -> bool {
        self.root.is_disposed()
    }
}

impl Default for JsState {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for JsState {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScriptError;
    use serde_json::json;
    use tether_core::BridgeError;

    #[test]
    fn test_eval_primitive() {
        let state = JsState::new();
        assert_eq!(state.eval("1 + 2").unwrap(), json!(3));
        assert_eq!(state.eval("'a' + 'b'").unwrap(), json!("ab"));
        assert!(state.eval("undefined").unwrap().is_null());
        assert_eq!(state.pinned_count().unwrap(), 0);
    }

    #[test]
    fn test_eval_object_is_pinned() {
        let state = JsState::new();
        let value = state.eval("({ answer: 42 })").unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(state.pinned_count().unwrap(), 1);
        assert_eq!(state.reference_count(), 2);
        assert_eq!(object.get("answer").unwrap(), json!(42));

        drop(value);
        assert_eq!(state.pinned_count().unwrap(), 0);
        assert_eq!(state.reference_count(), 1);
    }

    #[test]
    fn test_eval_multi_spreads_arrays() {
        let state = JsState::new();
        let values = state.eval_multi("[1, 'two', { three: 3 }]").unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], json!(1));
        assert_eq!(values[1], json!("two"));
        assert!(values[2].as_object().is_some());

        assert!(state.eval_multi("undefined").unwrap().is_empty());
        assert_eq!(state.eval_multi("7").unwrap().len(), 1);
    }

    #[test]
    fn test_globals_round_trip() {
        let state = JsState::new();
        state.set("greeting", "hello").unwrap();
        assert_eq!(state.eval("greeting + '!'").unwrap(), json!("hello!"));
        assert_eq!(state.get("greeting").unwrap(), json!("hello"));
        assert!(state.get("missing").unwrap().is_null());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut state = JsState::new();
        let other = state.globals().unwrap();
        state.close().unwrap();
        state.close().unwrap();
        assert!(state.is_closed());
        assert!(matches!(
            state.eval("1"),
            Err(ScriptError::Bridge(BridgeError::RuntimeDisposed(_)))
        ));
        assert!(other.get("Math").unwrap().as_object().is_some());
    }

    #[test]
    fn test_attached_state_keeps_context_open() {
        let state = JsState::new();
        state.set("marker", "kept").unwrap();
        let attached = state.attach().unwrap();
        assert_eq!(attached, state);
        assert_eq!(state.reference_count(), 2);

        drop(state);
        assert_eq!(attached.reference_count(), 1);
        assert_eq!(attached.get("marker").unwrap(), json!("kept"));
    }
}
