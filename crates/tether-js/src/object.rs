//! Host-side references to JavaScript objects.

use boa_engine::JsValue;
use serde_json::Value;
use tether_core::{BridgeObject, HandleId, RegistryId, RuntimeHandle, ValueReference};

use crate::access;
use crate::engine::JsEngine;
use crate::error::ScriptResult;
use crate::state::JsState;
use crate::value::{Argument, Key, ScriptValue, ValueKind};

/// A JavaScript value pinned on behalf of host code.
///
/// The value stays reachable, and its state stays open, until the reference
/// is disposed or dropped. Two live references on one state are equal when
/// their values are `===`, whether or not they share a pin.
#[derive(Debug, PartialEq)]
pub struct JsRef {
    /// Bridge wrapper holding the pin
    object: BridgeObject<JsEngine>,
}

impl JsRef {
    /// Pin `value` in the runtime behind `handle`
    pub(crate) fn pin(handle: &RuntimeHandle<JsEngine>, value: JsValue) -> ScriptResult<Self> {
        Ok(Self {
            object: BridgeObject::pin(handle, value)?,
        })
    }

    pub(crate) fn raw_value(&self) -> ScriptResult<JsValue> {
        Ok(self.object.value()?)
    }

    pub(crate) fn ensure_state(&self, expected: HandleId) -> ScriptResult<()> {
        if let Some(reference) = self.object.reference() {
            reference.ensure_origin(expected)?;
        }
        Ok(())
    }

    fn live(&self) -> ScriptResult<(&RuntimeHandle<JsEngine>, JsValue)> {
        let handle = self.object.live_handle()?;
        Ok((handle, self.raw_value()?))
    }

    /// Registry slot of the pin, `None` once disposed
    pub fn id(&self) -> Option<RegistryId> {
        if self.object.is_disposed() {
            None
        } else {
            self.object.reference().map(ValueReference::id)
        }
    }

    /// Id of the state this reference was pinned on
    pub fn state_id(&self) -> HandleId {
        self.object.handle().id()
    }

    /// A new handle on the state this reference belongs to
    ///
    /// # Errors
    /// Returns an error if the reference was disposed or the state is gone
    pub fn state(&self) -> ScriptResult<JsState> {
        JsState::from_handle(self.object.live_handle()?)
    }

    /// Check whether this reference was disposed
    pub fn is_disposed(&self) -> bool {
        self.object.is_disposed()
    }

    /// Broad type of the referenced value
    ///
    /// # Errors
    /// Returns `StaleReference` if the reference was disposed
    pub fn kind(&self) -> ScriptResult<ValueKind> {
        Ok(ValueKind::of(&self.raw_value()?))
    }

    /// Check whether the value can be called
    ///
    /// # Errors
    /// Returns `StaleReference` if the reference was disposed
    pub fn is_callable(&self) -> ScriptResult<bool> {
        Ok(self.kind()?.is_callable())
    }

    /// Check whether the value has properties
    ///
    /// # Errors
    /// Returns `StaleReference` if the reference was disposed
    pub fn is_indexable(&self) -> ScriptResult<bool> {
        Ok(self.kind()?.is_indexable())
    }

    /// Read a property
    ///
    /// # Errors
    /// Returns `NotIndexable` for primitives, `Execution` if a getter throws
    pub fn get(&self, key: impl Into<Key>) -> ScriptResult<ScriptValue> {
        let (handle, target) = self.live()?;
        access::get(handle, &target, &key.into())
    }

    /// Write a property
    ///
    /// # Errors
    /// Returns `NotIndexable` for primitives, `ForeignReference` if `value`
    /// belongs to another state, `Execution` if a setter throws
    pub fn set<'arg>(
        &self,
        key: impl Into<Key>,
        value: impl Into<Argument<'arg>>,
    ) -> ScriptResult<()> {
        let (handle, target) = self.live()?;
        access::set(handle, &target, &key.into(), &value.into())
    }

    /// Store a fresh empty object under `key`
    ///
    /// # Errors
    /// Returns `NotIndexable` for primitives
    pub fn new_object_at(&self, key: impl Into<Key>) -> ScriptResult<Self> {
        let (handle, target) = self.live()?;
        access::new_object_at(handle, &target, &key.into())
    }

    /// Array length; 0 for anything that is not an array
    ///
    /// # Errors
    /// Returns `NotIndexable` for primitives
    pub fn length(&self) -> ScriptResult<usize> {
        let (handle, target) = self.live()?;
        access::length(handle, &target)
    }

    /// Own property names, or indices for arrays
    ///
    /// # Errors
    /// Returns `NotIndexable` for primitives
    pub fn keys(&self) -> ScriptResult<Vec<String>> {
        let (handle, target) = self.live()?;
        access::keys(handle, &target)
    }

    /// Name and value of every key in [`JsRef::keys`] order
    ///
    /// # Errors
    /// Returns `NotIndexable` for primitives, `Execution` if a getter throws
    pub fn entries(&self) -> ScriptResult<Vec<(String, ScriptValue)>> {
        let (handle, target) = self.live()?;
        access::entries(handle, &target)
    }

    /// Array elements in order; empty for anything that is not an array
    ///
    /// # Errors
    /// Returns `NotIndexable` for primitives
    pub fn to_array(&self) -> ScriptResult<Vec<ScriptValue>> {
        let (handle, target) = self.live()?;
        access::to_array(handle, &target)
    }

    /// Deep copy of the value as JSON
    ///
    /// # Errors
    /// Returns `Execution` if a getter throws or the value is cyclic
    pub fn to_json(&self) -> ScriptResult<Value> {
        let (handle, target) = self.live()?;
        access::to_json(handle, &target)
    }

    /// Call the value with `this` undefined
    ///
    /// # Errors
    /// Returns `NotCallable` if the value is not a function, `Execution` if it throws
    pub fn call(&self, arguments: &[Argument<'_>]) -> ScriptResult<ScriptValue> {
        let (handle, target) = self.live()?;
        access::call(handle, &target, &JsValue::undefined(), arguments)
    }

    /// Call the function stored under `name` with `this` bound to this value
    ///
    /// # Errors
    /// Returns `NotCallable` if the property is not a function, `Execution` if it throws
    pub fn call_method(&self, name: &str, arguments: &[Argument<'_>]) -> ScriptResult<ScriptValue> {
        let (handle, target) = self.live()?;
        let method = access::get_raw(handle, &target, &Key::from(name))?;
        access::call(handle, &method, &target, arguments)
    }

    /// Compare the referenced values with `===`
    ///
    /// # Errors
    /// Returns `StaleReference` if either reference was disposed
    pub fn strict_equals(&self, other: &Self) -> ScriptResult<bool> {
        Ok(self.raw_value()?.strict_equals(&other.raw_value()?))
    }

    /// Pin the same value again under a new id
    ///
    /// # Errors
    /// Returns an error if this reference was disposed or the registry is full
    pub fn duplicate(&self) -> ScriptResult<Self> {
        let (handle, target) = self.live()?;
        Self::pin(handle, target)
    }

    /// Unpin the value and let go of the state. Later calls do nothing.
    ///
    /// # Errors
    /// Returns an error if the state was torn down underneath the reference
    pub fn dispose(&mut self) -> ScriptResult<()> {
        Ok(self.object.dispose()?)
    }
}
