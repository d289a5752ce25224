//! Property access and calls shared by states and references.
//!
//! Every function resolves its inputs before taking the runtime lock and
//! pins its outputs after releasing it.

use boa_engine::object::JsObject;
use boa_engine::{Context, JsResult, JsValue};
use serde_json::Value;
use tether_core::RuntimeHandle;
use tracing::warn;

use crate::conversion::{self, marshal};
use crate::engine::JsEngine;
use crate::error::{ScriptError, ScriptResult};
use crate::object::JsRef;
use crate::value::{Argument, Key, ScriptValue, ValueKind};

/// Argument with its reference already looked up.
enum Resolved<'arg> {
    Json(&'arg Value),
    Js(JsValue),
}

impl Resolved<'_> {
    fn into_js(self, context: &mut Context) -> JsResult<JsValue> {
        match self {
            Self::Json(json) => conversion::from_json(json, context),
            Self::Js(value) => Ok(value),
        }
    }
}

fn resolve<'arg>(
    handle: &RuntimeHandle<JsEngine>,
    argument: &'arg Argument<'_>,
) -> ScriptResult<Resolved<'arg>> {
    match argument {
        Argument::Json(json) => Ok(Resolved::Json(json)),
        Argument::Ref(reference) => {
            reference.ensure_state(handle.id())?;
            Ok(Resolved::Js(reference.raw_value()?))
        }
    }
}

fn indexable(target: &JsValue) -> ScriptResult<JsObject> {
    target
        .as_object()
        .ok_or_else(|| ScriptError::NotIndexable(ValueKind::of(target).to_string()))
}

/// Read `key` without marshaling the result
pub fn get_raw(
    handle: &RuntimeHandle<JsEngine>,
    target: &JsValue,
    key: &Key,
) -> ScriptResult<JsValue> {
    let object = indexable(target)?;
    handle.with_runtime(|engine| object.get(key.to_property_key(), engine.context()))?
        .map_err(ScriptError::from)
}

pub fn get(
    handle: &RuntimeHandle<JsEngine>,
    target: &JsValue,
    key: &Key,
) -> ScriptResult<ScriptValue> {
    let property = get_raw(handle, target, key)?;
    marshal(handle, property)
}

pub fn set(
    handle: &RuntimeHandle<JsEngine>,
    target: &JsValue,
    key: &Key,
    argument: &Argument<'_>,
) -> ScriptResult<()> {
    let object = indexable(target)?;
    let resolved = resolve(handle, argument)?;
    handle.with_runtime(|engine| -> ScriptResult<()> {
        let context = engine.context();
        let value = resolved.into_js(context)?;
        object.set(key.to_property_key(), value, true, context)?;
        Ok(())
    })?
}

/// Store a fresh empty object under `key` and return a reference to it
pub fn new_object_at(
    handle: &RuntimeHandle<JsEngine>,
    target: &JsValue,
    key: &Key,
) -> ScriptResult<JsRef> {
    let object = indexable(target)?;
    let created = handle.with_runtime(|engine| -> ScriptResult<JsValue> {
        let context = engine.context();
        let fresh = JsObject::with_object_proto(context.intrinsics());
        object.set(key.to_property_key(), fresh.clone(), true, context)?;
        Ok(fresh.into())
    })??;
    JsRef::pin(handle, created)
}

/// Call `function` with `this` bound to `receiver`
pub fn call(
    handle: &RuntimeHandle<JsEngine>,
    function: &JsValue,
    receiver: &JsValue,
    arguments: &[Argument<'_>],
) -> ScriptResult<ScriptValue> {
    let callable = function
        .as_callable()
        .ok_or_else(|| ScriptError::NotCallable(ValueKind::of(function).to_string()))?;
    let resolved = arguments
        .iter()
        .map(|argument| resolve(handle, argument))
        .collect::<ScriptResult<Vec<_>>>()?;

    let returned = handle.with_runtime(|engine| -> ScriptResult<JsValue> {
        let context = engine.context();
        let mut values = Vec::with_capacity(resolved.len());
        for argument in resolved {
            values.push(argument.into_js(context)?);
        }
        let result = callable.call(receiver, &values, context)?;
        if let Err(error) = context.run_jobs() {
            warn!(%error, "pending jobs failed after call");
        }
        Ok(result)
    })??;
    marshal(handle, returned)
}

pub fn length(handle: &RuntimeHandle<JsEngine>, target: &JsValue) -> ScriptResult<usize> {
    let object = indexable(target)?;
    if !object.is_array() {
        return Ok(0);
    }
    handle.with_runtime(|engine| conversion::array_length(&object, engine.context()))?
        .map_err(ScriptError::from)
}

pub fn keys(handle: &RuntimeHandle<JsEngine>, target: &JsValue) -> ScriptResult<Vec<String>> {
    let object = indexable(target)?;
    handle.with_runtime(|engine| -> ScriptResult<Vec<String>> {
        let context = engine.context();
        let mut names = Vec::new();
        for key in conversion::property_keys(&object, context)? {
            names.push(conversion::key_to_string(&key, context)?);
        }
        Ok(names)
    })?
}

pub fn entries(
    handle: &RuntimeHandle<JsEngine>,
    target: &JsValue,
) -> ScriptResult<Vec<(String, ScriptValue)>> {
    let object = indexable(target)?;
    let raw = handle.with_runtime(|engine| -> ScriptResult<Vec<(String, JsValue)>> {
        let context = engine.context();
        let mut pairs = Vec::new();
        for key in conversion::property_keys(&object, context)? {
            let name = conversion::key_to_string(&key, context)?;
            pairs.push((name, object.get(key, context)?));
        }
        Ok(pairs)
    })??;

    raw.into_iter()
        .map(|(name, value)| Ok((name, marshal(handle, value)?)))
        .collect()
}

/// Elements `0..length` of an array; empty for anything else
pub fn to_array(
    handle: &RuntimeHandle<JsEngine>,
    target: &JsValue,
) -> ScriptResult<Vec<ScriptValue>> {
    let object = indexable(target)?;
    if !object.is_array() {
        return Ok(Vec::new());
    }
    let elements = handle
        .with_runtime(|engine| conversion::array_elements(&object, engine.context()))??;
    elements
        .into_iter()
        .map(|element| marshal(handle, element))
        .collect()
}

pub fn to_json(handle: &RuntimeHandle<JsEngine>, target: &JsValue) -> ScriptResult<Value> {
    handle.with_runtime(|engine| conversion::to_json(target, engine.context()))?
        .map_err(ScriptError::from)
}
