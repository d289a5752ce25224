//! JavaScript/JSON value conversion and marshaling of results to the host.

use boa_engine::object::JsObject;
use boa_engine::object::builtins::JsArray;
use boa_engine::property::PropertyKey;
use boa_engine::{Context, JsNativeError, JsResult, JsValue, js_string};
use serde_json::{Map, Number, Value};
use tether_core::RuntimeHandle;

use crate::engine::JsEngine;
use crate::error::ScriptResult;
use crate::object::JsRef;
use crate::value::ScriptValue;

/// Nesting depth at which conversion gives up; cyclic objects end here.
const MAX_DEPTH: usize = 128;

/// Largest integer a double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Copy a primitive out of the engine, or `None` for values with identity
pub fn primitive_to_json(value: &JsValue) -> Option<Value> {
    if value.is_null() || value.is_undefined() {
        Some(Value::Null)
    } else if let Some(boolean) = value.as_boolean() {
        Some(Value::Bool(boolean))
    } else if let Some(number) = value.as_number() {
        Some(number_to_json(number))
    } else {
        value
            .as_string()
            .map(|string| Value::String(string.to_std_string_escaped()))
    }
}

fn number_to_json(number: f64) -> Value {
    if number.fract().abs() < f64::EPSILON && number.abs() <= MAX_SAFE_INTEGER {
        Value::Number(Number::from(number.round() as i64))
    } else {
        Number::from_f64(number).map_or(Value::Null, Value::Number)
    }
}

/// Turn an engine value into what the host sees: primitives by copy, the
/// rest pinned in the engine's registry.
///
/// Must be called outside `with_runtime`, since pinning takes the lock.
///
/// # Errors
/// Returns an error if the value cannot be pinned
pub fn marshal(handle: &RuntimeHandle<JsEngine>, value: JsValue) -> ScriptResult<ScriptValue> {
    primitive_to_json(&value).map_or_else(
        || JsRef::pin(handle, value).map(ScriptValue::Object),
        |json| Ok(ScriptValue::Primitive(json)),
    )
}

/// Convert a JS value to JSON, recursing into arrays and objects.
///
/// Functions become `null`; symbols and bigints their display form.
///
/// # Errors
/// Returns error if a property read throws or nesting is too deep
pub fn to_json(value: &JsValue, context: &mut Context) -> JsResult<Value> {
    to_json_at(value, context, 0)
}

fn to_json_at(value: &JsValue, context: &mut Context, depth: usize) -> JsResult<Value> {
    if let Some(primitive) = primitive_to_json(value) {
        return Ok(primitive);
    }
    if value.is_callable() {
        return Ok(Value::Null);
    }
    let Some(object) = value.as_object() else {
        return Ok(Value::String(value.display().to_string()));
    };
    if depth >= MAX_DEPTH {
        return Err(JsNativeError::range()
            .with_message("value is nested too deeply to convert to JSON")
            .into());
    }

    if object.is_array() {
        let mut array = Vec::new();
        for element in array_elements(&object, context)? {
            array.push(to_json_at(&element, context, depth + 1)?);
        }
        Ok(Value::Array(array))
    } else {
        let mut map = Map::new();
        for key in property_keys(&object, context)? {
            let name = key_to_string(&key, context)?;
            let property = object.get(key, context)?;
            map.insert(name, to_json_at(&property, context, depth + 1)?);
        }
        Ok(Value::Object(map))
    }
}

/// Convert JSON to a fresh JS value
///
/// # Errors
/// Returns error if building an array or object fails
pub fn from_json(value: &Value, context: &mut Context) -> JsResult<JsValue> {
    match value {
        Value::Null => Ok(JsValue::null()),
        Value::Bool(boolean) => Ok(JsValue::from(*boolean)),
        Value::Number(number) => Ok(number.as_i64().map_or_else(
            || JsValue::from(number.as_f64().unwrap_or(0.0)),
            JsValue::from,
        )),
        Value::String(string) => Ok(JsValue::from(js_string!(string.as_str()))),
        Value::Array(array) => {
            let js_array = JsArray::new(context);
            for (index, element) in array.iter().enumerate() {
                let js_element = from_json(element, context)?;
                js_array.set(index, js_element, true, context)?;
            }
            Ok(js_array.into())
        }
        Value::Object(map) => {
            let js_object = JsObject::with_object_proto(context.intrinsics());
            for (key, property) in map {
                let js_property = from_json(property, context)?;
                js_object.set(js_string!(key.as_str()), js_property, true, context)?;
            }
            Ok(js_object.into())
        }
    }
}

/// Length of an array object
///
/// # Errors
/// Returns error if reading `length` throws
pub fn array_length(object: &JsObject, context: &mut Context) -> JsResult<usize> {
    let length = object.get(js_string!("length"), context)?.to_u32(context)?;
    Ok(length as usize)
}

/// Elements `0..length` of an array object
///
/// # Errors
/// Returns error if reading an element throws
pub fn array_elements(object: &JsObject, context: &mut Context) -> JsResult<Vec<JsValue>> {
    let length = array_length(object, context)?;
    let mut elements = Vec::with_capacity(length);
    for index in 0..length {
        elements.push(object.get(index, context)?);
    }
    Ok(elements)
}

/// Keys of `object` in property order: indices for arrays, own string keys
/// for everything else. Symbol keys are skipped.
///
/// # Errors
/// Returns error if the object's key enumeration throws
pub fn property_keys(object: &JsObject, context: &mut Context) -> JsResult<Vec<PropertyKey>> {
    if object.is_array() {
        let length = array_length(object, context)?;
        return Ok((0..length).map(PropertyKey::from).collect());
    }
    Ok(object
        .own_property_keys(context)?
        .into_iter()
        .filter(|key| !matches!(key, PropertyKey::Symbol(_)))
        .collect())
}

/// Key as the string a script would see
///
/// # Errors
/// Returns error if string conversion throws
pub fn key_to_string(key: &PropertyKey, context: &mut Context) -> JsResult<String> {
    let key_value = JsValue::from(key.clone());
    Ok(key_value.to_string(context)?.to_std_string_escaped())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;
    use serde_json::json;

    fn eval(context: &mut Context, code: &str) -> JsValue {
        context.eval(Source::from_bytes(code)).unwrap()
    }

    #[test]
    fn test_primitive_to_json() {
        assert_eq!(primitive_to_json(&JsValue::undefined()), Some(Value::Null));
        assert_eq!(primitive_to_json(&JsValue::from(false)), Some(json!(false)));
        assert_eq!(primitive_to_json(&JsValue::from(3.0)), Some(json!(3)));
        assert_eq!(primitive_to_json(&JsValue::from(2.5)), Some(json!(2.5)));
        assert_eq!(
            primitive_to_json(&JsValue::from(js_string!("hi"))),
            Some(json!("hi"))
        );
    }

    #[test]
    fn test_objects_are_not_primitives() {
        let mut context = Context::default();
        assert!(primitive_to_json(&eval(&mut context, "({})")).is_none());
        assert!(primitive_to_json(&eval(&mut context, "[]")).is_none());
        assert!(primitive_to_json(&eval(&mut context, "Symbol()")).is_none());
    }

    #[test]
    fn test_to_json_nested() {
        let mut context = Context::default();
        let value = eval(&mut context, "({ name: 'x', list: [1, 2.5, null], inner: { flag: true } })");
        let json = to_json(&value, &mut context).unwrap();
        assert_eq!(
            json,
            json!({ "name": "x", "list": [1, 2.5, null], "inner": { "flag": true } })
        );
    }

    #[test]
    fn test_to_json_rejects_cycles() {
        let mut context = Context::default();
        let value = eval(&mut context, "const node = {}; node.self = node; node");
        to_json(&value, &mut context).unwrap_err();
    }

    #[test]
    fn test_from_json_builds_objects() {
        let mut context = Context::default();
        let source = json!({ "items": [1, "two"], "count": 2 });
        let value = from_json(&source, &mut context).unwrap();
        assert!(value.is_object());
        assert_eq!(to_json(&value, &mut context).unwrap(), source);
    }

    #[test]
    fn test_property_keys_skip_symbols() {
        let mut context = Context::default();
        let value = eval(&mut context, "({ alpha: 1, [Symbol('s')]: 2, beta: 3 })");
        let object = value.as_object().unwrap();
        let keys = property_keys(&object, &mut context).unwrap();
        let names: Vec<String> = keys
            .iter()
            .map(|key| key_to_string(key, &mut context).unwrap())
            .collect();
        assert_eq!(names, ["alpha", "beta"]);
    }
}
