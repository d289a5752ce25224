//! Values crossing between host code and a JavaScript state.

use core::fmt;

use boa_engine::JsValue;
use boa_engine::js_string;
use boa_engine::property::PropertyKey;
use serde_json::Value;

use crate::object::JsRef;

/// Result of a script operation as seen by host code.
///
/// Primitives are copied out as JSON; anything with identity stays in the
/// engine and is pinned behind a [`JsRef`].
#[derive(Debug, PartialEq)]
pub enum ScriptValue {
    /// `undefined`, `null`, a boolean, number or string
    Primitive(Value),
    /// An object, array, function, symbol or bigint
    Object(JsRef),
}

impl ScriptValue {
    /// The primitive, if this is one
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Primitive(value) => Some(value),
            Self::Object(_) => None,
        }
    }

    /// The reference, if this is one
    #[must_use]
    pub fn as_object(&self) -> Option<&JsRef> {
        match self {
            Self::Primitive(_) => None,
            Self::Object(reference) => Some(reference),
        }
    }

    /// Take the reference out, if this is one
    #[must_use]
    pub fn into_object(self) -> Option<JsRef> {
        match self {
            Self::Primitive(_) => None,
            Self::Object(reference) => Some(reference),
        }
    }

    /// Check for `undefined` or `null`
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Primitive(Value::Null))
    }
}

impl From<Value> for ScriptValue {
    fn from(value: Value) -> Self {
        Self::Primitive(value)
    }
}

impl From<JsRef> for ScriptValue {
    fn from(reference: JsRef) -> Self {
        Self::Object(reference)
    }
}

impl PartialEq<Value> for ScriptValue {
    fn eq(&self, other: &Value) -> bool {
        self.as_json() == Some(other)
    }
}

/// Broad type of a JavaScript value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `true` or `false`
    Boolean,
    /// Any number
    Number,
    /// Any string
    String,
    /// A symbol
    Symbol,
    /// A bigint
    BigInt,
    /// A plain, non-callable object
    Object,
    /// An array
    Array,
    /// Anything callable
    Function,
}

impl ValueKind {
    /// Classify `value`
    #[must_use]
    pub fn of(value: &JsValue) -> Self {
        if value.is_undefined() {
            Self::Undefined
        } else if value.is_null() {
            Self::Null
        } else if value.is_boolean() {
            Self::Boolean
        } else if value.is_number() {
            Self::Number
        } else if value.is_string() {
            Self::String
        } else if value.is_symbol() {
            Self::Symbol
        } else if value.is_bigint() {
            Self::BigInt
        } else if value.is_callable() {
            Self::Function
        } else if value.as_object().is_some_and(|object| object.is_array()) {
            Self::Array
        } else {
            Self::Object
        }
    }

    /// Check whether values of this kind can be called
    #[must_use]
    pub fn is_callable(self) -> bool {
        matches!(self, Self::Function)
    }

    /// Check whether values of this kind have properties to read and write
    #[must_use]
    pub fn is_indexable(self) -> bool {
        matches!(self, Self::Object | Self::Array | Self::Function)
    }

    /// Lowercase name, as in error messages
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::BigInt => "bigint",
            Self::Object => "object",
            Self::Array => "array",
            Self::Function => "function",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Property key: a name or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Named property
    Name(String),
    /// Integer index
    Index(usize),
}

impl Key {
    pub(crate) fn to_property_key(&self) -> PropertyKey {
        match self {
            Self::Name(name) => PropertyKey::from(js_string!(name.as_str())),
            Self::Index(index) => PropertyKey::from(*index),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Value handed into a script: copied JSON or an existing reference.
#[derive(Debug, Clone)]
pub enum Argument<'obj> {
    /// Converted into a fresh engine value
    Json(Value),
    /// Passed by identity; must come from the same state
    Ref(&'obj JsRef),
}

impl From<Value> for Argument<'_> {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for Argument<'_> {
    fn from(value: &str) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<String> for Argument<'_> {
    fn from(value: String) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<bool> for Argument<'_> {
    fn from(value: bool) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<i64> for Argument<'_> {
    fn from(value: i64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<f64> for Argument<'_> {
    fn from(value: f64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl<'obj> From<&'obj JsRef> for Argument<'obj> {
    fn from(reference: &'obj JsRef) -> Self {
        Self::Ref(reference)
    }
}

impl<'obj> From<&'obj ScriptValue> for Argument<'obj> {
    fn from(value: &'obj ScriptValue) -> Self {
        match value {
            ScriptValue::Primitive(json) => Self::Json(json.clone()),
            ScriptValue::Object(reference) => Self::Ref(reference),
        }
    }
}
