use boa_engine::JsError;
use tether_core::BridgeError;
use thiserror::Error;

/// Errors that can occur while driving a JavaScript state.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A lifetime or registry error from the bridge.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Evaluation threw or failed to parse.
    #[error("JavaScript error: {0}")]
    Execution(String),

    /// A call was attempted on a value that is not a function.
    #[error("Value is not callable: {0}")]
    NotCallable(String),

    /// A property access was attempted on a primitive.
    #[error("Value is not indexable: {0}")]
    NotIndexable(String),
}

impl From<JsError> for ScriptError {
    fn from(error: JsError) -> Self {
        Self::Execution(error.to_string())
    }
}

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{JsNativeError, JsValue};

    #[test]
    fn test_error_display() {
        let not_callable = ScriptError::NotCallable("number".to_owned());
        assert_eq!(not_callable.to_string(), "Value is not callable: number");

        let bridge = ScriptError::Bridge(BridgeError::RegistryFull { limit: 4 });
        assert_eq!(bridge.to_string(), "Registry exhausted: 4 values are already pinned");
    }

    #[test]
    fn test_from_js_error() {
        let thrown = JsError::from_opaque(JsValue::from(42));
        assert!(matches!(ScriptError::from(thrown), ScriptError::Execution(_)));

        let native = JsError::from(JsNativeError::typ().with_message("boom"));
        let error = ScriptError::from(native);
        assert!(error.to_string().contains("boom"));
    }
}
