//! JavaScript states whose objects can be held from host code.
//!
//! A [`JsState`] owns a Boa context through the tether bridge. Objects coming
//! out of the state are pinned and handed out as [`JsRef`]s, and the context
//! is closed only after the last state handle and the last reference are gone,
//! in whatever order host code drops them.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Allow for tests"
    )
)]

mod access;
/// Engine configuration.
pub mod config;
/// JavaScript/JSON conversion.
mod conversion;
/// Boa context managed by the bridge.
pub mod engine;
/// Error types for script operations.
pub mod error;
/// References to JavaScript values.
pub mod object;
/// JavaScript states.
pub mod state;
/// Values exchanged with scripts.
pub mod value;

pub use config::{EngineConfig, LimitsConfig};
pub use engine::JsEngine;
pub use error::{ScriptError, ScriptResult};
pub use object::JsRef;
pub use state::JsState;
pub use value::{Argument, Key, ScriptValue, ValueKind};
