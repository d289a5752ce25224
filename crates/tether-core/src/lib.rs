//! Cross-runtime reference lifetimes for embedded scripting runtimes.
//!
//! This crate reconciles two collectors that know nothing of each other:
//! - [`RuntimeHandle`] shares one embedded runtime among host-side owners and
//!   destroys it when the last owner lets go
//! - [`Registry`] pins embedded values by integer id
//! - [`ValueReference`] ties one pinned id to the runtime it depends on
//! - [`BridgeObject`] is what host code holds; dropping it releases the pin
//!   before the runtime acquisition
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

/// Host-visible wrappers finalized on drop.
pub mod bridge;
/// Registry and runtime configuration.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Counted runtime ownership.
pub mod handle;
/// References to pinned values.
pub mod reference;
/// Pinning table.
pub mod registry;
/// Embedded runtime contract.
pub mod runtime;
/// Runtime storage behind a handle.
mod slot;
#[cfg(test)]
mod testing;

pub use bridge::BridgeObject;
pub use config::{BridgeConfig, RegistryConfig};
pub use error::{BridgeError, Result};
pub use handle::{HandleId, RuntimeHandle};
pub use reference::ValueReference;
pub use registry::{Registry, RegistryId};
pub use runtime::EmbeddedRuntime;
