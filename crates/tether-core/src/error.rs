use core::result::Result as CoreResult;
use std::io::Error as IoError;

use thiserror::Error;
use toml::de::Error as TomlError;

use crate::handle::HandleId;
use crate::registry::RegistryId;

/// Result type for bridge operations.
pub type Result<T> = CoreResult<T, BridgeError>;

/// Errors raised while managing cross-runtime lifetimes.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A registry id was used after it was released, or never existed.
    #[error("Stale reference: registry id {0} is not pinned")]
    StaleReference(RegistryId),

    /// An operation reached a runtime whose reference count already hit zero.
    #[error("Runtime {0} has already been disposed")]
    RuntimeDisposed(HandleId),

    /// The registry refused to pin another value.
    #[error("Registry exhausted: {limit} values are already pinned")]
    RegistryFull {
        /// Configured maximum number of live pins.
        limit: usize,
    },

    /// A runtime wrapper was asked for the value it does not wrap.
    #[error("Runtime wrapper {0} does not wrap a value")]
    NotAValue(HandleId),

    /// A reference pinned on one runtime was handed to another.
    #[error("Reference belongs to runtime {found}, expected {expected}")]
    ForeignReference {
        /// Runtime the caller operates on.
        expected: HandleId,
        /// Runtime the reference was pinned on.
        found: HandleId,
    },

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),
}

impl BridgeError {
    /// Determines whether this error reports a broken lifetime invariant.
    ///
    /// Stale lookups are ordinary misuse the caller can recover from; a disposed
    /// runtime or a cross-runtime reference means ownership was tracked wrongly.
    pub fn is_lifetime_violation(&self) -> bool {
        matches!(
            self,
            Self::RuntimeDisposed(_) | Self::ForeignReference { .. }
        )
    }
}
