//! Configuration for registries and the runtimes that own them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BridgeError, Result};

/// Registry ids are `u32`, so no registry ever addresses more slots
const MAX_SLOTS: usize = u32::MAX as usize;

/// Bridge-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Registry sizing and limits
    pub registry: RegistryConfig,
}

/// Registry sizing and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Number of slots reserved up front
    pub initial_capacity: usize,
    /// Maximum number of simultaneously pinned values, unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_references: Option<usize>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
            max_references: None,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate config from TOML text
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML or fails validation
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!(
            "Loaded bridge config from {:?}: max_references={:?}",
            path, config.registry.max_references
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| BridgeError::Config(format!("Failed to serialize config: {error}")))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check that the values are usable
    ///
    /// # Errors
    /// Returns `Config` if `registry.max_references` is zero, or if
    /// `registry.initial_capacity` exceeds `registry.max_references` or the
    /// number of addressable ids
    pub fn validate(&self) -> Result<()> {
        let registry = &self.registry;
        if registry.max_references == Some(0) {
            return Err(BridgeError::Config(
                "registry.max_references must be at least 1".to_owned(),
            ));
        }
        let ceiling = registry.max_references.unwrap_or(MAX_SLOTS).min(MAX_SLOTS);
        if registry.initial_capacity > ceiling {
            return Err(BridgeError::Config(format!(
                "registry.initial_capacity must be at most {ceiling}, got {}",
                registry.initial_capacity
            )));
        }
        Ok(())
    }
}
