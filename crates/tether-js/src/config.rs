//! Engine configuration: bridge settings plus interpreter limits.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tether_core::{BridgeConfig, BridgeError, Result};
use tracing::debug;

/// Configuration for one JavaScript state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Registry settings shared with the core bridge
    pub bridge: BridgeConfig,
    /// Interpreter limits
    pub limits: LimitsConfig,
}

/// Interpreter limits applied to the context; engine defaults when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum iterations of a single loop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_iteration_limit: Option<u64>,
    /// Maximum call depth
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursion_limit: Option<usize>,
}

impl EngineConfig {
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
        debug!("Loaded engine config from {:?}: {:?}", path, config.limits);
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
    /// Returns `Config` if a limit is zero or the bridge settings are invalid
    pub fn validate(&self) -> Result<()> {
        self.bridge.validate()?;
        if self.limits.recursion_limit == Some(0) {
            return Err(BridgeError::Config(
                "limits.recursion_limit must be at least 1".to_owned(),
            ));
        }
        if self.limits.loop_iteration_limit == Some(0) {
            return Err(BridgeError::Config(
                "limits.loop_iteration_limit must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
