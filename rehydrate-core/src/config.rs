//! Configuration types for the Rehydrate runtime

use crate::capture::DEFAULT_CAPTURE_LIMIT;
use crate::error::{RehydrateError, Result};
use crate::ids::DEFAULT_ID_LENGTH;
use crate::storage::StorageScope;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for one runtime
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Mutation capture configuration
    pub capture: CaptureConfig,

    /// Replay configuration
    pub replay: ReplayConfig,

    /// Persistence configuration
    pub storage: StorageConfig,

    /// Identifier generation configuration
    pub ids: IdConfig,
}

/// Mutation capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture mutations at all; when false `capture()` is a silent no-op
    pub enabled: bool,

    /// Maximum number of records kept in the log
    pub limit: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: DEFAULT_CAPTURE_LIMIT,
        }
    }
}

/// Replay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    /// Replay persisted logs; when false `replay()` succeeds without applying anything
    pub enabled: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Scope the log and cursor are written to
    pub scope: StorageScope,

    /// Directory for the durable file store
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scope: StorageScope::Session,
            data_dir: PathBuf::from("./data/rehydrate"),
        }
    }
}

/// Identifier generation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdConfig {
    /// Length of generated identifiers
    pub length: usize,

    /// Fixed reproducible seed. When unset, roots seed from their content hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_ID_LENGTH,
            seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (`rehydrate.toml`)
    /// 3. Environment variable overrides (`REHYDRATE_CAPTURE__LIMIT=500`)
    /// 4. File named by `REHYDRATE_CONFIG_PATH`, if set
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(RuntimeConfig::default()))
            .merge(Toml::file("rehydrate.toml"))
            .merge(Env::prefixed("REHYDRATE_").split("__"));

        if let Ok(path) = std::env::var("REHYDRATE_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: RuntimeConfig = figment.extract().map_err(|e| {
            RehydrateError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: RuntimeConfig = Figment::from(Serialized::defaults(RuntimeConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                RehydrateError::Configuration(format!(
                    "Failed to load configuration file: {}",
                    e
                ))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.capture.limit == 0 {
            return Err(RehydrateError::Configuration(
                "capture.limit must be greater than zero".to_string(),
            ));
        }
        if self.ids.length == 0 {
            return Err(RehydrateError::Configuration(
                "ids.length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
