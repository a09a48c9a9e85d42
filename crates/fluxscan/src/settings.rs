//! Layered application settings
//!
//! Optional TOML file, then `FLUXSCAN__SECTION__KEY` environment variables.
//! Every section has defaults, so an empty configuration is runnable.

use anyhow::{Context, Result};
use orchestrator::OrchestratorConfig;
use periodic_search::SearchConfig;
use serde::{Deserialize, Serialize};
use signal_conditioner::ConditionerConfig;
use std::path::{Path, PathBuf};
use target_pipeline::PipelineConfig;

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "fluxscan.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FLUXSCAN";

/// Where raw segments are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory holding one sub-directory of segment files per target
    pub root: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/raw"),
        }
    }
}

/// Where results and the checkpoint live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub checkpoint_dir: PathBuf,
    pub records_dir: PathBuf,
    /// Journal entries between checkpoint compactions
    pub compact_every: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("data/checkpoint"),
            records_dir: PathBuf::from("data/records"),
            compact_every: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub conditioner: ConditionerConfig,
    pub search: SearchConfig,
    pub pipeline: PipelineConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load from `path` (required when given) or the optional default file,
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;
        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// The config file workers should read: the explicit one, or the
    /// default file when it exists
    pub fn file_for_workers(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        }
    }
}
