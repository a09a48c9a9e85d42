//! fluxscan
//!
//! Batch feature extraction for stellar light curves: command handlers,
//! settings loading and logging setup for the `fluxscan` binary.

mod commands;
mod settings;

pub use commands::{
    read_targets, run_batch, run_extract, run_worker, write_reply, EXIT_PARTIAL,
};
pub use settings::{
    AppConfig, LoggingConfig, SourceConfig, StorageConfig, DEFAULT_CONFIG_FILE, ENV_PREFIX,
};

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging to stderr.
///
/// Stdout is reserved for command output (worker replies, extracted records).
pub fn init_logging(level: &str) -> Result<()> {
    let level: Level = level
        .parse()
        .map_err(|_| anyhow!("Unknown log level {:?}", level))?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))
}
