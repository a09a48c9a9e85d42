//! Command handlers

use crate::settings::AppConfig;
use anyhow::{Context, Result};
use orchestrator::{BatchDriver, BatchSummary, ProcessRunner, WorkerReply};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use storage::{CanonicalId, CheckpointStore, DirectorySink};
use target_pipeline::{DirectorySource, TargetPipeline, TargetRecord};
use tracing::{info, warn};

/// Exit code when the batch finished but some targets failed
pub const EXIT_PARTIAL: u8 = 3;

/// Target ids from a list file: one per line, blank lines and `#` comments ignored
pub fn read_targets(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read target list {}", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn build_pipeline(config: &AppConfig) -> TargetPipeline {
    let source = Arc::new(DirectorySource::new(&config.source.root));
    TargetPipeline::new(
        source,
        config.conditioner.clone(),
        config.search.clone(),
        &config.pipeline,
    )
}

/// Drive a batch through worker processes
pub fn run_batch(
    config: &AppConfig,
    config_path: Option<&Path>,
    targets_file: &Path,
    workers: Option<usize>,
    resume: bool,
) -> Result<BatchSummary> {
    let targets = read_targets(targets_file)?;
    info!("Loaded {} target ids from {}", targets.len(), targets_file.display());

    let budget = config.search.budget_secs;
    if budget > 0 && config.orchestrator.task_timeout_secs <= budget {
        warn!(
            "Task timeout {}s does not exceed the search budget {}s; slow targets will be killed before the search can finish",
            config.orchestrator.task_timeout_secs, budget
        );
    }

    let program = std::env::current_exe().context("Cannot locate the fluxscan executable")?;
    let runner = ProcessRunner::new(program, AppConfig::file_for_workers(config_path));
    let checkpoint = CheckpointStore::open(
        &config.storage.checkpoint_dir,
        config.storage.compact_every,
    )
    .with_context(|| {
        format!(
            "Failed to open checkpoint in {}",
            config.storage.checkpoint_dir.display()
        )
    })?;
    let sink = DirectorySink::open(&config.storage.records_dir).with_context(|| {
        format!(
            "Failed to open record sink in {}",
            config.storage.records_dir.display()
        )
    })?;
    let workers = workers.unwrap_or_else(|| config.orchestrator.resolved_workers());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let mut driver = BatchDriver::new(
        runner,
        checkpoint,
        Box::new(sink),
        config.orchestrator.clone(),
    );
    let summary = runtime
        .block_on(driver.start(&targets, workers, resume))
        .context("Batch aborted")?;
    Ok(summary)
}

/// Process one target and write the encoded reply to stdout
pub fn run_worker(config: &AppConfig, target: &str) -> Result<()> {
    let reply = match CanonicalId::parse(target) {
        Ok(id) => {
            let mut config = config.clone();
            config.pipeline.signal_budget = true;
            WorkerReply::from_result(build_pipeline(&config).process(&id))
        }
        Err(e) => WorkerReply::internal(e.to_string()),
    };
    write_reply(&reply)
}

/// Write a worker reply to stdout
pub fn write_reply(reply: &WorkerReply) -> Result<()> {
    let bytes = reply.encode().context("Failed to encode worker reply")?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&bytes)
        .and_then(|_| stdout.flush())
        .context("Failed to write worker reply")
}

/// Process one target in-process
pub fn run_extract(config: &AppConfig, target: &str) -> Result<TargetRecord> {
    let id = CanonicalId::parse(target)?;
    build_pipeline(config)
        .process(&id)
        .with_context(|| format!("Extraction failed for {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_targets_skips_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.txt");
        fs::write(&path, "# quiet stars\nKIC 8462852\n\n  TIC 307210830  # hot\n#KIC 1\n").unwrap();
        assert_eq!(
            read_targets(&path).unwrap(),
            vec!["KIC 8462852".to_string(), "TIC 307210830".to_string()]
        );
    }

    #[test]
    fn test_extract_missing_target_fails() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.source.root = dir.path().to_path_buf();
        let err = run_extract(&config, "KIC 5").unwrap_err();
        assert!(format!("{:#}", err).contains("No samples found"));
    }
}
