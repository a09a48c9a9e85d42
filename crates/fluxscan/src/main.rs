//! fluxscan - Main Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fluxscan::{
    init_logging, run_batch, run_extract, run_worker, write_reply, AppConfig, EXIT_PARTIAL,
};
use orchestrator::WorkerReply;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "fluxscan", version, about = "Light-curve feature extraction at catalogue scale")]
struct Cli {
    /// Settings file (TOML); defaults to ./fluxscan.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process a list of targets with a pool of worker processes
    Run {
        /// File with one target id per line
        #[arg(long)]
        targets: PathBuf,
        /// Concurrent workers (default: physical cores)
        #[arg(long)]
        workers: Option<usize>,
        /// Skip targets already settled in the checkpoint
        #[arg(long)]
        resume: bool,
    },
    /// Process one target and write the encoded reply to stdout
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        target: String,
    },
    /// Process one target in-process and print its record as JSON
    Extract {
        #[arg(long)]
        target: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fluxscan: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let loaded = AppConfig::load(cli.config.as_deref());

    if let Command::Worker { target } = &cli.command {
        // A worker always answers on stdout, even when it cannot start.
        return match loaded {
            Ok(config) => {
                init_logging(&config.logging.level)?;
                run_worker(&config, target)?;
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                write_reply(&WorkerReply::internal(format!("{:#}", e)))?;
                Ok(ExitCode::SUCCESS)
            }
        };
    }

    let config = loaded?;
    init_logging(&config.logging.level)?;
    info!("=== fluxscan v{} ===", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run {
            targets,
            workers,
            resume,
        } => {
            let summary = run_batch(&config, cli.config.as_deref(), &targets, workers, resume)?;
            if summary.all_succeeded() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_PARTIAL))
            }
        }
        Command::Extract { target } => {
            let record = run_extract(&config, &target)?;
            let json = serde_json::to_string_pretty(&record).context("Failed to encode record")?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Command::Worker { .. } => Ok(ExitCode::SUCCESS),
    }
}
