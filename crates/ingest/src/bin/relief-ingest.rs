//! relief-ingest: pull upstream humanitarian datasets into the static data tree.
//!
//! ```text
//! relief-ingest run [--source NAME]... [--data-dir DIR]
//! relief-ingest manifest [--data-dir DIR]
//! relief-ingest sources
//! ```
//! Exits 0 only when every dataset of the run succeeded.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use relief_core::Config;
use relief_fetch::ReqwestTransport;
use relief_ingest::{select_sources, Orchestrator, ALL_SOURCES};

// ── CLI ─────────────────────────────────────────────────────────────

/// Humanitarian dataset ingestion: fetch, normalize, partition, publish.
#[derive(Parser, Debug)]
#[command(name = "relief-ingest", version, about)]
struct Cli {
    /// Output root; overrides DATA_DIR from the environment/profile.
    #[arg(long, env = "RELIEF_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline for all sources, or only the named ones.
    Run {
        /// Source to run (repeatable).
        #[arg(
            long = "source",
            value_name = "NAME",
            env = "RELIEF_SOURCES",
            value_delimiter = ','
        )]
        sources: Vec<String>,
    },
    /// Rebuild manifest.json from what is already on disk.
    Manifest,
    /// List registered sources and their datasets.
    Sources,
}

fn load_config(data_dir: Option<PathBuf>) -> anyhow::Result<Config> {
    relief_core::config::load_dotenv();
    let mut config = Config::from_env();
    if let Some(dir) = data_dir {
        if config.storage.fallback_dir == config.storage.data_dir.join("fallback") {
            config.storage.fallback_dir = dir.join("fallback");
        }
        config.storage.data_dir = dir;
    }
    config.validate().context("invalid configuration")?;
    config.log_summary();
    Ok(config)
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Sources => {
            print_sources();
            Ok(ExitCode::SUCCESS)
        }
        Command::Manifest => {
            let config = load_config(cli.data_dir)?;
            let transport = Arc::new(ReqwestTransport::new(&config.fetch));
            let update = Orchestrator::new(config, transport)
                .aggregate()
                .context("failed to rebuild manifest")?;
            let manifest = &update.manifest;
            println!(
                "Manifest: {} sources, {} datasets, {} records, {} bytes, {} warnings{}",
                manifest.totals.sources,
                manifest.totals.datasets,
                manifest.totals.records,
                manifest.totals.size_bytes,
                manifest.warnings.len(),
                if update.unchanged { " (unchanged)" } else { "" }
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { sources } => {
            let selected = select_sources(&sources)?;
            let config = load_config(cli.data_dir)?;

            let transport = Arc::new(ReqwestTransport::new(&config.fetch));
            let orchestrator = Orchestrator::new(config, transport);
            let report = orchestrator
                .run(&selected)
                .await
                .context("ingestion run failed")?;

            print!("{}", report.render_summary());
            info!(exit_code = report.exit_code(), "ingestion run complete");
            Ok(if report.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn print_sources() {
    for source in ALL_SOURCES {
        println!("{}  {}", source.name, source.base_url);
        for dataset in source.datasets {
            let fallback = dataset
                .endpoints
                .iter()
                .any(|e| e.fallback_file.is_some());
            println!(
                "  {:<18} {} endpoint(s), recent {} days{}",
                dataset.name,
                dataset.endpoints.len(),
                dataset.recent_days,
                if fallback { ", fallback snapshot" } else { "" }
            );
        }
    }
}
