//! Harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use harvester::{
    error::Result,
    models::{Config, ExportFormat, ResumeMode},
    pipeline,
    storage::LocalStorage,
};

/// Harvester - resumable directory listing scraper
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Resumable, checkpointed harvester for institute directories"
)]

struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Override the storage directory from the configuration
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest the listing, resuming from the last checkpoint
    Run {
        /// Resume strategy: positional or key_set
        #[arg(long)]
        mode: Option<ResumeMode>,
    },

    /// Show checkpoint and output summary
    Status,

    /// Validate the configuration file
    Validate,

    /// Write a spreadsheet export of the saved output
    Export {
        /// Tab-separated instead of comma-separated
        #[arg(long)]
        tsv: bool,

        /// Export file name inside the storage directory
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load config {}: {}", cli.config.display(), e);
            return Err(e);
        }
    };
    if let Some(dir) = cli.storage_dir {
        config.paths.storage_dir = dir;
    }
    let storage = LocalStorage::from_config(&config.paths);

    match cli.command {
        Command::Run { mode } => {
            if let Some(mode) = mode {
                config.resume.mode = mode;
            }

            let report = pipeline::run_harvest(&config, &storage).await?;

            log::info!(
                "Fetched {} new records in {}s",
                report.fetched,
                (report.finished_at - report.started_at).num_seconds()
            );
            log::info!(
                "Output: {}",
                storage.path(&config.paths.output_file).display()
            );
            log::info!("Completed all pages successfully");
        }

        Command::Status => {
            let status = pipeline::load_status(&storage).await?;

            log::info!("Storage directory: {}", storage.root_dir().display());
            match &status.checkpoint {
                Some(key) => log::info!("Checkpoint: {}", key),
                None => log::info!("Checkpoint: none"),
            }
            log::info!(
                "Records: {} ({} columns)",
                status.record_count,
                status.column_count
            );
            if let Some(updated) = status.updated_at {
                log::info!("Last updated: {}", updated);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (source, detail selectors and paths)");
        }

        Command::Export { tsv, output } => {
            let format = if tsv {
                ExportFormat::Tsv
            } else {
                config.paths.export_format
            };
            let file_name = match (output, config.paths.export_file()) {
                (Some(name), _) => name,
                (None, Some(name)) if !tsv => name.to_string(),
                (None, _) => match format {
                    ExportFormat::Csv => "output.csv".to_string(),
                    ExportFormat::Tsv => "output.tsv".to_string(),
                },
            };

            pipeline::run_export(&storage, &file_name, format).await?;
        }
    }

    Ok(())
}
