use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use poller_core::config::{default_status_path, PollerConfig, Region};
use poller_core::errors::ConfigError;
use poller_core::logging;
use poller_engine::{IngestError, IngestionLoop, JsonArraySink, StatusError, StatusStore, WindowScheduler};
use tracing::error;

mod report;

#[derive(Parser)]
#[command(name = "activity-poller")]
#[command(about = "Incrementally harvests platform activity records, one time window at a time", long_about = None)]
struct Cli {
    /// Location of the status document
    #[arg(long, global = true, env = "POLLER_STATUS_FILE")]
    status_file: Option<PathBuf>,
    /// Size of the first window, in seconds
    #[arg(long, global = true, env = "POLLER_LOOKBACK_SECS")]
    lookback_secs: Option<u64>,
    /// Default log filter when POLLER_LOG / RUST_LOG are unset
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Request the next window and fetch every pending one (default)
    Run(RunArgs),
    /// Print the persisted status document
    Status,
    /// Show the window a run would request now, without persisting it
    NextWindow,
    /// Show version information
    Version,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Platform region: NA, CA, EU or AP
    #[arg(long, env = "POLLER_REGION")]
    region: Option<Region>,
    /// Give up on remaining windows after this many seconds
    #[arg(long, env = "POLLER_RUN_DEADLINE_SECS")]
    deadline_secs: Option<u64>,
    /// Consecutive credential rejections tolerated per window
    #[arg(long, env = "POLLER_MAX_AUTH_RETRIES")]
    max_auth_retries: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(err) = logging::init_tracing(cli.log_level.as_deref()) {
        eprintln!("⚠️ failed to initialise tracing: {err}");
    }

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "activity poller failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<(), CliError> {
    let status_path = cli.status_file.clone().unwrap_or_else(default_status_path);
    let lookback = Duration::from_secs(
        cli.lookback_secs
            .unwrap_or(poller_core::config::DEFAULT_LOOKBACK_SECS),
    );

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let mut config = PollerConfig::from_env()?;
            config.status_path = status_path;
            config.lookback = lookback;
            if let Some(region) = args.region.filter(|region| *region != config.region) {
                config.set_region(region)?;
            }
            if let Some(secs) = args.deadline_secs {
                config.run_deadline = Some(Duration::from_secs(secs));
            }
            if let Some(max) = args.max_auth_retries {
                config.max_auth_failures = max;
            }
            config.validate()?;

            let sink = JsonArraySink::new(io::stdout());
            let mut ingestion = IngestionLoop::from_config(&config, sink)?;
            let summary = ingestion.run(Utc::now()).await?;
            report::print_run_summary(&summary);
            Ok(())
        }
        Commands::Status => {
            let store = StatusStore::new(status_path);
            let status = store.load()?;
            report::print_status(&status);
            println!(
                "{}",
                serde_json::to_string_pretty(&status).map_err(io::Error::from)?
            );
            Ok(())
        }
        Commands::NextWindow => {
            let store = StatusStore::new(status_path);
            let status = store.load_or_default()?;
            let window = WindowScheduler::new(lookback).next_window(Some(&status), Utc::now());
            report::print_next_window(window.as_ref());
            Ok(())
        }
        Commands::Version => {
            println!("activity-poller v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
