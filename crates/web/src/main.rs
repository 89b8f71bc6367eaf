//! Reelcheck API server
//!
//! Wires the configured inference adapters into the orchestrator and
//! serves the HTTP API.

use clap::Parser;
use reelcheck_engine::{CommandDetector, CommandRecognizer, Orchestrator};
use reelcheck_web::config::ServerConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "reelcheckd")]
#[command(about = "Reelcheck - vision-driven compliance testing for browser slot games")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "reelcheck.toml")]
    config: PathBuf,

    /// HTTP listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Reelcheck v{}", reelcheck_common::VERSION);

    let mut config = ServerConfig::load_or_default(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let (detect_program, detect_args) = split_command(&config.adapters.detect_command)
        .ok_or_else(|| anyhow::anyhow!("adapters.detect_command is not configured"))?;
    let (ocr_program, ocr_args) = split_command(&config.adapters.ocr_command)
        .ok_or_else(|| anyhow::anyhow!("adapters.ocr_command is not configured"))?;

    let orchestrator = Arc::new(Orchestrator::new(
        &config.engine,
        Arc::new(CommandDetector::new(detect_program, detect_args)),
        Arc::new(CommandRecognizer::new(ocr_program, ocr_args)),
    ));

    orchestrator
        .store()
        .spawn_eviction(Duration::from_secs(config.engine.eviction_interval_secs));

    reelcheck_web::server::serve(config, orchestrator).await
}

fn split_command(command: &[String]) -> Option<(String, Vec<String>)> {
    let (program, args) = command.split_first()?;
    Some((program.clone(), args.to_vec()))
}
