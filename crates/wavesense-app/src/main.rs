//! wavesense: headless live CSI processing with hot-swappable filters, HAR
//! models and plugins.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic devices, modules from ./modules
//! wavesense
//!
//! # Replay a capture at its recorded pace
//! wavesense --replay captures/walk.jsonl --simulate-time
//!
//! # Record what the source delivers
//! wavesense --config config/wavesense.toml --record captures/session.jsonl
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wavesense_app::{App, AppConfig, SourceConfig};

/// Live WiFi CSI activity sensing
#[derive(Parser, Debug)]
#[command(name = "wavesense")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Replay a JSON-lines capture instead of the configured source
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Pace replay with the recorded inter-frame gaps
    #[arg(long, requires = "replay")]
    simulate_time: bool,

    /// Record every sample to this file
    #[arg(long)]
    record: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.replay {
            config.source = SourceConfig::Replay {
                path: path.clone(),
                simulate_time: self.simulate_time,
            };
        }
        if let Some(path) = &self.record {
            config.record_to = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    tracing::info!("wavesense v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);

    let app = App::build(config)?;
    let failures = app.load_modules();
    if failures > 0 {
        tracing::warn!("{} module manifest(s) failed to load", failures);
    }

    let source = app.open_source().await?;
    let summary = app
        .run(source, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!(
        "Processed {} frames ({} dropped), {} predictions, {} module changes",
        summary.reader.accepted,
        summary.reader.dropped,
        summary.predictions,
        summary.changes
    );
    Ok(())
}
