//! pimond - modem and power telemetry agent
//!
//! Polls qmicli and the power peripheral on a fixed cadence and forwards the
//! readings to the configured metric sink.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pimond::config::{Config, CONFIG_PATH};
use pimond::invoker::ProcessRunner;
use pimond::modem::{QmiClient, QmiQuery};
use pimond::poller::Poller;

#[derive(Parser, Debug)]
#[command(name = "pimond", version, about = "Modem and power telemetry agent")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Push every metric once and exit
    #[arg(long)]
    once: bool,

    /// Run one qmicli query and print the parsed result as JSON
    #[arg(long, value_name = "QUERY", conflicts_with = "once")]
    dump: Option<QmiQuery>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    init_logging(&config.daemon.log_level);

    info!("pimond v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(query) = cli.dump {
        return dump(&config, query).await;
    }

    let mut poller = Poller::from_config(&config)?;

    if cli.once {
        poller.run_once().await;
        return Ok(());
    }

    poller
        .run(Duration::from_secs(config.daemon.interval_secs), shutdown_signal())
        .await;
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn dump(config: &Config, query: QmiQuery) -> Result<()> {
    let runner = Arc::new(ProcessRunner::new(Duration::from_secs(
        config.modem.command_timeout_secs,
    )));
    let client = QmiClient::new(runner, &config.modem);

    match client.query(query).await {
        Ok(parsed) => {
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(())
        }
        Err(e) => bail!("{} query failed: {}", query, e),
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
