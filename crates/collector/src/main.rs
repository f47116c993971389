use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use collector::{FeedConfig, Manifest, orchestrator, preview};
use common::logger;
use common::models::FetchMode;
use market_data::FeedAdapter;
use market_data::remote::AlphaVantageClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "feed")]
#[command(about = "Collects Alpha Vantage stock prices into a local database", long_about = None)]
#[command(version)]
struct Cli {
    /// Print the first rows of both series for the preview symbols, write nothing
    #[arg(short = 't', long = "test")]
    test: bool,

    /// Run daily (historical) collection instead of intraday
    #[arg(short = 'H', long, conflicts_with = "test")]
    historical: bool,

    /// TOML file with `[[daemon]]` entries (overrides FEED_MANIFEST)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::setup_logger(&cli.log_level);

    let config = FeedConfig::from_env()?;
    debug!(database_url = %config.database_url, "Configuration loaded");

    if cli.test {
        return run_preview(&config).await;
    }

    let mode = if cli.historical {
        FetchMode::Historical
    } else {
        FetchMode::Realtime
    };

    let manifest = match cli.manifest.as_ref().or(config.manifest_path.as_ref()) {
        Some(path) => Manifest::load(path)?,
        None => Manifest::default(),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    orchestrator::run(&config, mode, &manifest, shutdown).await
}

async fn run_preview(config: &FeedConfig) -> anyhow::Result<()> {
    let client = AlphaVantageClient::new(config.api_key.clone(), config.base_url.clone())?;
    let adapter = FeedAdapter::new(Arc::new(client));

    for (mode, result) in
        preview::fetch_preview(&adapter, &config.preview_symbols, &config.fetch_params()).await?
    {
        print!("{}", preview::render(mode, &result, preview::PREVIEW_ROWS));
    }
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, stopping daemons..."),
        _ = terminate => warn!("Received SIGTERM, stopping daemons..."),
    }

    shutdown.cancel();
    info!("Shutdown propagated to all daemons");
}
