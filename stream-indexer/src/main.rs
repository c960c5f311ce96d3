//! Stream Indexer
//!
//! Receives Chainhook webhook deliveries and payment gateway callbacks and
//! serves the projection's real-time feed.

use anyhow::Result;
use clap::Parser;
use stream_indexer::{api, IndexerConfig, ServiceContainer};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stream-indexer")]
#[command(about = "Chainhook ingestion and projection service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "indexer.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Shared secret expected from the notifier
    #[arg(long, env = "CHAINHOOK_AUTH_TOKEN", hide_env_values = true)]
    chainhook_token: Option<String>,

    /// HMAC key for payment gateway callbacks
    #[arg(long, env = "PAYMENT_WEBHOOK_SECRET", hide_env_values = true)]
    payment_secret: Option<String>,

    /// Projection store connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Dry run mode (validate config and exit)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_found = std::path::Path::new(&cli.config).exists();
    let mut config = if config_found {
        IndexerConfig::from_file(&cli.config)?
    } else {
        IndexerConfig::default()
    };

    if let Some(log_level) = cli.log_level {
        config.monitoring.log_level = log_level;
    }
    if let Some(token) = cli.chainhook_token {
        config.auth.chainhook_token = Some(token);
    }
    if let Some(secret) = cli.payment_secret {
        config.auth.payment_secret = Some(secret);
    }
    if let Some(url) = cli.database_url {
        config.storage.url = url;
    }

    init_logging(&config);
    if !config_found {
        warn!("Config file not found, using defaults: {}", cli.config);
    }

    info!("Starting Stream Indexer");
    info!("Storage backend: {:?}", config.storage.backend);
    info!("Chain node: {}", config.chain.node_url);

    config.check()?;
    info!("Configuration validated successfully");

    if cli.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let container = ServiceContainer::new(config).await?;
    container.health_check().await?;

    info!("Starting API server on {}", container.config.server.bind_address);
    let api_server = api::start_server(container.api_state(), &container.config.server).await?;

    let cleanup_every = Duration::from_secs(container.config.rate_limit.cleanup_interval_secs);
    tokio::spawn(api::gate::cleanup_task(container.gate.clone(), cleanup_every));

    let metrics_port = container.config.monitoring.metrics_port;
    let _metrics_server = if metrics_port > 0 {
        info!("Starting metrics server on port {}", metrics_port);
        Some(api::start_metrics_server(metrics_port, container.metrics.clone(), container.projection.clone()).await?)
    } else {
        None
    };

    info!("Indexer started successfully. Press Ctrl+C to shutdown.");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = api_server => {
            if let Err(e) = result {
                error!("API server task error: {}", e);
            }
        }
    }

    info!("Shutting down Stream Indexer");
    Ok(())
}

fn init_logging(config: &IndexerConfig) {
    let log_level = config.monitoring.log_level.parse().unwrap_or(tracing::Level::INFO);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("stream_indexer={},tower_http=info", log_level).into());

    if config.monitoring.structured_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
