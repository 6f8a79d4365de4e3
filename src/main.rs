//! cumulus-exporter binary entry point
//!
//! Loads the configuration, builds the enabled sources and serves the
//! scrape endpoint. Core functionality is provided by the
//! `cumulus_exporter` library crate.

use clap::Parser;
use cumulus_exporter::{
    collector,
    config::{AppConfig, parse_poll_timeout},
    server::{AppState, create_router},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::{
    EnvFilter, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Prometheus exporter for Cumulus Linux switches
#[derive(Parser, Debug)]
#[command(name = "cumulus-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when absent)
    #[arg(short, long, env = "CUMULUS_EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config file)
    #[arg(long, env = "CUMULUS_EXPORTER_LISTEN_ADDRESS")]
    listen_address: Option<SocketAddr>,

    /// Path under which to expose metrics (overrides config file)
    #[arg(long, env = "CUMULUS_EXPORTER_METRICS_PATH")]
    metrics_path: Option<String>,

    /// Per-collector poll deadline such as 30s (overrides config file)
    #[arg(long, env = "CUMULUS_EXPORTER_POLL_TIMEOUT", value_parser = parse_poll_timeout)]
    poll_timeout: Option<Duration>,

    /// The level the application logs at (RUST_LOG takes precedence)
    #[arg(long, default_value = "info", env = "CUMULUS_EXPORTER_LOG_LEVEL")]
    log_level: String,

    /// Enable ASIC collector
    #[arg(long = "collectors.asic", env = "CUMULUS_EXPORTER_COLLECTORS_ASIC")]
    collectors_asic: bool,

    /// Enable hwmon collector
    #[arg(long = "collectors.hwmon", env = "CUMULUS_EXPORTER_COLLECTORS_HWMON")]
    collectors_hwmon: bool,

    /// hwmon collector sensor list file
    #[arg(long = "collectors.hwmon.config", env = "CUMULUS_EXPORTER_HWMON_CONFIG")]
    hwmon_config: Option<PathBuf>,

    /// Enable smonctl collector
    #[arg(long = "collectors.smonctl", env = "CUMULUS_EXPORTER_COLLECTORS_SMONCTL")]
    collectors_smonctl: bool,

    /// Enable mstpd collector
    #[arg(long = "collectors.mstpd", env = "CUMULUS_EXPORTER_COLLECTORS_MSTPD")]
    collectors_mstpd: bool,

    /// mstpctl binary path
    #[arg(
        long = "collectors.mstpd.mstpctl-path",
        env = "CUMULUS_EXPORTER_MSTPCTL_PATH"
    )]
    mstpctl_path: Option<PathBuf>,
}

impl Cli {
    /// Apply CLI/env overrides (CLI > ENV > config file).
    fn apply(&self, config: &mut AppConfig) {
        if let Some(addr) = self.listen_address {
            config.server.bind = addr.ip().to_string();
            config.server.port = addr.port();
        }
        if let Some(path) = &self.metrics_path {
            config.server.metrics_path = path.clone();
        }
        if let Some(timeout) = self.poll_timeout {
            config.poll_timeout = timeout;
        }

        let collectors = &mut config.collectors;
        collectors.asic.enabled |= self.collectors_asic;
        collectors.hwmon.enabled |= self.collectors_hwmon;
        collectors.smonctl.enabled |= self.collectors_smonctl;
        collectors.mstpd.enabled |= self.collectors_mstpd;

        if let Some(path) = &self.hwmon_config {
            collectors.hwmon.config = Some(path.clone());
            collectors.hwmon.sensors.clear();
        }
        if let Some(path) = &self.mstpctl_path {
            collectors.mstpd.mstpctl_path = path.clone();
        }
    }
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins over `--log-level`; an unknown level falls back to info.
fn init_tracing(log_level: &str) {
    let level = LevelFilter::from_str(log_level).ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(level.unwrap_or(LevelFilter::INFO).into())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if level.is_none() {
        tracing::warn!(level = %log_level, "Log level is unknown, using info");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting cumulus-exporter"
    );

    // Load configuration from file
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let orchestrator = collector::from_config(&config);
    if orchestrator.is_empty() {
        tracing::warn!("No collector enabled, only exporter metrics will be served");
    }

    tracing::info!(
        collectors = ?orchestrator.source_names(),
        poll_timeout = ?config.poll_timeout,
        "Collectors ready"
    );

    // Create web server state
    let app_state =
        AppState::new(orchestrator).with_metrics_path(config.server.metrics_path.clone());

    // Build Axum router
    let app = create_router(app_state);

    let addr = config.listen_address()?;
    tracing::info!("Listening on: http://{}{}", addr, config.server.metrics_path);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
