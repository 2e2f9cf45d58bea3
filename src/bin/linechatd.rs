//! linechat daemon - line-protocol TCP chat server
//!
//! Clients connect over TCP, pick a username, then chat, whisper and list
//! users one line at a time.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:5000)
//! linechatd
//!
//! # Listen elsewhere
//! linechatd --addr 127.0.0.1:6000
//! LINECHAT_ADDR=127.0.0.1:6000 linechatd
//!
//! # Use an explicit config file
//! linechatd --config /etc/linechat/config.toml
//!
//! # Enable debug logging
//! RUST_LOG=linechatd=debug linechatd
//!
//! # Export metrics over OTLP
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 linechatd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting, then stop the registry and exit

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use opentelemetry_otlp::WithExportConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use linechatd::config::ServerConfig;
use linechatd::metrics::{MetricsObserver, METER_NAME};
use linechatd::registry::{spawn_registry_with, EventKind};
use linechatd::server::ChatServer;

/// linechat daemon - line-oriented TCP chat server
#[derive(Parser, Debug)]
#[command(name = "linechatd", version, about)]
struct Args {
    /// Address to listen on (overrides config file and LINECHAT_ADDR)
    #[arg(short, long)]
    addr: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("linechatd=info".parse()?)
                .add_directive("linechat_core=info".parse()?)
                .add_directive("linechat_protocol=info".parse()?),
        )
        .init();

    let config = ServerConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_env_overrides()
        .with_listen_addr(args.addr);
    config.validate().context("Invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        addr = %config.listen_addr,
        "linechat daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let meter_provider = init_meter_provider().context("Failed to set up metrics export")?;

    let metrics = Arc::new(MetricsObserver::global());
    let registry = spawn_registry_with(config.event_buffer, metrics.clone());
    info!("Session registry started");

    let server = ChatServer::bind(
        &config.listen_addr,
        registry.clone(),
        cancel_token,
        config.connection_settings(),
    )
    .await
    .context("Failed to start server")?;

    server.run().await;

    registry.stop();
    registry.stopped().await;

    let snapshot = metrics.snapshot();
    let [register, unregister, broadcast, users, whisper] =
        EventKind::ALL.map(|kind| snapshot.messages(kind));
    info!(
        connected_clients = snapshot.connected_clients,
        register,
        unregister,
        broadcast,
        users,
        whisper,
        lines_dropped = snapshot.lines_dropped,
        "Registry totals"
    );

    if let Some(provider) = meter_provider {
        if let Err(e) = provider.shutdown() {
            warn!(error = %e, "Failed to flush metrics");
        }
    }

    info!("linechat daemon stopped");
    Ok(())
}

/// Installs a global OTLP meter provider when `OTEL_EXPORTER_OTLP_ENDPOINT`
/// is set.
///
/// Without it the global provider stays a no-op and only the local totals
/// are kept.
fn init_meter_provider() -> Result<Option<SdkMeterProvider>> {
    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .build()?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", METER_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter).build())
        .with_resource(resource)
        .build();
    opentelemetry::global::set_meter_provider(provider.clone());

    info!(endpoint = %endpoint, "Exporting metrics over OTLP");
    Ok(Some(provider))
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
