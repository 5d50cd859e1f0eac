//! Prometheus exporter for Homebrew analytics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use homebrew_exporter::{
    ExporterConfig, HomebrewCollector, HttpServer, HttpSourceClient, ScrapePipeline,
    SourceRegistry,
};

/// Prometheus exporter for Homebrew analytics.
#[derive(Parser, Debug)]
#[command(name = "homebrew-exporter")]
#[command(about = "Export Homebrew formula analytics as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config and LISTEN_PORT).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::read_file(config_path)?
    } else {
        ExporterConfig::default()
    };
    config.apply_env()?;

    // Override from CLI
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    homebrew_analytics::init_tracing(&config.logging)?;

    info!("Starting Homebrew Prometheus Exporter");

    if config.analytics.formulae.is_empty() {
        warn!("No formulae configured, metric families will be empty");
    } else {
        info!(formulae = ?config.analytics.formulae, "Tracking formulae");
    }

    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Create components
    let client =
        HttpSourceClient::new(Duration::from_secs(config.analytics.request_timeout_secs))?;
    let registry = SourceRegistry::new(&config.analytics.base_url);
    let pipeline = ScrapePipeline::new(
        client,
        registry,
        Duration::from_secs(config.analytics.scrape_timeout_secs),
    );
    let collector = Arc::new(HomebrewCollector::new(
        pipeline,
        config.analytics.formulae.clone(),
    ));
    let http_server = HttpServer::new(collector, listen_addr, config.prometheus.path.clone());

    // Start HTTP server
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    // Wait for shutdown signal, or for the server to fail on its own
    tokio::select! {
        result = &mut http_task => {
            return result?;
        }
        _ = shutdown_signal() => {}
    }

    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(Duration::from_secs(5), http_task).await {
        Ok(result) => result??,
        Err(_) => warn!("HTTP server did not stop within 5s"),
    }

    info!("Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down...");
    }
}
