//! Balancer telemetry console.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                   TELEMETRY CLIENT                        │
//!                 │                                                           │
//!  /metrics/ws    │  ┌──────────┐    ┌──────────┐    ┌──────────────────┐     │
//!  ───────────────┼─▶│  ingest  │───▶│ protocol │───▶│ registry+history │──┐  │
//!                 │  │  client  │    │  decode  │    │   (session)      │  │  │
//!                 │  └──────────┘    └──────────┘    └──────────────────┘  │  │
//!                 │                                                        ▼  │
//!  /api/*         │  ┌──────────┐    ┌──────────────┐              ┌────────┐ │
//!  ───────────────┼─▶│ polling  │───▶│  aggregates  │─────────────▶│  view  │─┼──▶ stdout
//!                 │  │aggregator│    │ (last good)  │              │ format │ │
//!                 │  └──────────┘    └──────────────┘              └────────┘ │
//!                 │                                                           │
//!                 │  config · lifecycle · observability · resilience          │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use balancer_telemetry::config::{load_config, validation::validate_config, ConfigError, TelemetryConfig};
use balancer_telemetry::lifecycle::signals::shutdown_signal;
use balancer_telemetry::observability::{logging, metrics};
use balancer_telemetry::polling::PollingAggregator;
use balancer_telemetry::view::DashboardView;
use balancer_telemetry::{Dashboard, Session};

#[derive(Parser)]
#[command(name = "balancer-telemetry")]
#[command(about = "Live replica telemetry for the load balancer", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the balancer base URL (e.g. http://localhost:9000).
    #[arg(short, long)]
    url: Option<String>,

    /// Override the log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Poll the aggregate resources once, print them and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TelemetryConfig::default(),
    };
    if let Some(url) = cli.url {
        config.endpoint.base_url = url;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_level);
    tracing::info!("balancer-telemetry v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        base_url = %config.endpoint.base_url,
        poll_interval_ms = config.polling.interval_ms,
        history_samples = config.history.max_samples,
        reconnect = config.stream.reconnect.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    if cli.once {
        let session = Arc::new(Session::new(config.history.max_samples));
        let poller = PollingAggregator::new(&config, session.clone())?;
        let report = poller.poll_once().await;
        tracing::debug!(?report, "Poll cycle finished");
        print!("{}", DashboardView::build(&session).render_text());
        return Ok(());
    }

    let dashboard = Dashboard::start(&config)?;
    let mut redraw = tokio::time::interval(Duration::from_millis(config.dashboard.refresh_ms));
    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = redraw.tick() => {
                let view = DashboardView::build(dashboard.session());
                // clear screen, cursor home
                print!("\x1b[2J\x1b[H{}", view.render_text());
                if dashboard.stream_finished() {
                    println!("(stream disconnected, showing last known state)");
                }
            }
            _ = &mut signal => break,
        }
    }

    dashboard.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
