use anyhow::{Context, Result};
use clap::Parser;
use pane_collector::{Collector, CollectorConfig, SessionFilter, TmuxAdapter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use watchtower::AppState;
use watchtower::config::{CliOverrides, WatchtowerConfig};
use watchtower::hub::{Hub, start_forwarder};
use watchtower::metrics::ServerMetrics;

#[derive(Parser)]
#[command(name = "watchtower")]
#[command(about = "Stream terminal multiplexer panes to browser dashboards")]
struct Cli {
    /// Config file (missing is fine; defaults and env vars still apply)
    #[arg(long, default_value = "watchtower.toml")]
    config: PathBuf,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Sampling period in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Glob over session names; pass '' to watch every session
    #[arg(long)]
    session_filter: Option<String>,

    /// tmux server socket
    #[arg(long)]
    socket_path: Option<String>,

    /// Directory with the dashboard's static files
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            host: self.host.clone(),
            port: self.port,
            static_dir: self.static_dir.clone(),
            poll_interval_ms: self.poll_interval_ms,
            session_filter: self.session_filter.clone(),
            socket_path: self.socket_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "watchtower=debug,pane_collector=debug,tower_http=debug,info"
    } else {
        "watchtower=info,pane_collector=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config = WatchtowerConfig::load(&cli.config, cli.overrides())?;

    let filter = SessionFilter::new(&config.session_filter)
        .context("Invalid session filter")?;
    let adapter = TmuxAdapter::new(
        config.tmux_binary.clone(),
        config.socket_path.clone(),
        filter,
    );
    let collector = Collector::new(
        adapter,
        CollectorConfig {
            poll_interval: config.poll_interval,
        },
    );
    let updates = collector
        .updates()
        .context("Collector update channel already taken")?;

    let metrics = Arc::new(ServerMetrics::new());
    let hub_shutdown = CancellationToken::new();
    let (hub, hub_handle) = Hub::new(collector.registry(), metrics.clone(), hub_shutdown.clone());
    let hub_task = tokio::spawn(hub.run());
    let forwarder = start_forwarder(updates, hub_handle.clone());

    let app_state = AppState {
        hub: hub_handle,
        registry: collector.registry(),
        collector_stats: collector.stats(),
        metrics,
    };
    let app = watchtower::build_router(app_state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    let actual_addr = listener.local_addr()?;

    collector.start()?;

    info!("Watchtower listening on http://{}", actual_addr);
    info!("WebSocket: ws://{}/ws", actual_addr);
    info!(
        "Watching sessions matching {:?} every {}ms",
        config.session_filter,
        config.poll_interval.as_millis()
    );

    // No graceful drain: open websockets would hold the server up forever.
    let server_result = tokio::select! {
        result = axum::serve(listener, app).into_future() => result.context("Server error"),
        _ = shutdown_signal() => Ok(()),
    };

    info!("Shutting down");
    collector.stop();
    collector.join().await;
    hub_shutdown.cancel();
    if let Err(e) = hub_task.await {
        warn!("Hub task ended abnormally: {}", e);
    }
    forwarder.abort();

    server_result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
