//! reelsmith binary. `DEPLOYMENT_MODE` picks what this process does.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_api::{create_router, metrics, AppConfig, AppState};
use reel_sources::NewsClient;
use reel_worker::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    init_tracing();
    info!("Starting reelsmith");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(kind = %e.kind().as_str(), "Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        mode = %config.mode,
        host = %config.api.host,
        port = config.api.port,
        store = ?config.store.backend,
        "Configuration loaded"
    );

    let metrics_handle = if config.api.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    let state = match AppState::new(config.clone()).await {
        Ok(s) => s,
        Err(e) => {
            error!(kind = %e.kind().as_str(), "Failed to create application state: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let orchestrator_task = match (&state.pipeline, config.mode.runs_orchestrator()) {
        (Some(pipeline), true) => {
            let news = NewsClient::new(&config.sources).context("Failed to build news client")?;
            let orchestrator =
                Orchestrator::new(config.orchestrator.clone(), news, Arc::clone(pipeline));
            Some(tokio::spawn(async move { orchestrator.run(shutdown_rx).await }))
        }
        _ => None,
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port)
        .parse()
        .context("Invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Lets a running cycle finish its current reel before exiting.
    let _ = shutdown_tx.send(true);
    if let Some(task) = orchestrator_task {
        if let Err(e) = task.await {
            warn!("Orchestrator task ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
