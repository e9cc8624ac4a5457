//! Chain Connector — Entry Point
//!
//! Initializes configuration, logging, the ledger store, and one chain
//! connector per configured chain. Runs until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open JSONL ledger store (replays the event log)
//! 4. Build Prometheus metrics registry, spawn /metrics exporter
//! 5. Spawn health server (/live + /ready)
//! 6. Per chain: HTTP gateway → ChainConnector (activation probed once)
//! 7. Start boot-time deposit watch targets from config
//! 8. Wait for SIGINT → graceful shutdown (stop monitors→drain→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::ledger::JsonlLedger;
use adapters::metrics::MetricsRegistry;
use adapters::rpc::{HttpRpcGateway, RpcClientConfig};
use usecases::connector::ChainConnector;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        chains = config.chains.len(),
        "Starting chain connector"
    );

    // ── 3. Shutdown signal channels ─────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let (health_tx, health_rx) = watch::channel(true);

    // ── 4. Open the durable ledger store ────────────────────
    let ledger = Arc::new(
        JsonlLedger::open(&config.ledger.data_dir)
            .await
            .context("Failed to open ledger store")?,
    );

    // ── 5. Metrics registry + exporter ──────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics")?);
    let metrics_handle = if config.metrics.enabled {
        let serve_metrics = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        let rx = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = serve_metrics.serve(bind, rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }))
    } else {
        None
    };

    // ── 6. Health server (/live + /ready) ───────────────────
    let health_handle = tokio::spawn(serve_health(
        health_rx,
        config.service.health_bind_address.clone(),
    ));

    // ── 7. One connector per configured chain ───────────────
    let mut connectors: Vec<Arc<ChainConnector<HttpRpcGateway, JsonlLedger>>> = Vec::new();
    for chain in &config.chains {
        let gateway = Arc::new(
            HttpRpcGateway::new(RpcClientConfig::from_chain(chain))
                .with_context(|| format!("Failed to build gateway for chain {}", chain.name))?,
        );
        let connector = Arc::new(ChainConnector::new(
            chain,
            gateway,
            Arc::clone(&ledger),
            Arc::clone(&metrics),
        ));

        // ── 8. Boot-time deposit surveillance ───────────────
        for target in &chain.watch {
            match connector.monitor(&target.wallet_id, &target.address).await {
                Ok(()) => info!(
                    chain = %chain.name,
                    wallet_id = %target.wallet_id,
                    address = %target.address,
                    "Watching deposit address"
                ),
                Err(e) => warn!(
                    chain = %chain.name,
                    wallet_id = %target.wallet_id,
                    error = %e,
                    "Could not start deposit watch"
                ),
            }
        }

        connectors.push(connector);
    }

    info!(connectors = connectors.len(), "All chain connectors wired — service is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown ───────────────────────────────────

    // 1. Mark readiness probe unhealthy (→ 503)
    let _ = health_tx.send(false);

    // 2. Stop all deposit monitoring loops
    for connector in &connectors {
        connector.shutdown().await;
    }

    // 3. Signal servers to stop
    let _ = shutdown_tx.send(());

    // 4. Wait for the metrics exporter (up to 5s)
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }

    // 5. Stop health server
    health_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

/// Serve health endpoints.
///
/// - `/live`  — Liveness probe: 200 if process is running
/// - `/ready` — Readiness probe: 503 during graceful shutdown
async fn serve_health(
    health_rx: watch::Receiver<bool>,
    bind_address: String,
) -> Result<()> {
    use axum::{extract::State, http::StatusCode, routing::get, Router};

    let app = Router::new()
        .route("/live", get(|| async { StatusCode::OK }))
        .route(
            "/ready",
            get(
                move |State(rx): State<watch::Receiver<bool>>| async move {
                    if *rx.borrow() {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                },
            ),
        )
        .with_state(health_rx);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Health server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
