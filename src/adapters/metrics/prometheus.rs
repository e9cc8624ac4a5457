//! Prometheus Metrics Registry - Connector Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards:
//! deposit crediting, withdrawal outcomes, poll errors, and call-queue
//! depth, all labeled by chain.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Centralized Prometheus metrics for the chain connector.
///
/// All metrics follow the naming convention `chain_connector_*` and carry a
/// `chain` label for multi-chain filtering.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Deposits credited to the ledger.
    pub deposits_credited: IntCounterVec,
    /// Deposits observed but skipped (duplicate, destination mismatch).
    pub deposits_skipped: IntCounterVec,
    /// Deposit poll cycles that failed.
    pub deposit_poll_errors: IntCounterVec,
    /// Withdrawals confirmed on-chain.
    pub withdrawals_confirmed: IntCounterVec,
    /// Withdrawals that ended FAILED, by reason.
    pub withdrawals_failed: IntCounterVec,
    /// Current rate-limited call queue depth.
    pub queue_depth: IntGaugeVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let deposits_credited = IntCounterVec::new(
            Opts::new(
                "chain_connector_deposits_credited_total",
                "Deposits credited to the ledger",
            ),
            &["chain"],
        )?;

        let deposits_skipped = IntCounterVec::new(
            Opts::new(
                "chain_connector_deposits_skipped_total",
                "Observed deposits skipped without crediting",
            ),
            &["chain", "reason"],
        )?;

        let deposit_poll_errors = IntCounterVec::new(
            Opts::new(
                "chain_connector_deposit_poll_errors_total",
                "Deposit poll cycles that failed",
            ),
            &["chain"],
        )?;

        let withdrawals_confirmed = IntCounterVec::new(
            Opts::new(
                "chain_connector_withdrawals_confirmed_total",
                "Withdrawals confirmed on-chain",
            ),
            &["chain"],
        )?;

        let withdrawals_failed = IntCounterVec::new(
            Opts::new(
                "chain_connector_withdrawals_failed_total",
                "Withdrawals recorded as FAILED",
            ),
            &["chain", "reason"],
        )?;

        let queue_depth = IntGaugeVec::new(
            Opts::new(
                "chain_connector_queue_depth",
                "Operations waiting in the rate-limited call queue",
            ),
            &["chain"],
        )?;

        // Register all metrics
        registry.register(Box::new(deposits_credited.clone()))?;
        registry.register(Box::new(deposits_skipped.clone()))?;
        registry.register(Box::new(deposit_poll_errors.clone()))?;
        registry.register(Box::new(withdrawals_confirmed.clone()))?;
        registry.register(Box::new(withdrawals_failed.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            registry,
            deposits_credited,
            deposits_skipped,
            deposit_poll_errors,
            withdrawals_confirmed,
            withdrawals_failed,
            queue_depth,
        })
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let registry = metrics_self.registry.clone();
                async move {
                    let encoder = TextEncoder::new();
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                        tracing::warn!(error = %e, "Failed to encode metrics");
                    }
                    String::from_utf8(buffer).unwrap_or_default()
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_without_collision() {
        let metrics = MetricsRegistry::new().expect("registry builds");
        metrics.deposits_credited.with_label_values(&["bsc"]).inc();
        metrics
            .deposits_skipped
            .with_label_values(&["bsc", "duplicate"])
            .inc();
        metrics.queue_depth.with_label_values(&["bsc"]).set(3);

        assert!(metrics.registry.gather().len() >= 3);
    }
}
