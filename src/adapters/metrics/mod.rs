//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics export via axum. Liveness/readiness probes
//! live next to the wiring in `main`.

pub mod prometheus;

pub use prometheus::MetricsRegistry;
