//! Configuration Module - TOML-based Connector Configuration
//!
//! Loads and validates configuration from `config.toml`. All provider
//! endpoints, chain parameters, and timing knobs are externalized here -
//! nothing is hardcoded in the usecases layer, which keeps the polling and
//! confirmation cadences testable at millisecond scale.

pub mod loader;

use serde::Deserialize;

/// Top-level connector configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated before
/// any connector is constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Durable ledger storage settings.
  pub ledger: LedgerConfig,
  /// Metrics export settings.
  pub metrics: MetricsConfig,
  /// One section per supported chain.
  pub chains: Vec<ChainConfig>,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Health probe bind address (/live, /ready).
  #[serde(default = "default_health_addr")]
  pub health_bind_address: String,
}

/// Ledger storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
  /// Directory for the JSONL event log and wallet registry.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

/// Metrics export configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

/// Configuration for one supported chain.
///
/// Provider endpoints and credentials are ALWAYS in config - never
/// hardcoded.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  /// Chain identifier (e.g. "bsc", "tron").
  pub name: String,
  /// Provider API base URL.
  pub rpc_url: String,
  /// Provider API key, if the provider requires one.
  pub api_key: Option<String>,
  /// Deployment artifact whose presence marks the chain active.
  /// Absent → the chain is considered always ready.
  pub artifact_path: Option<String>,
  /// Prefix for generated addresses (e.g. "0x").
  #[serde(default)]
  pub address_prefix: String,
  /// Base-unit decimals of the chain's native unit.
  pub decimals: u32,
  /// Minimum spacing between provider call starts (per-key rate limit).
  #[serde(default = "default_min_call_spacing")]
  pub min_call_spacing_ms: u64,
  /// Delay between deposit poll cycles.
  #[serde(default = "default_poll_interval")]
  pub deposit_poll_interval_ms: u64,
  /// Transaction history page size.
  #[serde(default = "default_tx_page_limit")]
  pub tx_page_limit: usize,
  /// Capacity of the processed-deposit LRU cache.
  #[serde(default = "default_processed_cache")]
  pub processed_cache_size: usize,
  /// Withdrawal confirmation polling budget.
  #[serde(default = "default_confirm_attempts")]
  pub confirm_attempts: u32,
  /// Delay between confirmation polls.
  #[serde(default = "default_confirm_delay")]
  pub confirm_delay_ms: u64,
  /// Cap on the per-withdrawal inspected-hash set.
  #[serde(default = "default_confirm_seen_cap")]
  pub confirm_seen_cap: usize,
  /// Provider HTTP request timeout.
  #[serde(default = "default_request_timeout")]
  pub request_timeout_ms: u64,
  /// Maximum provider HTTP retries on transient errors.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Deposit targets to watch from boot (monitoring is not persisted).
  #[serde(default)]
  pub watch: Vec<WatchTarget>,
}

/// A (wallet, address) pair watched from service start.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchTarget {
  /// Wallet to credit.
  pub wallet_id: String,
  /// Custodial deposit address to poll.
  pub address: String,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_health_addr() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_true() -> bool {
  true
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_min_call_spacing() -> u64 {
  1_000
}

fn default_poll_interval() -> u64 {
  60_000
}

fn default_tx_page_limit() -> usize {
  20
}

fn default_processed_cache() -> usize {
  1_024
}

fn default_confirm_attempts() -> u32 {
  10
}

fn default_confirm_delay() -> u64 {
  10_000
}

fn default_confirm_seen_cap() -> usize {
  512
}

fn default_request_timeout() -> u64 {
  30_000
}

fn default_max_retries() -> u32 {
  3
}
