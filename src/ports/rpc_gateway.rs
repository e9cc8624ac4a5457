//! RPC Gateway Port - Blockchain Provider Interface
//!
//! Defines the trait for talking to a chain's custodial RPC/HTTP provider:
//! transaction history pages, balance queries, and transfer broadcast.
//! Every call made through this port MUST be funneled through the chain's
//! rate-limited call queue; providers suspend API keys that exceed their
//! per-key limits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One transaction record exactly as the provider returns it.
///
/// Every field is optional on purpose: provider payloads vary by chain and
/// by record kind, and a malformed record must never fail the page it came
/// in. The normalizer is the single place this shape is interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderTxRecord {
  /// Transaction hash.
  pub txid: Option<String>,
  /// Origin address.
  pub from: Option<String>,
  /// Destination address.
  pub to: Option<String>,
  /// Secondary destination field some providers use for token transfers.
  pub contract_address: Option<String>,
  /// Amount in base units, as a decimal string.
  pub value: Option<String>,
  /// Block timestamp in epoch milliseconds.
  pub timestamp_ms: Option<i64>,
  /// Whether the transaction executed successfully on-chain.
  pub confirmed: Option<bool>,
  /// Free-form memo/payload attached to the transfer.
  pub memo: Option<String>,
}

/// A transfer ready for broadcast.
#[derive(Debug, Clone)]
pub struct TransferRequest {
  /// Decrypted private signing material for the source wallet.
  pub signing_key: String,
  /// Destination address.
  pub to_address: String,
  /// Amount in base units.
  pub amount_base: u128,
  /// Idempotency payload embedded in the transfer's memo field.
  pub memo: String,
}

/// Provider acknowledgement of a broadcast attempt.
#[derive(Debug, Clone)]
pub struct BroadcastAck {
  /// Whether the provider accepted the transfer for inclusion.
  pub accepted: bool,
  /// Provider-side message, if any. Operator-facing logs only; never
  /// surfaced verbatim to ledger descriptions.
  pub provider_message: Option<String>,
}

/// Trait for blockchain provider interactions.
///
/// One implementation per provider API shape; one instance per chain.
#[async_trait]
pub trait RpcGateway: Send + Sync + 'static {
  /// Fetch the most recent transactions touching `address`, newest first.
  async fn recent_transactions(
    &self,
    address: &str,
    limit: usize,
  ) -> anyhow::Result<Vec<ProviderTxRecord>>;

  /// Get the confirmed balance of `address` in base units.
  async fn balance(&self, address: &str) -> anyhow::Result<u128>;

  /// Sign and broadcast a transfer.
  async fn broadcast_transfer(&self, transfer: &TransferRequest) -> anyhow::Result<BroadcastAck>;

  /// Check if the provider endpoint is reachable.
  async fn is_healthy(&self) -> bool;
}
