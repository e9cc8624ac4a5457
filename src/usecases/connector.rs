//! Chain Connector Façade - Per-Chain Service Surface
//!
//! One long-lived, dependency-injected instance per supported chain. Owns
//! the chain's rate-limited call queue, deposit monitor, and withdrawal
//! executor. Every public operation is gated by the activation flag so a
//! partially configured chain never silently accepts monitoring or
//! withdrawal requests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::ChainConfig;
use crate::domain::from_base_units;
use crate::ports::ledger::LedgerStore;
use crate::ports::rpc_gateway::RpcGateway;
use crate::usecases::call_queue::CallQueue;
use crate::usecases::deposit_monitor::DepositMonitor;
use crate::usecases::withdrawal_executor::{
  WithdrawalExecutor, WithdrawalOutcome, WithdrawalRequest,
};

/// Typed failures surfaced directly to callers (no retry, no ledger write
/// beyond what the operation already recorded).
#[derive(Debug, Error)]
pub enum ConnectorError {
  #[error("chain {0} is not active")]
  ChainInactive(String),

  #[error("wallet {wallet_id} has no signing material for chain {chain}")]
  MissingSigningMaterial { wallet_id: String, chain: String },

  #[error("wallet {wallet_id} has no {chain} address on record")]
  MissingWalletAddress { wallet_id: String, chain: String },

  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}

/// Key material for a freshly generated custodial wallet.
///
/// Nothing is persisted here: the caller owns encryption-at-rest and
/// storage of the private material.
#[derive(Debug, Clone)]
pub struct GeneratedWallet {
  /// Public deposit address.
  pub address: String,
  /// Base64-encoded private signing material.
  pub private_material: String,
}

/// Per-chain façade combining queue, deposit monitor, and withdrawals.
pub struct ChainConnector<G: RpcGateway, L: LedgerStore> {
  chain: String,
  /// Computed once at construction from the deployment readiness signal.
  active: bool,
  address_prefix: String,
  decimals: u32,
  queue: CallQueue,
  gateway: Arc<G>,
  deposits: Arc<DepositMonitor<G, L>>,
  withdrawals: WithdrawalExecutor<G, L>,
}

impl<G: RpcGateway, L: LedgerStore> ChainConnector<G, L> {
  /// Wire up a connector for one chain.
  ///
  /// The activation flag is probed here, once: a chain configured with an
  /// `artifact_path` is active only while that artifact exists on disk.
  pub fn new(
    config: &ChainConfig,
    gateway: Arc<G>,
    ledger: Arc<L>,
    metrics: Arc<MetricsRegistry>,
  ) -> Self {
    let active = chain_is_ready(config);
    if active {
      info!(chain = %config.name, "Chain connector active");
    } else {
      warn!(
        chain = %config.name,
        artifact = config.artifact_path.as_deref().unwrap_or(""),
        "Chain connector constructed INACTIVE; all operations will be rejected"
      );
    }

    let queue = CallQueue::new(Duration::from_millis(config.min_call_spacing_ms));

    let deposits = Arc::new(DepositMonitor::new(
      config,
      Arc::clone(&gateway),
      Arc::clone(&ledger),
      queue.clone(),
      Arc::clone(&metrics),
    ));

    let withdrawals = WithdrawalExecutor::new(
      config,
      Arc::clone(&gateway),
      Arc::clone(&ledger),
      queue.clone(),
      Arc::clone(&metrics),
    );

    Self {
      chain: config.name.clone(),
      active,
      address_prefix: config.address_prefix.clone(),
      decimals: config.decimals,
      queue,
      gateway,
      deposits,
      withdrawals,
    }
  }

  /// Chain identifier this connector serves.
  pub fn chain(&self) -> &str {
    &self.chain
  }

  /// Whether the activation probe passed at construction.
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Begin deposit surveillance for a wallet's address. Idempotent.
  pub async fn monitor(&self, wallet_id: &str, address: &str) -> Result<(), ConnectorError> {
    self.ensure_active()?;
    self.deposits.start(wallet_id, address).await;
    Ok(())
  }

  /// Stop deposit surveillance for a wallet's address.
  pub async fn stop_monitoring(
    &self,
    wallet_id: &str,
    address: &str,
  ) -> Result<bool, ConnectorError> {
    self.ensure_active()?;
    Ok(self.deposits.stop(wallet_id, address).await)
  }

  /// Execute a withdrawal end to end.
  ///
  /// Callers must not submit the same withdrawal id concurrently or after
  /// it reached a terminal status; the ledger status is the guard.
  pub async fn withdraw(
    &self,
    request: &WithdrawalRequest,
  ) -> Result<WithdrawalOutcome, ConnectorError> {
    self.ensure_active()?;
    self.withdrawals.execute(request).await
  }

  /// Query the on-chain balance of an address, in decimal main units.
  pub async fn get_balance(&self, address: &str) -> Result<Decimal, ConnectorError> {
    self.ensure_active()?;
    let gateway = Arc::clone(&self.gateway);
    let address = address.to_string();
    let raw = self
      .queue
      .submit("balance", async move { gateway.balance(&address).await })
      .await?;
    Ok(from_base_units(raw, self.decimals))
  }

  /// Generate fresh wallet key material.
  ///
  /// Returns the public address and the private material; persisting and
  /// encrypting the material is the caller's responsibility.
  pub fn create_wallet(&self) -> Result<GeneratedWallet, ConnectorError> {
    self.ensure_active()?;

    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);

    let digest = hmac_sha256::Hash::hash(&key);
    let mut address = self.address_prefix.clone();
    for byte in &digest[..20] {
      address.push_str(&format!("{byte:02x}"));
    }

    Ok(GeneratedWallet {
      address,
      private_material: BASE64.encode(key),
    })
  }

  /// Stop all monitoring loops (graceful shutdown).
  pub async fn shutdown(&self) {
    self.deposits.stop_all().await;
    info!(chain = %self.chain, "Chain connector shut down");
  }

  fn ensure_active(&self) -> Result<(), ConnectorError> {
    if self.active {
      Ok(())
    } else {
      Err(ConnectorError::ChainInactive(self.chain.clone()))
    }
  }
}

/// Readiness signal: the chain is deployable when its artifact exists.
/// Chains without a configured artifact are considered always ready.
fn chain_is_ready(config: &ChainConfig) -> bool {
  match config.artifact_path.as_deref() {
    Some(path) => Path::new(path).exists(),
    None => true,
  }
}
