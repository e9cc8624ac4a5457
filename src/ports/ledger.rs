//! Ledger Settlement Port - Internal Balance Ledger Interface
//!
//! Defines the trait through which the connector requests mutations of the
//! platform's durable ledger. The connector never touches balances directly:
//! crediting a deposit or settling a withdrawal always goes through this
//! seam, and the ledger's lookup-by-reference-id is the source of truth for
//! deposit idempotence across process restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Address, TransactionKind, TransactionStatus, WalletId};

/// A durable ledger transaction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
  /// Internal transaction identifier.
  pub id: String,
  /// Owning wallet.
  pub wallet_id: WalletId,
  /// Chain this transaction settles on.
  pub chain: String,
  /// Deposit or withdrawal.
  pub kind: TransactionKind,
  /// Current lifecycle status.
  pub status: TransactionStatus,
  /// On-chain reference (transaction hash), once known.
  pub reference_id: Option<String>,
  /// Origin address.
  pub from_address: Option<Address>,
  /// Destination address.
  pub to_address: Option<Address>,
  /// Amount in decimal main units.
  pub amount: Decimal,
  /// Human-readable outcome description (failure reasons, reconciliation
  /// notes). Never raw provider error text.
  pub description: Option<String>,
  /// Creation time.
  pub created_at: DateTime<Utc>,
}

/// Input for crediting one observed on-chain deposit.
#[derive(Debug, Clone)]
pub struct DepositRecord {
  /// Wallet to credit.
  pub wallet_id: WalletId,
  /// Chain the deposit arrived on.
  pub chain: String,
  /// On-chain transaction hash; doubles as the idempotency reference.
  pub reference_id: String,
  /// Origin address.
  pub from_address: Address,
  /// Destination (custodial) address.
  pub to_address: Address,
  /// Amount in decimal main units.
  pub amount: Decimal,
}

/// Decrypted private signing material for one (wallet, chain) pair.
///
/// Only ever held in memory for the duration of a withdrawal attempt.
#[derive(Clone)]
pub struct SigningMaterial {
  /// Decrypted private key material.
  pub key: String,
}

impl std::fmt::Debug for SigningMaterial {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    // Key material must never reach logs
    f.debug_struct("SigningMaterial").finish_non_exhaustive()
  }
}

/// Trait for the platform's durable ledger.
///
/// Implementations must make `create_deposit_transaction` atomic with the
/// balance credit, and `update_transaction_status` atomic with any balance
/// release, so the connector can treat each call as one settlement step.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
  /// Look up a transaction by its on-chain reference id (hash).
  ///
  /// This is the durable idempotence guard: a hit means the deposit was
  /// already credited in some process lifetime.
  async fn find_transaction_by_reference_id(
    &self,
    chain: &str,
    reference_id: &str,
  ) -> anyhow::Result<Option<LedgerTransaction>>;

  /// Create a completed deposit transaction and credit the wallet.
  async fn create_deposit_transaction(
    &self,
    deposit: &DepositRecord,
  ) -> anyhow::Result<LedgerTransaction>;

  /// Update a transaction's status, optionally attaching the on-chain
  /// reference id and a human-readable description.
  async fn update_transaction_status(
    &self,
    transaction_id: &str,
    status: TransactionStatus,
    reference_id: Option<String>,
    description: Option<String>,
  ) -> anyhow::Result<()>;

  /// Load and decrypt the wallet's private signing material for a chain.
  async fn wallet_signing_material(
    &self,
    wallet_id: &str,
    chain: &str,
  ) -> anyhow::Result<Option<SigningMaterial>>;

  /// Get the wallet's recorded deposit address for a chain.
  async fn wallet_address(&self, wallet_id: &str, chain: &str)
    -> anyhow::Result<Option<Address>>;
}
