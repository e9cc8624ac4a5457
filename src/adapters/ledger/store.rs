//! JSONL Ledger Store - File-backed Settlement Ledger
//!
//! A self-contained implementation of the `LedgerStore` port backed by an
//! append-only JSONL event log plus a wallet registry file. Every state
//! change appends one full transaction record; startup replays the log
//! (last write per id wins), which is what makes reference-id lookups a
//! durable idempotence guard across restarts.
//!
//! Production deployments replace this adapter with the platform's real
//! ledger; the port is the seam.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Address, TransactionKind, TransactionStatus};
use crate::ports::ledger::{DepositRecord, LedgerStore, LedgerTransaction, SigningMaterial};

/// One wallet's chain-specific entry in the registry file.
///
/// The registry stores material as the deployment's key-management layer
/// hands it over; this adapter passes it through as-is.
#[derive(Debug, Clone, Deserialize)]
struct WalletEntry {
    wallet_id: String,
    chain: String,
    address: String,
    signing_material: Option<String>,
}

#[derive(Default)]
struct LedgerState {
    /// Latest version of every transaction, by internal id.
    transactions: HashMap<String, LedgerTransaction>,
    /// (chain, reference_id) → internal id.
    by_reference: HashMap<(String, String), String>,
}

impl LedgerState {
    fn absorb(&mut self, tx: LedgerTransaction) {
        if let Some(reference) = &tx.reference_id {
            self.by_reference
                .insert((tx.chain.clone(), reference.clone()), tx.id.clone());
        }
        self.transactions.insert(tx.id.clone(), tx);
    }
}

/// Append-only JSONL ledger with an in-memory index.
pub struct JsonlLedger {
    log_path: PathBuf,
    state: RwLock<LedgerState>,
    /// (wallet_id, chain) → registry entry. Loaded once at startup.
    wallets: HashMap<(String, String), WalletEntry>,
}

impl JsonlLedger {
    /// Open (or initialize) a ledger in the given data directory.
    ///
    /// Replays `ledger.jsonl` and loads `wallets.json` if present.
    pub async fn open(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create ledger data directory")?;

        let log_path = dir.join("ledger.jsonl");
        let mut state = LedgerState::default();

        if fs::try_exists(&log_path).await.unwrap_or(false) {
            let content = fs::read_to_string(&log_path)
                .await
                .context("Failed to read ledger log")?;
            let mut replayed = 0usize;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LedgerTransaction>(line) {
                    Ok(tx) => {
                        state.absorb(tx);
                        replayed += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed ledger record");
                    }
                }
            }
            info!(
                replayed,
                transactions = state.transactions.len(),
                "Ledger log replayed"
            );
        }

        let wallets_path = dir.join("wallets.json");
        let mut wallets = HashMap::new();
        if fs::try_exists(&wallets_path).await.unwrap_or(false) {
            let content = fs::read_to_string(&wallets_path)
                .await
                .context("Failed to read wallet registry")?;
            let entries: Vec<WalletEntry> =
                serde_json::from_str(&content).context("Failed to parse wallets.json")?;
            for entry in entries {
                wallets.insert((entry.wallet_id.clone(), entry.chain.clone()), entry);
            }
            info!(wallets = wallets.len(), "Wallet registry loaded");
        }

        Ok(Self {
            log_path,
            state: RwLock::new(state),
            wallets,
        })
    }

    async fn append(&self, tx: &LedgerTransaction) -> Result<()> {
        let mut json = serde_json::to_string(tx).context("Failed to serialize transaction")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await
            .context("Failed to open ledger log")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write ledger record")?;
        file.flush().await.context("Failed to flush ledger log")?;

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for JsonlLedger {
    async fn find_transaction_by_reference_id(
        &self,
        chain: &str,
        reference_id: &str,
    ) -> Result<Option<LedgerTransaction>> {
        let state = self.state.read().await;
        let key = (chain.to_string(), reference_id.to_string());
        Ok(state
            .by_reference
            .get(&key)
            .and_then(|id| state.transactions.get(id))
            .cloned())
    }

    async fn create_deposit_transaction(
        &self,
        deposit: &DepositRecord,
    ) -> Result<LedgerTransaction> {
        let mut state = self.state.write().await;

        // The reference id is unique per on-chain transaction; a second
        // create for the same hash is a caller bug, never a double credit.
        let key = (deposit.chain.clone(), deposit.reference_id.clone());
        if state.by_reference.contains_key(&key) {
            bail!(
                "deposit with reference id {} already recorded on {}",
                deposit.reference_id,
                deposit.chain
            );
        }

        let tx = LedgerTransaction {
            id: Uuid::new_v4().to_string(),
            wallet_id: deposit.wallet_id.clone(),
            chain: deposit.chain.clone(),
            kind: TransactionKind::Deposit,
            status: TransactionStatus::Completed,
            reference_id: Some(deposit.reference_id.clone()),
            from_address: Some(deposit.from_address.clone()),
            to_address: Some(deposit.to_address.clone()),
            amount: deposit.amount,
            description: None,
            created_at: Utc::now(),
        };

        self.append(&tx).await?;
        state.absorb(tx.clone());
        Ok(tx)
    }

    async fn update_transaction_status(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        reference_id: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        let Some(existing) = state.transactions.get(transaction_id) else {
            bail!("unknown ledger transaction {transaction_id}");
        };

        let mut updated = existing.clone();
        updated.status = status;
        if let Some(reference) = reference_id {
            updated.reference_id = Some(reference);
        }
        if let Some(text) = description {
            updated.description = Some(text);
        }

        self.append(&updated).await?;
        state.absorb(updated);
        Ok(())
    }

    async fn wallet_signing_material(
        &self,
        wallet_id: &str,
        chain: &str,
    ) -> Result<Option<SigningMaterial>> {
        let key = (wallet_id.to_string(), chain.to_string());
        Ok(self
            .wallets
            .get(&key)
            .and_then(|entry| entry.signing_material.clone())
            .map(|key| SigningMaterial { key }))
    }

    async fn wallet_address(&self, wallet_id: &str, chain: &str) -> Result<Option<Address>> {
        let key = (wallet_id.to_string(), chain.to_string());
        Ok(self.wallets.get(&key).map(|entry| entry.address.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_deposit() -> DepositRecord {
        DepositRecord {
            wallet_id: "w1".into(),
            chain: "bsc".into(),
            reference_id: "hash-abc".into(),
            from_address: "sender".into(),
            to_address: "dest".into(),
            amount: dec!(2.5),
        }
    }

    #[tokio::test]
    async fn test_create_then_find_by_reference_id() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonlLedger::open(dir.path().to_str().unwrap()).await.unwrap();

        let created = ledger.create_deposit_transaction(&sample_deposit()).await.unwrap();
        assert_eq!(created.status, TransactionStatus::Completed);

        let found = ledger
            .find_transaction_by_reference_id("bsc", "hash-abc")
            .await
            .unwrap()
            .expect("deposit indexed by reference id");
        assert_eq!(found.id, created.id);
        assert_eq!(found.amount, dec!(2.5));

        // Unknown chain must not match
        let missing = ledger
            .find_transaction_by_reference_id("tron", "hash-abc")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_reference_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonlLedger::open(dir.path().to_str().unwrap()).await.unwrap();

        ledger.create_deposit_transaction(&sample_deposit()).await.unwrap();
        let second = ledger.create_deposit_transaction(&sample_deposit()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_status_update_and_restart_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();

        let id = {
            let ledger = JsonlLedger::open(&path).await.unwrap();
            let tx = ledger.create_deposit_transaction(&sample_deposit()).await.unwrap();
            ledger
                .update_transaction_status(
                    &tx.id,
                    TransactionStatus::Failed,
                    None,
                    Some("manual reversal".to_string()),
                )
                .await
                .unwrap();
            tx.id
        };

        // Reopen: replay must reproduce the latest state
        let reopened = JsonlLedger::open(&path).await.unwrap();
        let found = reopened
            .find_transaction_by_reference_id("bsc", "hash-abc")
            .await
            .unwrap()
            .expect("survives restart");
        assert_eq!(found.id, id);
        assert_eq!(found.status, TransactionStatus::Failed);
        assert_eq!(found.description.as_deref(), Some("manual reversal"));
    }

    #[tokio::test]
    async fn test_wallet_registry_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let registry = serde_json::json!([
            {
                "wallet_id": "w1",
                "chain": "bsc",
                "address": "0xdeadbeef",
                "signing_material": "c2VjcmV0"
            }
        ]);
        std::fs::write(
            dir.path().join("wallets.json"),
            serde_json::to_string(&registry).unwrap(),
        )
        .unwrap();

        let ledger = JsonlLedger::open(dir.path().to_str().unwrap()).await.unwrap();

        let address = ledger.wallet_address("w1", "bsc").await.unwrap();
        assert_eq!(address.as_deref(), Some("0xdeadbeef"));

        let material = ledger.wallet_signing_material("w1", "bsc").await.unwrap();
        assert_eq!(material.map(|m| m.key).as_deref(), Some("c2VjcmV0"));

        assert!(ledger.wallet_address("w1", "tron").await.unwrap().is_none());
        assert!(
            ledger
                .wallet_signing_material("w2", "bsc")
                .await
                .unwrap()
                .is_none()
        );
    }
}
