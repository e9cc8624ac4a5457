//! Withdrawal Executor - Outbound Transfer Lifecycle
//!
//! Drives one withdrawal through SIGNING → BROADCAST → CONFIRMING and
//! settles the outcome on the ledger transaction. Confirmation matches the
//! broadcast transfer by the idempotency payload embedded in its memo —
//! never by amount or address alone, which would conflate it with concurrent
//! unrelated transfers.
//!
//! Confirmation retries are bounded on purpose: an unconfirmed transfer may
//! still land on-chain later, and that reconciliation gap is surfaced to
//! operators instead of being retried forever.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::ChainConfig;
use crate::domain::{TransactionStatus, from_base_units, to_base_units};
use crate::ports::ledger::LedgerStore;
use crate::ports::rpc_gateway::{RpcGateway, TransferRequest};
use crate::usecases::call_queue::CallQueue;
use crate::usecases::connector::ConnectorError;

/// One withdrawal to execute against the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
  /// Internal ledger transaction id for this withdrawal.
  pub transaction_id: String,
  /// Wallet the funds leave from.
  pub wallet_id: String,
  /// Amount in decimal main units.
  pub amount: Decimal,
  /// Destination address.
  pub to_address: String,
}

/// Terminal result of a withdrawal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalOutcome {
  /// Transfer observed on-chain; hash recorded as the ledger reference id.
  Confirmed { tx_hash: String },
  /// Recorded FAILED on the ledger with a human-readable reason.
  Failed { reason: String },
}

/// Executes withdrawals for one chain.
///
/// Callers must not re-invoke for an already-terminal withdrawal: the
/// ledger transaction's status is the authoritative guard, and this
/// executor assumes the transaction it is handed is still pending.
pub struct WithdrawalExecutor<G: RpcGateway, L: LedgerStore> {
  gateway: Arc<G>,
  ledger: Arc<L>,
  queue: CallQueue,
  metrics: Arc<MetricsRegistry>,
  chain: String,
  decimals: u32,
  confirm_attempts: u32,
  confirm_delay: Duration,
  tx_page_limit: usize,
  seen_cap: usize,
}

impl<G: RpcGateway, L: LedgerStore> WithdrawalExecutor<G, L> {
  /// Create an executor for one chain.
  pub fn new(
    config: &ChainConfig,
    gateway: Arc<G>,
    ledger: Arc<L>,
    queue: CallQueue,
    metrics: Arc<MetricsRegistry>,
  ) -> Self {
    Self {
      gateway,
      ledger,
      queue,
      metrics,
      chain: config.name.clone(),
      decimals: config.decimals,
      confirm_attempts: config.confirm_attempts,
      confirm_delay: Duration::from_millis(config.confirm_delay_ms),
      tx_page_limit: config.tx_page_limit,
      seen_cap: config.confirm_seen_cap,
    }
  }

  /// Execute a withdrawal end to end.
  ///
  /// Configuration failures (missing signing material or address) are
  /// recorded on the ledger transaction *and* returned as typed errors;
  /// business-rule failures and confirmation timeouts are returned as
  /// `WithdrawalOutcome::Failed`.
  pub async fn execute(
    &self,
    request: &WithdrawalRequest,
  ) -> Result<WithdrawalOutcome, ConnectorError> {
    info!(
      chain = %self.chain,
      transaction_id = %request.transaction_id,
      wallet_id = %request.wallet_id,
      amount = %request.amount,
      to = %request.to_address,
      "Withdrawal requested"
    );

    // SIGNING: load decrypted key material, fail fast if absent.
    let signing = match self
      .ledger
      .wallet_signing_material(&request.wallet_id, &self.chain)
      .await?
    {
      Some(material) => material,
      None => {
        self
          .record_failure(
            &request.transaction_id,
            "no signing material on file for this chain",
            "missing_signing_material",
          )
          .await?;
        return Err(ConnectorError::MissingSigningMaterial {
          wallet_id: request.wallet_id.clone(),
          chain: self.chain.clone(),
        });
      }
    };

    let source_address = match self
      .ledger
      .wallet_address(&request.wallet_id, &self.chain)
      .await?
    {
      Some(address) => address,
      None => {
        self
          .record_failure(
            &request.transaction_id,
            "no source address on file for this chain",
            "missing_address",
          )
          .await?;
        return Err(ConnectorError::MissingWalletAddress {
          wallet_id: request.wallet_id.clone(),
          chain: self.chain.clone(),
        });
      }
    };

    // Balance gate: never broadcast a transfer the chain would reject.
    let gateway = Arc::clone(&self.gateway);
    let balance_address = source_address.clone();
    let available_base = self
      .queue
      .submit("balance", async move { gateway.balance(&balance_address).await })
      .await?;
    let available = from_base_units(available_base, self.decimals);

    if request.amount >= available {
      let reason = format!(
        "insufficient balance: requested {} but only {} available",
        request.amount, available
      );
      return self
        .record_failure(&request.transaction_id, &reason, "insufficient_balance")
        .await;
    }

    let Some(amount_base) = to_base_units(request.amount, self.decimals) else {
      return self
        .record_failure(
          &request.transaction_id,
          "amount is not representable at the chain's precision",
          "bad_amount",
        )
        .await;
    };

    // BROADCAST with an idempotency payload unique to this attempt.
    let payload = format!(
      "wd-{}-{}",
      request.transaction_id,
      Utc::now().timestamp_millis()
    );

    let transfer = TransferRequest {
      signing_key: signing.key,
      to_address: request.to_address.clone(),
      amount_base,
      memo: payload.clone(),
    };

    let gateway = Arc::clone(&self.gateway);
    let ack = match self
      .queue
      .submit("broadcast_transfer", async move {
        gateway.broadcast_transfer(&transfer).await
      })
      .await
    {
      Ok(ack) => ack,
      Err(e) => {
        warn!(
          chain = %self.chain,
          transaction_id = %request.transaction_id,
          error = %e,
          "Transfer broadcast failed"
        );
        return self
          .record_failure(
            &request.transaction_id,
            "transfer broadcast failed; funds were not moved",
            "broadcast_error",
          )
          .await;
      }
    };

    if !ack.accepted {
      warn!(
        chain = %self.chain,
        transaction_id = %request.transaction_id,
        provider_message = ack.provider_message.as_deref().unwrap_or(""),
        "Provider rejected the transfer"
      );
      return self
        .record_failure(
          &request.transaction_id,
          "provider rejected the transfer",
          "broadcast_rejected",
        )
        .await;
    }

    info!(
      chain = %self.chain,
      transaction_id = %request.transaction_id,
      "Transfer broadcast; awaiting on-chain confirmation"
    );

    // CONFIRMING: bounded polling, matched by the embedded payload.
    self.confirm(request, &payload).await
  }

  async fn confirm(
    &self,
    request: &WithdrawalRequest,
    payload: &str,
  ) -> Result<WithdrawalOutcome, ConnectorError> {
    let mut seen: HashSet<String> = HashSet::new();

    for attempt in 1..=self.confirm_attempts {
      sleep(self.confirm_delay).await;

      // Bound memory over long confirmation windows; the payload match
      // makes re-inspection of a cleared hash harmless.
      if seen.len() > self.seen_cap {
        seen.clear();
      }

      let gateway = Arc::clone(&self.gateway);
      let address = request.to_address.clone();
      let limit = self.tx_page_limit;
      let records = match self
        .queue
        .submit("confirm_transactions", async move {
          gateway.recent_transactions(&address, limit).await
        })
        .await
      {
        Ok(records) => records,
        Err(e) => {
          warn!(
            chain = %self.chain,
            transaction_id = %request.transaction_id,
            attempt,
            error = %e,
            "Confirmation poll failed; will retry"
          );
          continue;
        }
      };

      for record in records {
        let Some(hash) = record.txid.clone() else { continue };
        if seen.contains(&hash) {
          continue;
        }

        if record.memo.as_deref() == Some(payload) {
          // Stays out of `seen` while pending so later attempts re-check it.
          if !record.confirmed.unwrap_or(false) {
            debug!(
              chain = %self.chain,
              transaction_id = %request.transaction_id,
              tx_hash = %hash,
              attempt,
              "Matching transfer visible but not yet confirmed"
            );
            continue;
          }

          self
            .ledger
            .update_transaction_status(
              &request.transaction_id,
              TransactionStatus::Completed,
              Some(hash.clone()),
              Some("withdrawal confirmed on-chain".to_string()),
            )
            .await?;
          self
            .metrics
            .withdrawals_confirmed
            .with_label_values(&[&self.chain])
            .inc();
          info!(
            chain = %self.chain,
            transaction_id = %request.transaction_id,
            tx_hash = %hash,
            attempt,
            "Withdrawal confirmed"
          );
          return Ok(WithdrawalOutcome::Confirmed { tx_hash: hash });
        }

        seen.insert(hash);
      }

      debug!(
        chain = %self.chain,
        transaction_id = %request.transaction_id,
        attempt,
        "No matching transfer yet"
      );
    }

    // The transfer may still land later; leave a trail operators can act on.
    let reason = format!(
      "could not confirm transfer after {} attempts; manual reconciliation required",
      self.confirm_attempts
    );
    self
      .record_failure(&request.transaction_id, &reason, "unconfirmed")
      .await
  }

  async fn record_failure(
    &self,
    transaction_id: &str,
    reason: &str,
    metric_reason: &str,
  ) -> Result<WithdrawalOutcome, ConnectorError> {
    self
      .ledger
      .update_transaction_status(
        transaction_id,
        TransactionStatus::Failed,
        None,
        Some(reason.to_string()),
      )
      .await?;
    self
      .metrics
      .withdrawals_failed
      .with_label_values(&[&self.chain, metric_reason])
      .inc();
    warn!(chain = %self.chain, transaction_id, reason, "Withdrawal failed");
    Ok(WithdrawalOutcome::Failed {
      reason: reason.to_string(),
    })
  }
}
