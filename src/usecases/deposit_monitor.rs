//! Deposit Monitor - Custodial Address Surveillance
//!
//! One polling loop per (wallet, address) target. Each cycle pages the
//! provider's recent transactions through the rate-limited call queue,
//! normalizes them, and forwards new successful deposits to the ledger.
//!
//! Idempotence is layered: an in-memory LRU cache of processed hashes is the
//! fast path, and the ledger's lookup-by-reference-id is the durable guard
//! that holds across process restarts and cache eviction. Polling (rather
//! than event subscription) tolerates lossy, occasionally-unavailable RPC
//! providers; a failed cycle is logged and treated as "no deposits".

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use lru::LruCache;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::ChainConfig;
use crate::domain::UNKNOWN;
use crate::ports::ledger::{DepositRecord, LedgerStore};
use crate::ports::rpc_gateway::RpcGateway;
use crate::usecases::call_queue::CallQueue;
use crate::usecases::normalizer::normalize;

/// A (walletId, address) pair under surveillance.
type TargetKey = (String, String);

/// Per-chain deposit surveillance with idempotent crediting.
pub struct DepositMonitor<G: RpcGateway, L: LedgerStore> {
  gateway: Arc<G>,
  ledger: Arc<L>,
  queue: CallQueue,
  metrics: Arc<MetricsRegistry>,
  chain: String,
  decimals: u32,
  poll_interval: Duration,
  tx_page_limit: usize,
  /// Invariant: membership here means an active polling loop exists.
  targets: Mutex<HashSet<TargetKey>>,
  /// Fast-path cache of hashes already forwarded to settlement.
  processed: Mutex<LruCache<String, ()>>,
  shutdown_tx: broadcast::Sender<()>,
}

impl<G: RpcGateway, L: LedgerStore> DepositMonitor<G, L> {
  /// Create a monitor for one chain.
  pub fn new(
    config: &ChainConfig,
    gateway: Arc<G>,
    ledger: Arc<L>,
    queue: CallQueue,
    metrics: Arc<MetricsRegistry>,
  ) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    let cache_size =
      NonZeroUsize::new(config.processed_cache_size).unwrap_or(NonZeroUsize::MIN);

    Self {
      gateway,
      ledger,
      queue,
      metrics,
      chain: config.name.clone(),
      decimals: config.decimals,
      poll_interval: Duration::from_millis(config.deposit_poll_interval_ms),
      tx_page_limit: config.tx_page_limit,
      targets: Mutex::new(HashSet::new()),
      processed: Mutex::new(LruCache::new(cache_size)),
      shutdown_tx,
    }
  }

  /// Begin monitoring a (wallet, address) target.
  ///
  /// Idempotent: a target already under surveillance is a no-op, preserving
  /// the one-loop-per-target invariant.
  pub async fn start(self: &Arc<Self>, wallet_id: &str, address: &str) {
    let key: TargetKey = (wallet_id.to_string(), address.to_string());

    {
      let mut targets = self.targets.lock().await;
      if !targets.insert(key.clone()) {
        debug!(
          chain = %self.chain,
          wallet_id,
          address,
          "Target already monitored; ignoring duplicate start"
        );
        return;
      }
    }

    let monitor = Arc::clone(self);
    tokio::spawn(async move {
      monitor.run_loop(key).await;
    });
  }

  /// Stop monitoring a target. An in-flight poll completes but will not
  /// reschedule. Returns whether the target was registered.
  pub async fn stop(&self, wallet_id: &str, address: &str) -> bool {
    let key: TargetKey = (wallet_id.to_string(), address.to_string());
    let removed = self.targets.lock().await.remove(&key);
    if removed {
      info!(chain = %self.chain, wallet_id, address, "Deposit monitoring cancelled");
    }
    removed
  }

  /// Stop every loop immediately (graceful shutdown).
  pub async fn stop_all(&self) {
    self.targets.lock().await.clear();
    let _ = self.shutdown_tx.send(());
  }

  /// Number of targets currently under surveillance.
  pub async fn target_count(&self) -> usize {
    self.targets.lock().await.len()
  }

  async fn run_loop(self: Arc<Self>, key: TargetKey) {
    let mut shutdown_rx = self.shutdown_tx.subscribe();
    info!(
      chain = %self.chain,
      wallet_id = %key.0,
      address = %key.1,
      "Deposit monitoring started"
    );

    loop {
      if !self.is_registered(&key).await {
        break;
      }

      match self.poll_once(&key.0, &key.1).await {
        Ok(credited) if credited > 0 => {
          debug!(chain = %self.chain, credited, "Deposit poll cycle credited deposits");
        }
        Ok(_) => {}
        Err(e) => {
          // Never fatal: the next scheduled cycle will retry.
          self
            .metrics
            .deposit_poll_errors
            .with_label_values(&[&self.chain])
            .inc();
          warn!(
            chain = %self.chain,
            address = %key.1,
            error = %e,
            "Deposit poll cycle failed; treating as no deposits"
          );
        }
      }

      tokio::select! {
        _ = tokio::time::sleep(self.poll_interval) => {}
        _ = shutdown_rx.recv() => break,
      }
    }

    info!(
      chain = %self.chain,
      wallet_id = %key.0,
      address = %key.1,
      "Deposit monitoring stopped"
    );
  }

  /// Run one poll cycle for a target. Returns the number of deposits
  /// credited this cycle.
  pub async fn poll_once(&self, wallet_id: &str, address: &str) -> Result<usize> {
    let gateway = Arc::clone(&self.gateway);
    let poll_address = address.to_string();
    let limit = self.tx_page_limit;

    let records = self
      .queue
      .submit("recent_transactions", async move {
        gateway.recent_transactions(&poll_address, limit).await
      })
      .await?;

    self
      .metrics
      .queue_depth
      .with_label_values(&[&self.chain])
      .set(self.queue.depth() as i64);

    // The recorded address is the authority on where funds may land.
    let expected = self
      .ledger
      .wallet_address(wallet_id, &self.chain)
      .await?
      .ok_or_else(|| {
        anyhow!("wallet {wallet_id} has no {} deposit address on record", self.chain)
      })?;

    let mut credited = 0;
    for record in &records {
      let tx = normalize(record, self.decimals);

      if !tx.succeeded || tx.hash == UNKNOWN {
        continue;
      }

      if self.already_processed(&tx.hash).await {
        continue;
      }

      // Durable guard: covers restarts and cache eviction.
      if self
        .ledger
        .find_transaction_by_reference_id(&self.chain, &tx.hash)
        .await?
        .is_some()
      {
        self.mark_processed(&tx.hash).await;
        self
          .metrics
          .deposits_skipped
          .with_label_values(&[&self.chain, "duplicate"])
          .inc();
        continue;
      }

      if !tx.to.eq_ignore_ascii_case(&expected) {
        self
          .metrics
          .deposits_skipped
          .with_label_values(&[&self.chain, "destination_mismatch"])
          .inc();
        warn!(
          chain = %self.chain,
          hash = %tx.hash,
          observed = %tx.to,
          expected = %expected,
          "Deposit destination mismatch; not crediting"
        );
        continue;
      }

      self
        .ledger
        .create_deposit_transaction(&DepositRecord {
          wallet_id: wallet_id.to_string(),
          chain: self.chain.clone(),
          reference_id: tx.hash.clone(),
          from_address: tx.from.clone(),
          to_address: tx.to.clone(),
          amount: tx.amount,
        })
        .await?;

      self.mark_processed(&tx.hash).await;
      self
        .metrics
        .deposits_credited
        .with_label_values(&[&self.chain])
        .inc();
      info!(
        chain = %self.chain,
        wallet_id,
        hash = %tx.hash,
        amount = %tx.amount,
        "Deposit credited"
      );
      credited += 1;
    }

    Ok(credited)
  }

  async fn is_registered(&self, key: &TargetKey) -> bool {
    self.targets.lock().await.contains(key)
  }

  async fn already_processed(&self, hash: &str) -> bool {
    self.processed.lock().await.get(hash).is_some()
  }

  async fn mark_processed(&self, hash: &str) {
    self.processed.lock().await.put(hash.to_string(), ());
  }
}
