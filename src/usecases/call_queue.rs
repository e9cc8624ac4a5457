//! Rate-Limited Call Queue - Serialized Provider Access
//!
//! Funnels every RPC Gateway call for one chain through a single FIFO queue
//! with a minimum spacing between the *start* of consecutive operations.
//! Upstream providers enforce per-key rate limits; exceeding them risks
//! temporary or permanent key suspension, so deposit polling and withdrawal
//! broadcast/confirmation all share one queue instance per chain.
//!
//! A single drain task is started lazily on the first enqueue, parks itself
//! when the queue empties, and is restarted by the next enqueue. A failing
//! or panicking operation is logged and never blocks the operations behind
//! it.

use std::collections::VecDeque;
use std::future::Future;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A queued unit of work. Result delivery and error logging happen inside
/// the job itself, so the drain loop only ever sees `()`.
type Job = BoxFuture<'static, ()>;

struct QueueState {
  jobs: VecDeque<Job>,
  /// Whether a drain task is currently alive.
  draining: bool,
}

struct Inner {
  state: Mutex<QueueState>,
  limiter: DefaultDirectRateLimiter,
}

/// FIFO queue with enforced minimum spacing between operation starts.
///
/// Cheap to clone via `Arc`; safe to enqueue from any task.
#[derive(Clone)]
pub struct CallQueue {
  inner: Arc<Inner>,
}

impl CallQueue {
  /// Create a queue with the given minimum spacing between call starts.
  pub fn new(min_spacing: Duration) -> Self {
    let period = if min_spacing.is_zero() {
      Duration::from_nanos(1)
    } else {
      min_spacing
    };
    let quota =
      Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));

    debug!(min_spacing_ms = min_spacing.as_millis() as u64, "call queue created");

    Self {
      inner: Arc::new(Inner {
        state: Mutex::new(QueueState {
          jobs: VecDeque::new(),
          draining: false,
        }),
        limiter: RateLimiter::direct(quota),
      }),
    }
  }

  /// Number of operations waiting to start.
  pub fn depth(&self) -> usize {
    self.lock_state().jobs.len()
  }

  /// Enqueue a fire-and-forget operation.
  ///
  /// Start order is FIFO among enqueued operations. The drain task is
  /// spawned lazily if none is running.
  pub fn enqueue<F>(&self, job: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let spawn_drain = {
      let mut state = self.lock_state();
      state.jobs.push_back(Box::pin(job));
      if state.draining {
        false
      } else {
        state.draining = true;
        true
      }
    };

    if spawn_drain {
      Self::spawn_drain(Arc::clone(&self.inner));
    }
  }

  /// Enqueue an operation and await its result.
  ///
  /// Failures are logged with `label` and returned to the caller; they never
  /// affect operations queued behind this one.
  pub async fn submit<T, F>(&self, label: &'static str, op: F) -> Result<T>
  where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();

    self.enqueue(async move {
      let result = op.await;
      if let Err(e) = &result {
        warn!(op = label, error = %e, "queued provider call failed");
      }
      // Receiver may have gone away; the operation still ran in order.
      let _ = tx.send(result);
    });

    rx.await
      .with_context(|| format!("call queue dropped operation '{label}'"))?
  }

  fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn spawn_drain(inner: Arc<Inner>) {
    tokio::spawn(async move {
      debug!("call queue drain task started");
      loop {
        let job = {
          let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
          match state.jobs.pop_front() {
            Some(job) => job,
            None => {
              state.draining = false;
              break;
            }
          }
        };

        // Spacing is between starts: wait for a permit, then run. A
        // panicking job must not kill the drain task and strand the queue.
        inner.limiter.until_ready().await;
        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
          warn!("queued operation panicked; continuing with next");
        }
      }
      debug!("call queue empty; drain task parked");
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Instant;

  #[tokio::test]
  async fn test_fifo_order_and_minimum_spacing() {
    let queue = CallQueue::new(Duration::from_millis(50));
    let starts: Arc<Mutex<Vec<(usize, Instant)>>> = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..3 {
      let starts = Arc::clone(&starts);
      let queue = queue.clone();
      handles.push(tokio::spawn(async move {
        queue
          .submit("test_op", async move {
            starts.lock().unwrap().push((i, Instant::now()));
            Ok::<_, anyhow::Error>(i)
          })
          .await
      }));
      // Give each submit a moment to land in FIFO position
      tokio::time::sleep(Duration::from_millis(2)).await;
    }

    for handle in handles {
      handle.await.unwrap().unwrap();
    }

    let starts = starts.lock().unwrap();
    let order: Vec<usize> = starts.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, vec![0, 1, 2]);

    for pair in starts.windows(2) {
      let gap = pair[1].1.duration_since(pair[0].1);
      // Small tolerance for timer granularity
      assert!(
        gap >= Duration::from_millis(45),
        "spacing violated: {gap:?}"
      );
    }
  }

  #[tokio::test]
  async fn test_failure_does_not_block_next_operation() {
    let queue = CallQueue::new(Duration::from_millis(1));

    let failed: Result<u32> = queue
      .submit("failing_op", async { anyhow::bail!("provider exploded") })
      .await;
    assert!(failed.is_err());

    let ok = queue
      .submit("ok_op", async { Ok::<_, anyhow::Error>(42u32) })
      .await
      .unwrap();
    assert_eq!(ok, 42);
  }

  #[tokio::test]
  async fn test_panicking_operation_does_not_wedge_the_queue() {
    let queue = CallQueue::new(Duration::from_millis(1));

    queue.enqueue(async { panic!("job blew up") });

    let next = queue
      .submit("after_panic", async { Ok::<_, anyhow::Error>(7u32) })
      .await
      .unwrap();
    assert_eq!(next, 7);
  }

  #[tokio::test]
  async fn test_drain_restarts_after_queue_empties() {
    let queue = CallQueue::new(Duration::from_millis(1));

    let first = queue
      .submit("first", async { Ok::<_, anyhow::Error>(1u32) })
      .await
      .unwrap();
    assert_eq!(first, 1);

    // Let the drain task park itself
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(queue.depth(), 0);

    let second = queue
      .submit("second", async { Ok::<_, anyhow::Error>(2u32) })
      .await
      .unwrap();
    assert_eq!(second, 2);
  }
}
