//! Strict-priority admission queue.
//!
//! Serializes the *start* of independent asynchronous work items across three
//! fixed tiers: all high, then all medium, then all low, FIFO within a tier.
//! At most one drain loop runs per queue, and an in-flight item is never
//! preempted by a higher-priority arrival — priority only decides which
//! queued entry starts next.
//!
//! Accepted tradeoff: sustained high-priority traffic can starve lower tiers
//! indefinitely; there is no aging or fairness mechanism.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error_handling::ThrottleError;
use crate::utils::lock_unpoisoned;

/// Admission priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Drained before everything else.
    High,
    /// Drained when no high-priority entries are queued.
    Medium,
    /// Drained only when both other tiers are empty.
    Low,
}

impl Priority {
    fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Lowercase label for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

type Work<T> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send>;

struct QueueEntry<T> {
    work: Work<T>,
    tx: oneshot::Sender<anyhow::Result<T>>,
    priority: Priority,
    enqueued_at: Instant,
}

struct QueueState<T> {
    tiers: [VecDeque<QueueEntry<T>>; 3],
    draining: bool,
}

impl<T> QueueState<T> {
    /// Front entry of the highest-priority non-empty tier.
    fn pop_next(&mut self) -> Option<QueueEntry<T>> {
        self.tiers.iter_mut().find_map(VecDeque::pop_front)
    }
}

/// Queue depth and drain-state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Entries waiting in the high tier.
    pub high: usize,
    /// Entries waiting in the medium tier.
    pub medium: usize,
    /// Entries waiting in the low tier.
    pub low: usize,
    /// Total waiting entries across all tiers.
    pub total: usize,
    /// Whether a drain loop is currently active.
    pub draining: bool,
}

/// Three-tier strict-priority queue for async work items.
///
/// Submissions return a future that resolves or rejects exactly when the work
/// completes. A failing item rejects only its own future; the drain loop
/// continues with the next entry.
///
/// Dropping the queue handle does not cancel anything: the drain task owns
/// its own reference to the shared state and runs every already-submitted
/// entry to completion.
pub struct PriorityRequestQueue<T> {
    inner: Arc<Mutex<QueueState<T>>>,
}

impl<T: Send + 'static> PriorityRequestQueue<T> {
    /// Creates an empty, idle queue.
    pub fn new() -> Self {
        PriorityRequestQueue {
            inner: Arc::new(Mutex::new(QueueState {
                tiers: Default::default(),
                draining: false,
            })),
        }
    }

    /// Enqueues `work` at `priority` and returns a future for its outcome.
    ///
    /// The work closure is not invoked until the drain loop reaches the
    /// entry. The first submission into an idle queue starts the drain loop;
    /// a guard flag ensures a second one is never started concurrently.
    pub fn submit<F, Fut>(
        &self,
        priority: Priority,
        work: F,
    ) -> impl Future<Output = Result<T, ThrottleError>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let entry = QueueEntry {
            work: Box::new(move || work().boxed()),
            tx,
            priority,
            enqueued_at: Instant::now(),
        };

        let start_drain = {
            let mut state = lock_unpoisoned(&self.inner);
            state.tiers[priority.index()].push_back(entry);
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };
        if start_drain {
            self.spawn_drain();
        }

        async move {
            match rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(ThrottleError::QueueWork(error)),
                Err(_) => Err(ThrottleError::QueueClosed),
            }
        }
    }

    /// Current tier depths and drain state.
    pub fn stats(&self) -> QueueStats {
        let state = lock_unpoisoned(&self.inner);
        let high = state.tiers[0].len();
        let medium = state.tiers[1].len();
        let low = state.tiers[2].len();
        QueueStats {
            high,
            medium,
            low,
            total: high + medium + low,
            draining: state.draining,
        }
    }

    fn spawn_drain(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let entry = {
                    let mut state = lock_unpoisoned(&inner);
                    match state.pop_next() {
                        Some(entry) => entry,
                        None => {
                            // Flag cleared under the same lock that saw the
                            // queue empty, so a racing submit either lands
                            // before this pop or starts a fresh drain
                            state.draining = false;
                            break;
                        }
                    }
                };

                let queued_for = entry.enqueued_at.elapsed();
                let result = (entry.work)().await;
                if let Err(ref error) = result {
                    log::debug!(
                        "{}-priority work item failed after {:?} queued: {error}; continuing drain",
                        entry.priority.as_str(),
                        queued_for
                    );
                }
                // Receiver may have been dropped; the outcome is then discarded
                let _ = entry.tx.send(result);
            }
        });
    }
}

impl<T: Send + 'static> Default for PriorityRequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_submit_resolves_with_work_result() {
        let queue = PriorityRequestQueue::new();
        let result = queue
            .submit(Priority::Medium, || async { Ok(41 + 1) })
            .await
            .expect("work should succeed");
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_entry() {
        let queue = PriorityRequestQueue::new();

        let failing = queue.submit(Priority::High, || async {
            Err::<u32, _>(anyhow!("backend exploded"))
        });
        let healthy = queue.submit(Priority::High, || async { Ok(7) });

        match failing.await {
            Err(ThrottleError::QueueWork(error)) => {
                assert!(error.to_string().contains("backend exploded"));
            }
            other => panic!("expected QueueWork error, got {other:?}"),
        }
        assert_eq!(healthy.await.expect("sibling unaffected"), 7);
    }

    #[tokio::test]
    async fn test_stats_report_depth_and_drain_state() {
        let queue: PriorityRequestQueue<u32> = PriorityRequestQueue::new();
        let idle = queue.stats();
        assert_eq!(idle.total, 0);
        assert!(!idle.draining);

        let pending = queue.submit(Priority::Low, || async { Ok(1) });
        pending.await.expect("work should succeed");

        // Drain loop needs a beat to observe the empty queue and go idle
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let drained = queue.stats();
        assert_eq!(drained.total, 0);
        assert!(!drained.draining);
    }

    #[tokio::test]
    async fn test_dropping_queue_handle_lets_queued_work_finish() {
        let queue = PriorityRequestQueue::new();
        let pending = queue.submit(Priority::Low, || async { Ok(5) });
        drop(queue);
        // The drain task owns the state, so the entry still runs
        assert_eq!(pending.await.expect("work survives the handle drop"), 5);
    }
}
