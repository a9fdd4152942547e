//! Debounced, coalescing write queue.
//!
//! # Invariants
//! - At most one pending update per task id; a later enqueue replaces the
//!   earlier one in place.
//! - At most one batch request is in flight.
//! - The queue is snapshotted and cleared when a flush starts, so updates
//!   enqueued while a request is out are kept for the next flush.
//! - Failed items are logged and dropped, never re-enqueued.
//! - After [`BatchQueue::cleanup_and_flush`] no timer is ever started again;
//!   only an explicit [`BatchQueue::flush_now`] sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::BoardTransport;
use crate::api::types::BatchUpdateResponse;
use crate::board::{PendingUpdate, TaskId};

/// What a flush attempt did.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Empty,
    /// Another batch is still out; queued updates wait for the next flush.
    AlreadyInFlight,
    /// The server accepted the batch (individual items may still have failed).
    Sent(BatchUpdateResponse),
    /// The request failed; the snapshot is gone.
    Failed(String),
}

#[derive(Clone)]
pub struct BatchQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    transport: Arc<dyn BoardTransport>,
    delay: Duration,
    pending: Mutex<Vec<PendingUpdate>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    in_flight: AtomicBool,
    closed: AtomicBool,
}

/// Releases the in-flight flag however the request ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BatchQueue {
    pub fn new(transport: Arc<dyn BoardTransport>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                transport,
                delay,
                pending: Mutex::new(Vec::new()),
                timer: Mutex::new(None),
                in_flight: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Queue the latest state of a task and restart the debounce timer.
    ///
    /// Outside a tokio runtime the update is queued but no timer starts; it
    /// goes out with the next explicit flush.
    pub fn enqueue(&self, update: PendingUpdate) {
        {
            let mut pending = lock(&self.inner.pending);
            match pending.iter_mut().find(|p| p.task_id == update.task_id) {
                Some(existing) => *existing = update,
                None => pending.push(update),
            }
        }
        self.schedule_flush();
    }

    /// (Re)start the debounce timer. The flush fires once `delay` passes with
    /// no further call.
    pub fn schedule_flush(&self) {
        if self.is_closed() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime; flush deferred until an explicit flush");
            return;
        };
        let queue = self.clone();
        let delay = self.inner.delay;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so that resetting the timer never cancels a request.
            tokio::spawn(async move {
                queue.flush_now().await;
            });
        });

        if let Some(previous) = lock(&self.inner.timer).replace(handle) {
            previous.abort();
        }
    }

    /// Send everything queued as one batch, unless a batch is already out.
    pub async fn flush_now(&self) -> FlushOutcome {
        if lock(&self.inner.pending).is_empty() {
            return FlushOutcome::Empty;
        }
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Batch already in flight, deferring flush");
            return FlushOutcome::AlreadyInFlight;
        }

        let outcome = {
            let _guard = InFlightGuard(&self.inner.in_flight);
            let batch = std::mem::take(&mut *lock(&self.inner.pending));
            if batch.is_empty() {
                return FlushOutcome::Empty;
            }

            let count = batch.len();
            tracing::debug!(count, "Flushing pending updates");
            match self.inner.transport.batch_update(batch).await {
                Ok(response) => {
                    tracing::info!(
                        "Batch update completed: {} succeeded, {} failed",
                        response.success_count,
                        response.failure_count
                    );
                    for failed in &response.failed {
                        tracing::warn!(task_id = %failed.task_id, "Update failed: {}", failed.error);
                    }
                    FlushOutcome::Sent(response)
                }
                Err(e) => {
                    tracing::error!("Error sending batch of {} updates: {}", count, e);
                    FlushOutcome::Failed(e.to_string())
                }
            }
        };

        self.reschedule_if_stranded();
        outcome
    }

    /// Updates enqueued while a batch was out may have had their timer fire
    /// into the in-flight check. Give them a fresh timer.
    fn reschedule_if_stranded(&self) {
        if self.is_closed() || lock(&self.inner.pending).is_empty() {
            return;
        }
        let timer_idle = lock(&self.inner.timer)
            .as_ref()
            .map_or(true, JoinHandle::is_finished);
        if timer_idle {
            self.schedule_flush();
        }
    }

    /// Teardown: cancel the timer and flush whatever is left, best effort.
    ///
    /// If a batch is already out, nothing more is sent and later timers are
    /// suppressed.
    pub async fn cleanup_and_flush(&self) -> FlushOutcome {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
        }
        let outcome = self.flush_now().await;
        if let FlushOutcome::Failed(e) = &outcome {
            tracing::warn!("Final flush failed: {}", e);
        }
        outcome
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    pub fn pending(&self, task_id: TaskId) -> Option<PendingUpdate> {
        lock(&self.inner.pending)
            .iter()
            .find(|p| p.task_id == task_id)
            .cloned()
    }

    /// Whether [`BatchQueue::cleanup_and_flush`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Whether a batch request is currently out.
    pub fn is_sending(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Column;
    use crate::client::testing::{task, MockTransport};

    const DELAY: Duration = Duration::from_secs(5);

    fn update_for(t: &crate::board::Task, column: Column, position: f64) -> PendingUpdate {
        PendingUpdate {
            column,
            position,
            ..t.to_pending_update()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn three_moves_coalesce_into_one_write() {
        let transport = Arc::new(MockTransport::default());
        let queue = BatchQueue::new(transport.clone(), DELAY);
        let t = task("a", Column::Todo, 0.0);

        queue.enqueue(update_for(&t, Column::Todo, 5.0));
        queue.enqueue(update_for(&t, Column::InProgress, 1.0));
        queue.enqueue(update_for(&t, Column::Done, 42.0));
        assert_eq!(queue.pending_len(), 1);

        tokio::time::sleep(DELAY + Duration::from_millis(10)).await;

        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].column, Column::Done);
        assert_eq!(batches[0][0].position, 42.0);
        assert_eq!(queue.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn each_enqueue_pushes_the_deadline_back() {
        let transport = Arc::new(MockTransport::default());
        let queue = BatchQueue::new(transport.clone(), DELAY);
        let a = task("a", Column::Todo, 0.0);
        let b = task("b", Column::Todo, 10.0);

        queue.enqueue(a.to_pending_update());
        tokio::time::sleep(Duration::from_secs(4)).await;
        queue.enqueue(b.to_pending_update());
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(transport.batches().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_while_in_flight_does_nothing() {
        let transport = Arc::new(MockTransport::with_latency(Duration::from_secs(1)));
        let queue = BatchQueue::new(transport.clone(), DELAY);
        let a = task("a", Column::Todo, 0.0);
        let b = task("b", Column::Todo, 10.0);
        queue.enqueue(a.to_pending_update());

        let sender = queue.clone();
        let first = tokio::spawn(async move { sender.flush_now().await });
        tokio::task::yield_now().await;
        assert!(queue.is_sending());

        // Enqueued mid-flight: kept, not sent by a concurrent flush.
        queue.enqueue(b.to_pending_update());
        assert!(matches!(queue.flush_now().await, FlushOutcome::AlreadyInFlight));
        assert_eq!(queue.pending_len(), 1);

        assert!(matches!(first.await.unwrap(), FlushOutcome::Sent(_)));
        assert!(!queue.is_sending());
        assert_eq!(transport.batches().len(), 1);
        assert!(queue.pending(b.id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_sends_queued_updates_exactly_once() {
        let transport = Arc::new(MockTransport::default());
        let queue = BatchQueue::new(transport.clone(), DELAY);
        queue.enqueue(task("a", Column::Todo, 0.0).to_pending_update());
        queue.enqueue(task("b", Column::Done, 0.0).to_pending_update());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(matches!(queue.cleanup_and_flush().await, FlushOutcome::Sent(_)));

        // The cancelled timer must not fire a second request.
        tokio::time::sleep(DELAY * 2).await;
        let batches = transport.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_during_in_flight_batch_sends_nothing_more() {
        let transport = Arc::new(MockTransport::with_latency(Duration::from_secs(1)));
        let queue = BatchQueue::new(transport.clone(), DELAY);
        let a = task("a", Column::Todo, 0.0);
        let b = task("b", Column::Todo, 10.0);
        queue.enqueue(a.to_pending_update());

        let sender = queue.clone();
        let first = tokio::spawn(async move { sender.flush_now().await });
        tokio::task::yield_now().await;
        queue.enqueue(b.to_pending_update());

        assert!(matches!(
            queue.cleanup_and_flush().await,
            FlushOutcome::AlreadyInFlight
        ));
        assert!(matches!(first.await.unwrap(), FlushOutcome::Sent(_)));

        tokio::time::sleep(DELAY * 4).await;
        assert_eq!(transport.batches().len(), 1);
        assert!(queue.is_closed());
        assert_eq!(queue.pending_len(), 1);

        // Later enqueues start no timer either.
        queue.enqueue(task("c", Column::Done, 0.0).to_pending_update());
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(transport.batches().len(), 1);
    }

    #[test]
    fn enqueue_outside_runtime_defers_the_flush() {
        let transport = Arc::new(MockTransport::default());
        let queue = BatchQueue::new(transport.clone(), DELAY);
        queue.enqueue(task("a", Column::Todo, 0.0).to_pending_update());
        assert_eq!(queue.pending_len(), 1);

        let outcome = tokio_test::block_on(queue.flush_now());
        assert!(matches!(outcome, FlushOutcome::Sent(_)));
        assert_eq!(transport.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_releases_the_flag_and_drops_items() {
        let transport = Arc::new(MockTransport::default());
        transport.fail_batches(true);
        let queue = BatchQueue::new(transport.clone(), DELAY);
        queue.enqueue(task("a", Column::Todo, 0.0).to_pending_update());

        assert!(matches!(queue.flush_now().await, FlushOutcome::Failed(_)));
        assert!(!queue.is_sending());
        assert_eq!(queue.pending_len(), 0);

        transport.fail_batches(false);
        queue.enqueue(task("b", Column::Todo, 0.0).to_pending_update());
        assert!(matches!(queue.flush_now().await, FlushOutcome::Sent(_)));
        assert_eq!(transport.batches().len(), 2);
    }

    #[tokio::test]
    async fn empty_flush_sends_nothing() {
        let transport = Arc::new(MockTransport::default());
        let queue = BatchQueue::new(transport.clone(), DELAY);
        assert!(matches!(queue.flush_now().await, FlushOutcome::Empty));
        assert!(transport.batches().is_empty());
    }
}
