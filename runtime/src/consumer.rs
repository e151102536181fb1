//! The score consumption loop.
//!
//! # Pattern: Connect-Consume-Reconnect
//!
//! ```text
//! loop {
//!     Connecting:  acquire queue handle (supervisor retries forever)
//!     Consuming:   loop {
//!                      receive one delivery        (in-flight limit 1)
//!                      decode → apply → ack/requeue/dead-letter
//!                  }
//!     Disconnected on queue connection loss, then back to Connecting
//! }
//! ```
//!
//! The loop ends only on the shutdown signal. A delivery being processed
//! when the signal arrives is abandoned without an ack, so the broker
//! delivers it again later.

use crate::coordinator::DualWriteCoordinator;
use crate::metrics::{MESSAGES_ACKED, MESSAGES_DEAD_LETTERED, MESSAGES_REQUEUED, counter};
use crate::supervisor::ConnectionSupervisor;
use scoreboard_core::ack::{AckDecision, AckPolicy};
use scoreboard_core::connector::{Backend, Connector};
use scoreboard_core::dead_letter::DeadLetterStore;
use scoreboard_core::decode::decode;
use scoreboard_core::queue::{Delivery, DeliveryId, QueueError, ScoreQueue};
use scoreboard_core::store::{RankingStore, RecordStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Lifecycle of the consumption loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No queue handle; about to connect
    Disconnected,
    /// Waiting on the supervisor for a queue handle
    Connecting,
    /// Receiving and processing deliveries
    Consuming,
    /// Shut down by the external signal
    Stopped,
}

/// Per-delivery count of failed decode attempts.
///
/// A requeued message comes back with the same [`DeliveryId`], which is
/// what lets a poison message be recognised across redeliveries.
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    decode_failures: HashMap<DeliveryId, u32>,
}

impl DeliveryTracker {
    /// Count another failed decode of `id` and return the new total.
    pub fn record_failure(&mut self, id: &DeliveryId) -> u32 {
        let count = self.decode_failures.entry(id.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Forget `id` once it has left the queue.
    pub fn clear(&mut self, id: &DeliveryId) {
        self.decode_failures.remove(id);
    }

    /// Forget every delivery.
    ///
    /// Called when the queue handle is rebuilt: after a rejoin the broker
    /// may hand some of these deliveries to another consumer, so their
    /// counts would never be cleared here.
    pub fn reset(&mut self) {
        self.decode_failures.clear();
    }

    /// Failed decodes recorded for `id`.
    #[must_use]
    pub fn failures(&self, id: &DeliveryId) -> u32 {
        self.decode_failures.get(id).copied().unwrap_or(0)
    }

    /// Number of deliveries being tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decode_failures.len()
    }

    /// Whether nothing is being tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decode_failures.is_empty()
    }
}

enum ConsumeExit {
    Shutdown,
    ConnectionLost(QueueError),
}

/// Single-slot score worker.
///
/// Processes strictly one delivery at a time; the dual-write coordinator
/// never runs concurrently inside one worker.
pub struct ScoreWorker<Q: Connector, R: Connector, K: Connector, D> {
    supervisor: Arc<ConnectionSupervisor<Q, R, K>>,
    coordinator: DualWriteCoordinator<R, K>,
    policy: AckPolicy,
    dead_letters: D,
    tracker: DeliveryTracker,
    state: watch::Sender<WorkerState>,
}

impl<Q, R, K, D> ScoreWorker<Q, R, K, D>
where
    Q: Connector,
    Q::Handle: ScoreQueue,
    R: Connector,
    R::Handle: RecordStore,
    K: Connector,
    K::Handle: RankingStore,
    D: DeadLetterStore,
{
    /// Create a worker over the supervised backends.
    #[must_use]
    pub fn new(
        supervisor: Arc<ConnectionSupervisor<Q, R, K>>,
        policy: AckPolicy,
        dead_letters: D,
    ) -> Self {
        let coordinator = DualWriteCoordinator::new(
            Arc::clone(supervisor.record_store()),
            Arc::clone(supervisor.ranking_store()),
        );
        let (state, _) = watch::channel(WorkerState::Disconnected);
        Self {
            supervisor,
            coordinator,
            policy,
            dead_letters,
            tracker: DeliveryTracker::default(),
            state,
        }
    }

    /// Observe state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Decode-failure bookkeeping, for inspection.
    #[must_use]
    pub const fn tracker(&self) -> &DeliveryTracker {
        &self.tracker
    }

    fn set_state(&self, state: WorkerState) {
        debug!(?state, "Worker state changed");
        self.state.send_replace(state);
    }

    /// Spawn the loop as a background task.
    #[must_use]
    pub fn spawn(mut self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()>
    where
        Self: Send + 'static,
    {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    /// Run until `shutdown` fires (or its sender is dropped).
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Score worker started");

        loop {
            self.set_state(WorkerState::Connecting);

            let acquired = tokio::select! {
                _ = shutdown.recv() => break,
                acquired = self.supervisor.queue().acquire() => acquired,
            };

            let queue = match acquired {
                Ok(queue) => queue,
                Err(e) => {
                    // Only reachable with a bounded retry policy.
                    error!(error = %e, "Queue unavailable, stopping worker");
                    break;
                }
            };

            self.set_state(WorkerState::Consuming);
            info!("Consuming score queue");

            match self.consume(&queue, &mut shutdown).await {
                ConsumeExit::Shutdown => break,
                ConsumeExit::ConnectionLost(e) => {
                    warn!(error = %e, "Queue connection lost, reconnecting");
                    drop(queue);
                    self.tracker.reset();
                    self.supervisor.invalidate(Backend::Queue).await;
                    self.set_state(WorkerState::Disconnected);
                }
            }
        }

        self.set_state(WorkerState::Stopped);
        info!("Score worker stopped");
    }

    async fn consume(
        &mut self,
        queue: &Q::Handle,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> ConsumeExit {
        loop {
            let received = tokio::select! {
                _ = shutdown.recv() => return ConsumeExit::Shutdown,
                received = queue.receive() => received,
            };

            let delivery = match received {
                Ok(delivery) => delivery,
                Err(e) if e.is_connection_loss() => return ConsumeExit::ConnectionLost(e),
                Err(e) => {
                    let delay = self.supervisor.queue().policy().delay_for_attempt(0);
                    warn!(error = %e, retry_in = ?delay, "Failed to receive delivery");
                    tokio::select! {
                        _ = shutdown.recv() => return ConsumeExit::Shutdown,
                        () = tokio::time::sleep(delay) => continue,
                    }
                }
            };

            let handled = tokio::select! {
                _ = shutdown.recv() => {
                    info!(delivery = %delivery.id, "Shutdown during processing, leaving delivery unacknowledged");
                    return ConsumeExit::Shutdown;
                }
                handled = self.handle_delivery(queue, &delivery) => handled,
            };

            // A failed ack or requeue leaves the broker position unknown;
            // rebuilding the consumer resumes from the last acknowledged one.
            if let Err(e) = handled {
                return ConsumeExit::ConnectionLost(e);
            }
        }
    }

    /// Decode, apply and settle one delivery.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the final ack or requeue fails.
    pub async fn handle_delivery(
        &mut self,
        queue: &Q::Handle,
        delivery: &Delivery,
    ) -> Result<AckDecision, QueueError> {
        let decision = match decode(&delivery.payload) {
            Ok(event) => {
                debug!(delivery = %delivery.id, event = %event, "Decoded score event");
                let outcome = self.coordinator.apply(&event).await;
                if let Some(backend) = self.policy.backend_at_fault(&outcome) {
                    self.supervisor.invalidate(backend).await;
                }
                self.policy.decide(&outcome)
            }
            Err(e) => {
                let attempts = self.tracker.record_failure(&delivery.id);
                warn!(
                    delivery = %delivery.id,
                    attempts,
                    max_attempts = self.policy.max_decode_attempts(),
                    error = %e,
                    "Undecodable payload"
                );
                match self.policy.decide_decode_failure(attempts) {
                    AckDecision::DeadLetter => self.dead_letter(delivery, &e.to_string(), attempts).await,
                    other => other,
                }
            }
        };

        match decision {
            AckDecision::Ack | AckDecision::DeadLetter => {
                queue.ack(delivery).await?;
                self.tracker.clear(&delivery.id);
                if decision == AckDecision::Ack {
                    counter!(MESSAGES_ACKED).increment(1);
                } else {
                    counter!(MESSAGES_DEAD_LETTERED).increment(1);
                }
            }
            AckDecision::NackRequeue => {
                queue.nack_requeue(delivery).await?;
                counter!(MESSAGES_REQUEUED).increment(1);
            }
        }

        debug!(delivery = %delivery.id, ?decision, "Delivery settled");
        Ok(decision)
    }

    async fn dead_letter(&self, delivery: &Delivery, error_message: &str, attempts: u32) -> AckDecision {
        let attempts = i32::try_from(attempts).unwrap_or(i32::MAX);
        match self.dead_letters.add_entry(delivery, error_message, attempts).await {
            Ok(id) => {
                warn!(delivery = %delivery.id, dead_letter_id = id, "Delivery dead-lettered");
                AckDecision::DeadLetter
            }
            Err(e) => {
                error!(delivery = %delivery.id, error = %e, "Dead-letter write failed, requeueing");
                AckDecision::NackRequeue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(offset: i64) -> DeliveryId {
        DeliveryId {
            queue: "score_queue".to_string(),
            partition: 0,
            offset,
        }
    }

    #[test]
    fn tracker_counts_per_delivery() {
        let mut tracker = DeliveryTracker::default();
        assert_eq!(tracker.record_failure(&id(1)), 1);
        assert_eq!(tracker.record_failure(&id(1)), 2);
        assert_eq!(tracker.record_failure(&id(2)), 1);
        assert_eq!(tracker.len(), 2);

        tracker.clear(&id(1));
        assert_eq!(tracker.failures(&id(1)), 0);
        assert_eq!(tracker.failures(&id(2)), 1);

        tracker.reset();
        assert!(tracker.is_empty());
    }
}
