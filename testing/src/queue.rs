//! In-memory score queue with broker-style redelivery.
//!
//! Messages keep their offset for life, so a requeued message comes back
//! with the same [`DeliveryId`]. A requeued message is redelivered before
//! anything behind it, the way a Kafka consumer re-reads after seeking back.

#![allow(clippy::unwrap_used)]

use crate::failure::FailureSwitch;
use scoreboard_core::queue::{Delivery, DeliveryId, QueueError, ScoreQueue};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct QueueState {
    next_offset: i64,
    ready: VecDeque<Delivery>,
    in_flight: Option<Delivery>,
    acked: Vec<DeliveryId>,
    requeued: Vec<DeliveryId>,
    deliveries: usize,
}

/// Single-partition queue shared between a test and the worker.
#[derive(Clone, Debug)]
pub struct InMemoryScoreQueue {
    name: String,
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    connection_failures: FailureSwitch,
    receive_failures: FailureSwitch,
    settle_failures: FailureSwitch,
}

impl InMemoryScoreQueue {
    /// Create an empty queue called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            connection_failures: FailureSwitch::new(),
            receive_failures: FailureSwitch::new(),
            settle_failures: FailureSwitch::new(),
        }
    }

    /// Switch that makes `receive` report a lost connection.
    #[must_use]
    pub const fn connection_failures(&self) -> &FailureSwitch {
        &self.connection_failures
    }

    /// Switch that makes `receive` fail without losing the connection.
    #[must_use]
    pub const fn receive_failures(&self) -> &FailureSwitch {
        &self.receive_failures
    }

    /// Switch that makes `ack` and `nack_requeue` fail.
    ///
    /// A failed settle hands the delivery back to the head of the queue, as
    /// a broker does once the consumer that held it is gone.
    #[must_use]
    pub const fn settle_failures(&self) -> &FailureSwitch {
        &self.settle_failures
    }

    /// Enqueue a raw payload and return its id.
    pub fn publish(&self, payload: impl Into<Vec<u8>>) -> DeliveryId {
        let mut state = self.state.lock().unwrap();
        let id = DeliveryId {
            queue: self.name.clone(),
            partition: 0,
            offset: state.next_offset,
        };
        state.next_offset += 1;
        state.ready.push_back(Delivery {
            id: id.clone(),
            payload: payload.into(),
        });
        drop(state);
        self.notify.notify_one();
        id
    }

    /// Acknowledged ids, in order.
    #[must_use]
    pub fn acked(&self) -> Vec<DeliveryId> {
        self.state.lock().unwrap().acked.clone()
    }

    /// Requeued ids, in order (one entry per requeue).
    #[must_use]
    pub fn requeued(&self) -> Vec<DeliveryId> {
        self.state.lock().unwrap().requeued.clone()
    }

    /// Total deliveries handed out, redeliveries included.
    #[must_use]
    pub fn deliveries(&self) -> usize {
        self.state.lock().unwrap().deliveries
    }

    /// Messages waiting plus the one in flight.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.ready.len() + usize::from(state.in_flight.is_some())
    }

    /// Whether every published message has been acknowledged.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.outstanding() == 0
    }

    fn take_next(&self) -> Result<Option<Delivery>, QueueError> {
        let mut state = self.state.lock().unwrap();
        if let Some(in_flight) = &state.in_flight {
            // Prefetch limit of one: a new receive before settling is a bug.
            return Err(QueueError::ReceiveFailed(format!(
                "{} is still unacknowledged",
                in_flight.id
            )));
        }
        let Some(delivery) = state.ready.pop_front() else {
            return Ok(None);
        };
        state.in_flight = Some(delivery.clone());
        state.deliveries += 1;
        Ok(Some(delivery))
    }

    fn settle(&self, delivery: &Delivery) -> Option<Delivery> {
        let mut state = self.state.lock().unwrap();
        match state.in_flight.take() {
            Some(current) if current.id == delivery.id => Some(current),
            other => {
                state.in_flight = other;
                None
            }
        }
    }

    /// Return an unsettled in-flight delivery to the head of the queue, as a
    /// broker does when a consumer disconnects.
    pub fn release_in_flight(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(delivery) = state.in_flight.take() {
            state.ready.push_front(delivery);
        }
        drop(state);
        self.notify.notify_one();
    }
}

impl ScoreQueue for InMemoryScoreQueue {
    async fn receive(&self) -> Result<Delivery, QueueError> {
        loop {
            if self.connection_failures.trip() {
                self.release_in_flight();
                return Err(QueueError::ConnectionFailed("broker connection lost".to_string()));
            }
            if self.receive_failures.trip() {
                return Err(QueueError::ReceiveFailed("fetch timed out".to_string()));
            }
            let notified = self.notify.notified();
            if let Some(delivery) = self.take_next()? {
                return Ok(delivery);
            }
            notified.await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        if self.settle_failures.trip() {
            self.release_in_flight();
            return Err(QueueError::AckFailed {
                id: delivery.id.clone(),
                reason: "commit failed".to_string(),
            });
        }
        let settled = self.settle(delivery).ok_or_else(|| QueueError::AckFailed {
            id: delivery.id.clone(),
            reason: "delivery is not in flight".to_string(),
        })?;
        self.state.lock().unwrap().acked.push(settled.id);
        Ok(())
    }

    async fn nack_requeue(&self, delivery: &Delivery) -> Result<(), QueueError> {
        if self.settle_failures.trip() {
            self.release_in_flight();
            return Err(QueueError::RequeueFailed {
                id: delivery.id.clone(),
                reason: "seek failed".to_string(),
            });
        }
        let settled = self.settle(delivery).ok_or_else(|| QueueError::RequeueFailed {
            id: delivery.id.clone(),
            reason: "delivery is not in flight".to_string(),
        })?;
        let mut state = self.state.lock().unwrap();
        state.requeued.push(settled.id.clone());
        state.ready.push_front(settled);
        drop(state);
        self.notify.notify_one();
        Ok(())
    }
}
