//! Score queue abstraction.
//!
//! The worker consumes one durable, named queue with manual acknowledgment
//! and at most one unacknowledged delivery in flight. A delivery is either
//! acknowledged (removed from the queue) or rejected with requeue (delivered
//! again later, unchanged).
//!
//! # Implementations
//!
//! - `KafkaScoreQueue` (in `scoreboard-redpanda`): Kafka-compatible broker
//! - `InMemoryScoreQueue` (in `scoreboard-testing`): deterministic tests

use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Errors raised by queue operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The broker could not be reached or the connection was lost
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Receiving the next delivery failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Acknowledging a delivery failed
    #[error("Ack failed for {id}: {reason}")]
    AckFailed {
        /// The delivery that could not be acknowledged
        id: DeliveryId,
        /// The reason for failure
        reason: String,
    },

    /// Requeueing a delivery failed
    #[error("Requeue failed for {id}: {reason}")]
    RequeueFailed {
        /// The delivery that could not be requeued
        id: DeliveryId,
        /// The reason for failure
        reason: String,
    },

    /// Publishing a message failed
    #[error("Publish failed for queue '{queue}': {reason}")]
    PublishFailed {
        /// The target queue
        queue: String,
        /// The reason for failure
        reason: String,
    },
}

impl QueueError {
    /// Whether this error means the broker connection itself is unusable.
    #[must_use]
    pub const fn is_connection_loss(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}

/// Position of a delivery in the broker.
///
/// Redelivery of a requeued message yields the same id, so it doubles as
/// the key for counting delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId {
    /// Queue (topic) name
    pub queue: String,
    /// Partition within the queue
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.queue, self.partition, self.offset)
    }
}

/// One received, not yet acknowledged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker position of the message
    pub id: DeliveryId,
    /// Raw message body
    pub payload: Vec<u8>,
}

/// A consumer handle on the score queue.
pub trait ScoreQueue: Send + Sync {
    /// Wait for the next delivery.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if the broker connection is
    /// lost, or [`QueueError::ReceiveFailed`] for a per-message failure.
    fn receive(&self) -> impl Future<Output = Result<Delivery, QueueError>> + Send;

    /// Accept the delivery and remove it from the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AckFailed`] if the broker rejects the ack.
    fn ack(&self, delivery: &Delivery) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Reject the delivery and put it back so it is delivered again.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::RequeueFailed`] if the broker rejects the requeue.
    fn nack_requeue(
        &self,
        delivery: &Delivery,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;
}
