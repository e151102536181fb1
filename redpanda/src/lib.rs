//! Kafka-compatible score queue for the score worker.
//!
//! Works against Redpanda, Apache Kafka or any broker speaking the Kafka
//! protocol, through rdkafka.
//!
//! # Queue Semantics on a Log
//!
//! The worker expects a durable queue with manual acknowledgment. On a log
//! that becomes:
//!
//! | queue operation | Kafka operation |
//! |---|---|
//! | durable named queue | topic + fixed consumer group |
//! | receive | `recv` on a `StreamConsumer` |
//! | ack | synchronous commit of `offset + 1` |
//! | reject and requeue | seek the partition back to the message offset |
//! | prefetch 1 | one message handled before the next `recv` |
//!
//! Offsets are committed only after the message is settled, so a crash
//! (or a dropped consumer) redelivers everything after the last ack.
//! Every worker process shares the consumer group, so partitions are
//! spread across processes by the broker.
//!
//! # Example
//!
//! ```no_run
//! use scoreboard_redpanda::{KafkaConnector, ScorePublisher};
//! use scoreboard_core::{Connector, ScoreEvent, ScoreQueue};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let publisher = ScorePublisher::new("localhost:9092")?;
//! let event = ScoreEvent::new("a@x.com", 42).ok_or("empty identity")?;
//! publisher.publish("score_queue", &event).await?;
//!
//! let connector = KafkaConnector::builder()
//!     .brokers("localhost:9092")
//!     .topic("score_queue")
//!     .consumer_group("score-worker")
//!     .build()?;
//! let queue = connector.connect().await?;
//! let delivery = queue.receive().await?;
//! queue.ack(&delivery).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod consumer;
mod publisher;

pub use consumer::{KafkaConnector, KafkaConnectorBuilder, KafkaScoreQueue};
pub use publisher::ScorePublisher;

use rdkafka::error::{KafkaError, RDKafkaErrorCode};

/// Whether `error` means the broker connection is gone rather than one
/// message failing.
///
/// A single broker dropping its socket (`BrokerTransportFailure`) is
/// transient: librdkafka reconnects on its own, so it is not treated as a
/// lost connection.
pub(crate) fn is_connection_loss(error: &KafkaError) -> bool {
    matches!(
        error.rdkafka_error_code(),
        Some(RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::Fatal)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cluster_wide_failures_are_connection_loss() {
        assert!(is_connection_loss(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::AllBrokersDown
        )));
        assert!(is_connection_loss(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::Fatal
        )));
        assert!(!is_connection_loss(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure
        )));
        assert!(!is_connection_loss(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::MessageTimedOut
        )));
    }
}
