use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use scoreboard_core::decode::encode;
use scoreboard_core::queue::QueueError;
use scoreboard_core::score::ScoreEvent;
use std::time::Duration;

/// Producer side of the score queue.
///
/// Messages are the JSON wire form read by the worker and are keyed by
/// identity, so one identity's scores land on one partition in order.
pub struct ScorePublisher {
    producer: FutureProducer,
    timeout: Duration,
}

impl ScorePublisher {
    /// Create a publisher for `brokers` with `acks=all`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if the producer cannot be
    /// created.
    pub fn new(brokers: &str) -> Result<Self, QueueError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| QueueError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        Ok(Self {
            producer,
            timeout: Duration::from_secs(5),
        })
    }

    /// Publish `event` to `topic`, returning its partition and offset.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::PublishFailed`] if encoding or delivery fails.
    pub async fn publish(&self, topic: &str, event: &ScoreEvent) -> Result<(i32, i64), QueueError> {
        let payload = encode(event).map_err(|e| QueueError::PublishFailed {
            queue: topic.to_string(),
            reason: e.to_string(),
        })?;
        self.publish_raw(topic, event.identity(), &payload).await
    }

    /// Publish an arbitrary payload. Used to inject malformed messages.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::PublishFailed`] if delivery fails.
    pub async fn publish_raw(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<(i32, i64), QueueError> {
        let record = FutureRecord::to(topic).payload(payload).key(key);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(topic, partition, offset, key, "Score message published");
                Ok((partition, offset))
            }
            Err((kafka_error, _)) => {
                tracing::error!(topic, error = %kafka_error, "Failed to publish score message");
                Err(QueueError::PublishFailed {
                    queue: topic.to_string(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }
}
