use crate::is_connection_loss;
use rdkafka::TopicPartitionList;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::topic_partition_list::Offset;
use rdkafka::util::Timeout;
use scoreboard_core::connector::{Backend, ConnectError, Connector};
use scoreboard_core::queue::{Delivery, DeliveryId, QueueError, ScoreQueue};
use std::sync::Arc;
use std::time::Duration;

/// A connected consumer for one score topic.
///
/// Clones share the underlying consumer. Dropping the last clone leaves the
/// consumer group; uncommitted messages go to whichever member picks up the
/// partition next.
#[derive(Clone)]
pub struct KafkaScoreQueue {
    consumer: Arc<StreamConsumer>,
    topic: String,
    timeout: Duration,
}

impl KafkaScoreQueue {
    /// Topic this queue consumes.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    async fn fetch_metadata(&self) -> Result<(), KafkaErrorMessage> {
        let consumer = Arc::clone(&self.consumer);
        let topic = self.topic.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(Some(&topic), Timeout::After(timeout))
                .map(|_| ())
                .map_err(|e| KafkaErrorMessage(e.to_string()))
        })
        .await
        .map_err(|e| KafkaErrorMessage(e.to_string()))?
    }

    /// Commit or seek on a blocking thread; both calls block on the broker.
    async fn blocking<F>(&self, op: F) -> Result<(), String>
    where
        F: FnOnce(&StreamConsumer) -> Result<(), rdkafka::error::KafkaError> + Send + 'static,
    {
        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || op(&consumer).map_err(|e| e.to_string()))
            .await
            .map_err(|e| e.to_string())?
    }
}

struct KafkaErrorMessage(String);

impl ScoreQueue for KafkaScoreQueue {
    async fn receive(&self) -> Result<Delivery, QueueError> {
        match self.consumer.recv().await {
            Ok(message) => {
                let id = DeliveryId {
                    queue: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                };
                tracing::trace!(delivery = %id, "Received message");
                Ok(Delivery {
                    id,
                    payload: message.payload().unwrap_or_default().to_vec(),
                })
            }
            Err(e) if is_connection_loss(&e) => Err(QueueError::ConnectionFailed(e.to_string())),
            Err(e) => Err(QueueError::ReceiveFailed(e.to_string())),
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let id = delivery.id.clone();
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&id.queue, id.partition, Offset::Offset(id.offset + 1))
            .map_err(|e| QueueError::AckFailed {
                id: id.clone(),
                reason: e.to_string(),
            })?;

        self.blocking(move |consumer| consumer.commit(&offsets, CommitMode::Sync))
            .await
            .map_err(|reason| QueueError::AckFailed {
                id: id.clone(),
                reason,
            })?;

        tracing::trace!(delivery = %id, "Offset committed");
        Ok(())
    }

    async fn nack_requeue(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let id = delivery.id.clone();
        let (topic, partition, offset) = (id.queue.clone(), id.partition, id.offset);
        let timeout = self.timeout;

        self.blocking(move |consumer| {
            consumer.seek(&topic, partition, Offset::Offset(offset), Timeout::After(timeout))
        })
        .await
        .map_err(|reason| QueueError::RequeueFailed {
            id: id.clone(),
            reason,
        })?;

        tracing::trace!(delivery = %id, "Partition rewound for redelivery");
        Ok(())
    }
}

/// Builds [`KafkaScoreQueue`] consumers for the connection supervisor.
#[derive(Clone, Debug)]
pub struct KafkaConnector {
    brokers: String,
    topic: String,
    consumer_group: String,
    auto_offset_reset: String,
    session_timeout: Duration,
    timeout: Duration,
}

impl KafkaConnector {
    /// Create a builder with the worker's defaults.
    #[must_use]
    pub fn builder() -> KafkaConnectorBuilder {
        KafkaConnectorBuilder::default()
    }

    /// Topic consumed by queues from this connector.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn create_consumer(&self) -> Result<StreamConsumer, String> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", "false") // Ack is an explicit commit
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", self.session_timeout.as_millis().to_string())
            .set("enable.partition.eof", "false")
            .set("queued.min.messages", "1")
            .create()
            .map_err(|e| format!("Failed to create consumer: {e}"))?;

        consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|e| format!("Failed to subscribe to {}: {e}", self.topic))?;

        Ok(consumer)
    }
}

impl Connector for KafkaConnector {
    type Handle = KafkaScoreQueue;

    fn backend(&self) -> Backend {
        Backend::Queue
    }

    async fn connect(&self) -> Result<KafkaScoreQueue, ConnectError> {
        let down = |reason: String| ConnectError::Unreachable {
            backend: Backend::Queue,
            reason,
        };

        let queue = KafkaScoreQueue {
            consumer: Arc::new(self.create_consumer().map_err(down)?),
            topic: self.topic.clone(),
            timeout: self.timeout,
        };

        // Consumer creation is lazy; metadata proves a broker answered.
        queue
            .fetch_metadata()
            .await
            .map_err(|KafkaErrorMessage(reason)| down(reason))?;

        tracing::info!(
            brokers = %self.brokers,
            topic = %self.topic,
            consumer_group = %self.consumer_group,
            auto_offset_reset = %self.auto_offset_reset,
            manual_commit = true,
            "Subscribed to score topic"
        );
        Ok(queue)
    }

    async fn probe(&self, handle: &KafkaScoreQueue) -> Result<(), ConnectError> {
        handle
            .fetch_metadata()
            .await
            .map_err(|KafkaErrorMessage(reason)| ConnectError::ProbeFailed {
                backend: Backend::Queue,
                reason,
            })
    }
}

/// Builder for [`KafkaConnector`].
///
/// # Example
///
/// ```
/// use scoreboard_redpanda::KafkaConnector;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = KafkaConnector::builder()
///     .brokers("localhost:9092")
///     .auto_offset_reset("latest")
///     .build()?;
/// assert_eq!(connector.topic(), "score_queue");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct KafkaConnectorBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    consumer_group: Option<String>,
    auto_offset_reset: Option<String>,
    session_timeout: Option<Duration>,
    timeout: Option<Duration>,
}

impl KafkaConnectorBuilder {
    /// Broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Topic to consume (default: `score_queue`).
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Consumer group shared by all worker processes (default: `score-worker`).
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Where a group with no committed offset starts (default: `earliest`).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Group session timeout (default: 6s).
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Timeout for metadata, commit and seek calls (default: 5s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the connector.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConnectionFailed`] if brokers are not set.
    pub fn build(self) -> Result<KafkaConnector, QueueError> {
        let brokers = self
            .brokers
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| QueueError::ConnectionFailed("Brokers not configured".to_string()))?;

        Ok(KafkaConnector {
            brokers,
            topic: self.topic.unwrap_or_else(|| "score_queue".to_string()),
            consumer_group: self
                .consumer_group
                .unwrap_or_else(|| "score-worker".to_string()),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "earliest".to_string()),
            session_timeout: self.session_timeout.unwrap_or(Duration::from_secs(6)),
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kafka_score_queue_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KafkaScoreQueue>();
        assert_sync::<KafkaScoreQueue>();
    }

    #[test]
    fn builder_applies_defaults() {
        let connector = KafkaConnector::builder()
            .brokers("localhost:9092")
            .build();
        assert!(matches!(
            connector,
            Ok(KafkaConnector { ref topic, ref consumer_group, ref auto_offset_reset, .. })
                if topic == "score_queue"
                    && consumer_group == "score-worker"
                    && auto_offset_reset == "earliest"
        ));
    }

    #[test]
    fn builder_requires_brokers() {
        assert!(matches!(
            KafkaConnector::builder().build(),
            Err(QueueError::ConnectionFailed(_))
        ));
        assert!(KafkaConnector::builder().brokers("  ").build().is_err());
    }
}
