//! Integration tests for the Kafka score queue against a real broker.
//!
//! These tests use testcontainers to start Kafka and check:
//! - publish, receive and ack
//! - requeue redelivers the same offset
//! - an unacknowledged message survives a rebuilt consumer
//!
//! # Running These Tests
//!
//! Marked `#[ignore]` because they need Docker and take a while to start
//! Kafka:
//!
//! ```bash
//! cargo test -p scoreboard-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use scoreboard_core::connector::Connector;
use scoreboard_core::queue::ScoreQueue;
use scoreboard_core::{ScoreEvent, decode};
use scoreboard_redpanda::{KafkaConnector, ScorePublisher};
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

/// Publish until the broker accepts, which also auto-creates the topic.
async fn publish_when_ready(publisher: &ScorePublisher, topic: &str, event: &ScoreEvent) {
    for attempt in 1..=60 {
        if publisher.publish(topic, event).await.is_ok() {
            tokio::time::sleep(Duration::from_secs(1)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(attempt != 60, "Kafka failed to accept messages");
    }
}

fn connector(brokers: &str, topic: &str) -> KafkaConnector {
    KafkaConnector::builder()
        .brokers(brokers)
        .topic(topic)
        .consumer_group("score-worker-test")
        .auto_offset_reset("earliest")
        .build()
        .expect("valid connector config")
}

fn event(identity: &str, score: i64) -> ScoreEvent {
    ScoreEvent::new(identity, score).expect("non-empty identity")
}

#[tokio::test]
#[ignore]
async fn test_publish_receive_ack() {
    let (_kafka, brokers) = start_kafka().await;
    let publisher = ScorePublisher::new(&brokers).expect("producer");
    publish_when_ready(&publisher, "scores-ack", &event("a@x.com", 10)).await;
    publisher
        .publish("scores-ack", &event("a@x.com", 20))
        .await
        .expect("publish second");

    let queue = connector(&brokers, "scores-ack")
        .connect()
        .await
        .expect("connect");

    let first = tokio::time::timeout(Duration::from_secs(30), queue.receive())
        .await
        .expect("receive timed out")
        .expect("receive");
    assert_eq!(decode(&first.payload), Ok(event("a@x.com", 10)));
    queue.ack(&first).await.expect("ack");

    let second = queue.receive().await.expect("receive second");
    assert_eq!(second.id.offset, first.id.offset + 1);
    assert_eq!(decode(&second.payload), Ok(event("a@x.com", 20)));
    queue.ack(&second).await.expect("ack second");
}

#[tokio::test]
#[ignore]
async fn test_requeue_redelivers_same_offset() {
    let (_kafka, brokers) = start_kafka().await;
    let publisher = ScorePublisher::new(&brokers).expect("producer");
    publish_when_ready(&publisher, "scores-requeue", &event("a@x.com", 1)).await;

    let queue = connector(&brokers, "scores-requeue")
        .connect()
        .await
        .expect("connect");

    let delivery = tokio::time::timeout(Duration::from_secs(30), queue.receive())
        .await
        .expect("receive timed out")
        .expect("receive");
    queue.nack_requeue(&delivery).await.expect("requeue");

    let again = queue.receive().await.expect("redelivery");
    assert_eq!(again.id, delivery.id);
    assert_eq!(again.payload, delivery.payload);
    queue.ack(&again).await.expect("ack");
}

#[tokio::test]
#[ignore]
async fn test_unacked_message_survives_new_consumer() {
    let (_kafka, brokers) = start_kafka().await;
    let publisher = ScorePublisher::new(&brokers).expect("producer");
    publish_when_ready(&publisher, "scores-rebuild", &event("a@x.com", 7)).await;

    let connector = connector(&brokers, "scores-rebuild");
    let queue = connector.connect().await.expect("connect");
    let delivery = tokio::time::timeout(Duration::from_secs(30), queue.receive())
        .await
        .expect("receive timed out")
        .expect("receive");
    drop(queue);

    let rebuilt = connector.connect().await.expect("reconnect");
    let again = tokio::time::timeout(Duration::from_secs(60), rebuilt.receive())
        .await
        .expect("redelivery timed out")
        .expect("redelivery");
    assert_eq!(again.id, delivery.id);
}
