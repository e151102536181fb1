//! Connection supervisor behaviour: lazy connect, probe-driven rebuilds,
//! bounded policies and backend independence.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use scoreboard_core::connector::{Backend, ConnectError};
use scoreboard_runtime::retry::RetryPolicy;
use scoreboard_runtime::{ConnectionSupervisor, Supervised};
use scoreboard_testing::{
    InMemoryConnector, InMemoryRankingStore, InMemoryRecordStore, InMemoryScoreQueue,
};
use std::sync::Arc;
use std::time::Duration;

fn fast() -> RetryPolicy {
    RetryPolicy::fixed(Duration::from_millis(1))
}

fn bounded(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .build()
}

#[tokio::test]
async fn test_connects_lazily_and_reuses_healthy_handle() {
    let connector = InMemoryConnector::new(Backend::RecordStore, InMemoryRecordStore::new());
    let slot = Supervised::new(connector.clone(), fast());

    assert!(!slot.is_connected().await);
    assert_eq!(connector.connects(), 0);

    slot.acquire().await.unwrap();
    slot.acquire().await.unwrap();
    assert!(slot.is_connected().await);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_failed_probe_triggers_rebuild() {
    let connector = InMemoryConnector::new(Backend::RankingStore, InMemoryRankingStore::new());
    let slot = Supervised::new(connector.clone(), fast());

    slot.acquire().await.unwrap();
    connector.probe_failures().fail_next(1);
    slot.acquire().await.unwrap();

    assert_eq!(connector.connects(), 2);
}

#[tokio::test]
async fn test_invalidate_forces_reconnect() {
    let connector = InMemoryConnector::new(Backend::RecordStore, InMemoryRecordStore::new());
    let slot = Supervised::new(connector.clone(), fast());

    slot.acquire().await.unwrap();
    slot.invalidate().await;
    assert!(!slot.is_connected().await);

    slot.acquire().await.unwrap();
    assert_eq!(connector.connects(), 2);
}

#[tokio::test]
async fn test_unbounded_policy_waits_out_an_outage() {
    let connector = InMemoryConnector::new(Backend::Queue, InMemoryScoreQueue::new("score_queue"));
    connector.connect_failures().fail_next(25);
    let slot = Supervised::new(connector.clone(), fast());

    slot.acquire().await.unwrap();
    assert_eq!(connector.connects(), 1);
    assert!(!connector.connect_failures().is_failing());
}

#[tokio::test]
async fn test_bounded_policy_reports_exhaustion() {
    let connector = InMemoryConnector::new(Backend::RecordStore, InMemoryRecordStore::new());
    connector.connect_failures().fail_always();
    let slot = Supervised::new(connector, bounded(2));

    let err = slot.acquire().await.unwrap_err();
    assert_eq!(
        err,
        ConnectError::Exhausted {
            backend: Backend::RecordStore,
            attempts: 3,
        }
    );
    assert!(!slot.is_connected().await);
}

#[tokio::test]
async fn test_one_backend_outage_does_not_block_others() {
    let queue = InMemoryConnector::new(Backend::Queue, InMemoryScoreQueue::new("score_queue"));
    let records = InMemoryConnector::new(Backend::RecordStore, InMemoryRecordStore::new());
    let ranking = InMemoryConnector::new(Backend::RankingStore, InMemoryRankingStore::new());
    queue.connect_failures().fail_always();

    let supervisor = Arc::new(ConnectionSupervisor::new(
        queue.clone(),
        records.clone(),
        ranking.clone(),
        &fast(),
    ));

    let stuck = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.queue().acquire().await })
    };

    tokio::time::timeout(Duration::from_secs(1), async {
        supervisor.record_store().acquire().await.unwrap();
        supervisor.ranking_store().acquire().await.unwrap();
    })
    .await
    .expect("stores connect while the broker is down");

    assert!(!stuck.is_finished());
    queue.connect_failures().heal();
    stuck.await.unwrap().unwrap();
    assert_eq!(queue.connects(), 1);
}

#[tokio::test]
async fn test_connect_all_and_invalidate_by_backend() {
    let queue = InMemoryConnector::new(Backend::Queue, InMemoryScoreQueue::new("score_queue"));
    let records = InMemoryConnector::new(Backend::RecordStore, InMemoryRecordStore::new());
    let ranking = InMemoryConnector::new(Backend::RankingStore, InMemoryRankingStore::new());
    let supervisor = ConnectionSupervisor::new(queue, records, ranking, &fast());

    supervisor.connect_all().await.unwrap();
    assert!(supervisor.queue().is_connected().await);
    assert!(supervisor.record_store().is_connected().await);
    assert!(supervisor.ranking_store().is_connected().await);

    supervisor.invalidate(Backend::RankingStore).await;
    assert!(supervisor.queue().is_connected().await);
    assert!(supervisor.record_store().is_connected().await);
    assert!(!supervisor.ranking_store().is_connected().await);
}
