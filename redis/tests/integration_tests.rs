//! Integration tests for `RedisRankingStore` using testcontainers.
//!
//! Docker must be running. Ignored by default:
//!
//! ```bash
//! cargo test -p scoreboard-redis -- --ignored
//! ```

#![allow(clippy::expect_used)]

use scoreboard_core::RankingStore;
use scoreboard_core::connector::Connector;
use scoreboard_core::score::RankingEntry;
use scoreboard_redis::{RedisConnector, RedisRankingStore};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::{REDIS_PORT, Redis};

async fn setup_redis() -> (ContainerAsync<Redis>, String) {
    let container = Redis::default()
        .start()
        .await
        .expect("Failed to start redis container");
    let port = container
        .get_host_port_ipv4(REDIS_PORT)
        .await
        .expect("Failed to get redis port");
    (container, format!("redis://127.0.0.1:{port}"))
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_set_if_greater_keeps_maximum() {
    let (_container, url) = setup_redis().await;
    let ranking = RedisRankingStore::new(&url, "leaderboard:test")
        .await
        .expect("connect");

    assert!(ranking.set_if_greater("a@x.com", 10).await.expect("first"));
    assert!(!ranking.set_if_greater("a@x.com", 5).await.expect("lower"));
    assert!(!ranking.set_if_greater("a@x.com", 10).await.expect("equal"));
    assert!(ranking.set_if_greater("a@x.com", 20).await.expect("higher"));

    assert_eq!(ranking.score("a@x.com").await.expect("score"), Some(20));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_first_zero_creates_entry() {
    let (_container, url) = setup_redis().await;
    let ranking = RedisRankingStore::new(&url, "leaderboard:test")
        .await
        .expect("connect");

    assert_eq!(ranking.score("z@x.com").await.expect("absent"), None);
    assert!(ranking.set_if_greater("z@x.com", 0).await.expect("first zero"));
    assert!(!ranking.set_if_greater("z@x.com", 0).await.expect("second zero"));
    assert_eq!(ranking.score("z@x.com").await.expect("score"), Some(0));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_negative_score_never_enters_ranking() {
    let (_container, url) = setup_redis().await;
    let ranking = RedisRankingStore::new(&url, "leaderboard:test")
        .await
        .expect("connect");

    assert!(!ranking.set_if_greater("n@x.com", -5).await.expect("first negative"));
    assert_eq!(ranking.score("n@x.com").await.expect("absent"), None);
    assert!(ranking.set_if_greater("n@x.com", 3).await.expect("positive"));
    assert_eq!(ranking.score("n@x.com").await.expect("score"), Some(3));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_top_orders_descending() {
    let (_container, url) = setup_redis().await;
    let connector = RedisConnector::new(&url, "leaderboard:test");
    let ranking = connector.connect().await.expect("connect");
    connector.probe(&ranking).await.expect("ping");

    ranking.set_score("a", 5).await.expect("a");
    ranking.set_score("b", 50).await.expect("b");
    ranking.set_score("c", 20).await.expect("c");

    assert_eq!(
        ranking.top(2).await.expect("top"),
        vec![RankingEntry::new("b", 50), RankingEntry::new("c", 20)]
    );
    assert!(ranking.top(0).await.expect("empty").is_empty());
}
