//! `Redis` sorted-set ranking store.
//!
//! One sorted set holds the leaderboard: member = identity, score = that
//! identity's best score. Raising a score uses `ZADD key GT CH`, so
//! concurrent workers cannot lower an entry through a lost update.
//!
//! Requires `Redis` 6.2 or newer for `ZADD GT`.
//!
//! Sorted-set scores are doubles. Scores beyond ±2^53 lose precision.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use scoreboard_core::connector::{Backend, ConnectError, Connector};
use scoreboard_core::score::RankingEntry;
use scoreboard_core::store::{RANKING_FLOOR, RankingStore, Result, StoreError};

/// Default leaderboard key.
pub const DEFAULT_LEADERBOARD_KEY: &str = "leaderboard:fruit_box";

fn store_error(e: &RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
    {
        StoreError::ConnectionFailed(e.to_string())
    } else {
        StoreError::QueryFailed(e.to_string())
    }
}

#[allow(clippy::cast_possible_truncation)] // Only integral scores are ever written
fn to_score(value: f64) -> Result<i64> {
    if value.is_finite() {
        Ok(value as i64)
    } else {
        Err(StoreError::CorruptData(format!("Non-finite ranking score: {value}")))
    }
}

/// `Redis`-backed ranking store.
///
/// # Example
///
/// ```no_run
/// use scoreboard_redis::RedisRankingStore;
/// use scoreboard_core::RankingStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ranking = RedisRankingStore::new("redis://127.0.0.1:6379", "leaderboard:fruit_box").await?;
/// ranking.set_if_greater("a@x.com", 42).await?;
/// for entry in ranking.top(10).await? {
///     println!("{} {}", entry.identity, entry.score);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisRankingStore {
    conn_manager: ConnectionManager,
    key: String,
}

impl RedisRankingStore {
    /// Connect to `redis_url` and use the sorted set at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if `Redis` is unreachable.
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::ConnectionFailed(format!(
                "Failed to create Redis connection manager: {e}"
            ))
        })?;

        Ok(Self {
            conn_manager,
            key: key.into(),
        })
    }

    /// The sorted-set key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Round-trip a `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the server does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error(&e))?;
        Ok(())
    }
}

impl RankingStore for RedisRankingStore {
    async fn score(&self, identity: &str) -> Result<Option<i64>> {
        let mut conn = self.conn_manager.clone();
        let score: Option<f64> = conn
            .zscore(&self.key, identity)
            .await
            .map_err(|e| store_error(&e))?;
        score.map(to_score).transpose()
    }

    async fn set_score(&self, identity: &str, score: i64) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: i64 = conn
            .zadd(&self.key, identity, score)
            .await
            .map_err(|e| store_error(&e))?;
        Ok(())
    }

    async fn set_if_greater(&self, identity: &str, score: i64) -> Result<bool> {
        if score < RANKING_FLOOR {
            return Ok(false);
        }
        let mut conn = self.conn_manager.clone();
        // GT never lowers an existing member but always adds a new one.
        let changed: i64 = redis::cmd("ZADD")
            .arg(&self.key)
            .arg("GT")
            .arg("CH")
            .arg(score)
            .arg(identity)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error(&e))?;

        tracing::debug!(key = %self.key, identity, score, changed, "ZADD GT");
        Ok(changed > 0)
    }

    async fn top(&self, limit: usize) -> Result<Vec<RankingEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(limit - 1).unwrap_or(isize::MAX);
        let mut conn = self.conn_manager.clone();
        let rows: Vec<(String, f64)> = conn
            .zrevrange_withscores(&self.key, 0, stop)
            .await
            .map_err(|e| store_error(&e))?;

        rows.into_iter()
            .map(|(identity, score)| Ok(RankingEntry::new(identity, to_score(score)?)))
            .collect()
    }
}

/// Builds [`RedisRankingStore`] handles for the connection supervisor.
#[derive(Clone, Debug)]
pub struct RedisConnector {
    redis_url: String,
    key: String,
}

impl RedisConnector {
    /// Connector for `redis_url`, ranking under `key`.
    #[must_use]
    pub fn new(redis_url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            key: key.into(),
        }
    }
}

impl Connector for RedisConnector {
    type Handle = RedisRankingStore;

    fn backend(&self) -> Backend {
        Backend::RankingStore
    }

    async fn connect(&self) -> std::result::Result<RedisRankingStore, ConnectError> {
        RedisRankingStore::new(&self.redis_url, self.key.clone())
            .await
            .map_err(|e| ConnectError::Unreachable {
                backend: Backend::RankingStore,
                reason: e.to_string(),
            })
    }

    async fn probe(&self, handle: &RedisRankingStore) -> std::result::Result<(), ConnectError> {
        handle.ping().await.map_err(|e| ConnectError::ProbeFailed {
            backend: Backend::RankingStore,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_scores_convert_exactly() {
        assert_eq!(to_score(42.0), Ok(42));
        assert_eq!(to_score(-3.0), Ok(-3));
        assert_eq!(to_score(0.0), Ok(0));
    }

    #[test]
    fn non_finite_scores_are_corrupt() {
        assert!(matches!(to_score(f64::INFINITY), Err(StoreError::CorruptData(_))));
        assert!(matches!(to_score(f64::NAN), Err(StoreError::CorruptData(_))));
    }
}
