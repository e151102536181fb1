//! Record store and ranking store abstractions.
//!
//! The record store is the durable, append-only history of every accepted
//! score. The ranking store is a derived view holding only each identity's
//! best score.
//!
//! # Implementations
//!
//! - `PostgresRecordStore` (in `scoreboard-postgres`): production record store
//! - `RedisRankingStore` (in `scoreboard-redis`): production ranking store
//! - `InMemoryRecordStore` / `InMemoryRankingStore` (in `scoreboard-testing`)

use crate::score::{RankingEntry, ScoreEvent, ScoreRecord};
use std::future::Future;
use thiserror::Error;

/// Errors raised by the record store or the ranking store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A statement or command was rejected
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A transaction could not be opened, committed or rolled back
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Stored data could not be interpreted
    #[error("Corrupt data: {0}")]
    CorruptData(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Append-only history of score submissions.
pub trait RecordStore: Send + Sync {
    /// Insert one row for `event` inside a transaction scoped to that insert.
    ///
    /// The transaction is committed before returning `Ok`. On failure it is
    /// rolled back and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert or commit fails.
    fn insert(&self, event: &ScoreEvent) -> impl Future<Output = Result<ScoreRecord>> + Send;

    /// All rows recorded for `identity`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    fn history(&self, identity: &str) -> impl Future<Output = Result<Vec<ScoreRecord>>> + Send;
}

/// Lowest score that can enter the ranking.
///
/// A missing entry compares as this value, so every stored entry is at
/// least the floor.
pub const RANKING_FLOOR: i64 = 0;

/// Sorted best-score-per-identity structure.
pub trait RankingStore: Send + Sync {
    /// Current best score for `identity`, or `None` if it has no entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn score(&self, identity: &str) -> impl Future<Output = Result<Option<i64>>> + Send;

    /// Unconditionally set `identity`'s entry to `score`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn set_score(&self, identity: &str, score: i64) -> impl Future<Output = Result<()>> + Send;

    /// Raise `identity`'s entry to `score` if `score` is strictly greater
    /// than the current entry.
    ///
    /// An absent entry counts as [`RANKING_FLOOR`] except that a first score
    /// equal to the floor still creates the entry. Scores below the floor
    /// are never ranked.
    ///
    /// Returns whether the entry was written. The default implementation is
    /// a read-compare-write that is not atomic across concurrent writers;
    /// backends with a native "set if greater" primitive override it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read or the write fails.
    fn set_if_greater(
        &self,
        identity: &str,
        score: i64,
    ) -> impl Future<Output = Result<bool>> + Send {
        async move {
            if score < RANKING_FLOOR {
                return Ok(false);
            }
            match self.score(identity).await? {
                Some(current) if score <= current => Ok(false),
                _ => {
                    self.set_score(identity, score).await?;
                    Ok(true)
                }
            }
        }
    }

    /// Highest entries in descending score order, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn top(&self, limit: usize) -> impl Future<Output = Result<Vec<RankingEntry>>> + Send;
}
