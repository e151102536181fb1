//! In-memory record, ranking and dead-letter stores.
//!
//! `RwLock` poisoning is treated as a test bug, hence the `unwrap`s.

#![allow(clippy::unwrap_used)]

use crate::failure::FailureSwitch;
use chrono::Utc;
use scoreboard_core::dead_letter::{DeadLetter, DeadLetterStatus, DeadLetterStore};
use scoreboard_core::queue::Delivery;
use scoreboard_core::score::{RankingEntry, ScoreEvent, ScoreRecord};
use scoreboard_core::store::{RankingStore, RecordStore, Result, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Append-only record store backed by a `Vec`.
///
/// # Example
///
/// ```
/// use scoreboard_testing::InMemoryRecordStore;
/// use scoreboard_core::{RecordStore, ScoreEvent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryRecordStore::new();
/// let event = ScoreEvent::new("a@x.com", 10).ok_or("empty identity")?;
/// store.insert(&event).await?;
/// assert_eq!(store.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecordStore {
    rows: Arc<RwLock<Vec<ScoreRecord>>>,
    failures: FailureSwitch,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch controlling insert failures.
    #[must_use]
    pub const fn failures(&self) -> &FailureSwitch {
        &self.failures
    }

    /// All rows, in insertion order.
    #[must_use]
    pub fn rows(&self) -> Vec<ScoreRecord> {
        self.rows.read().unwrap().clone()
    }

    /// Scores recorded for `identity`, in insertion order.
    #[must_use]
    pub fn scores_for(&self, identity: &str) -> Vec<i64> {
        self.rows
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.identity == identity)
            .map(|r| r.score)
            .collect()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    /// Whether no rows were written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().unwrap().is_empty()
    }
}

impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, event: &ScoreEvent) -> Result<ScoreRecord> {
        if self.failures.trip() {
            return Err(StoreError::ConnectionFailed("record store is down".to_string()));
        }
        let record = ScoreRecord {
            identity: event.identity().to_string(),
            score: event.score(),
            recorded_at: Utc::now(),
        };
        self.rows.write().unwrap().push(record.clone());
        Ok(record)
    }

    async fn history(&self, identity: &str) -> Result<Vec<ScoreRecord>> {
        if self.failures.trip() {
            return Err(StoreError::ConnectionFailed("record store is down".to_string()));
        }
        Ok(self
            .rows
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.identity == identity)
            .cloned()
            .collect())
    }
}

/// Ranking store backed by a `HashMap`, using the default read-compare-write
/// `set_if_greater`.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRankingStore {
    entries: Arc<RwLock<HashMap<String, i64>>>,
    writes: Arc<RwLock<Vec<(String, i64)>>>,
    read_failures: FailureSwitch,
    write_failures: FailureSwitch,
}

impl InMemoryRankingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch controlling read failures.
    #[must_use]
    pub const fn read_failures(&self) -> &FailureSwitch {
        &self.read_failures
    }

    /// Switch controlling write failures.
    #[must_use]
    pub const fn write_failures(&self) -> &FailureSwitch {
        &self.write_failures
    }

    /// Current entry for `identity`, bypassing failure injection.
    #[must_use]
    pub fn entry(&self, identity: &str) -> Option<i64> {
        self.entries.read().unwrap().get(identity).copied()
    }

    /// Every successful write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(String, i64)> {
        self.writes.read().unwrap().clone()
    }
}

impl RankingStore for InMemoryRankingStore {
    async fn score(&self, identity: &str) -> Result<Option<i64>> {
        if self.read_failures.trip() {
            return Err(StoreError::ConnectionFailed("ranking store is down".to_string()));
        }
        Ok(self.entry(identity))
    }

    async fn set_score(&self, identity: &str, score: i64) -> Result<()> {
        if self.write_failures.trip() {
            return Err(StoreError::ConnectionFailed("ranking store is down".to_string()));
        }
        self.entries
            .write()
            .unwrap()
            .insert(identity.to_string(), score);
        self.writes
            .write()
            .unwrap()
            .push((identity.to_string(), score));
        Ok(())
    }

    async fn top(&self, limit: usize) -> Result<Vec<RankingEntry>> {
        if self.read_failures.trip() {
            return Err(StoreError::ConnectionFailed("ranking store is down".to_string()));
        }
        let mut entries: Vec<RankingEntry> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .map(|(identity, score)| RankingEntry::new(identity.clone(), *score))
            .collect();
        // Ties ordered by identity descending, matching ZREVRANGE.
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| b.identity.cmp(&a.identity)));
        entries.truncate(limit);
        Ok(entries)
    }
}

/// Dead-letter store backed by a `Vec`.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDeadLetterStore {
    entries: Arc<RwLock<Vec<DeadLetter>>>,
    failures: FailureSwitch,
}

impl InMemoryDeadLetterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch controlling write failures.
    #[must_use]
    pub const fn failures(&self) -> &FailureSwitch {
        &self.failures
    }

    /// All entries, in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries.read().unwrap().clone()
    }
}

impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn add_entry(
        &self,
        delivery: &Delivery,
        error_message: &str,
        attempts: i32,
    ) -> Result<i64> {
        if self.failures.trip() {
            return Err(StoreError::ConnectionFailed("dead-letter store is down".to_string()));
        }
        let mut entries = self.entries.write().unwrap();
        let id = i64::try_from(entries.len()).unwrap_or(i64::MAX) + 1;
        entries.push(DeadLetter {
            id,
            queue: delivery.id.queue.clone(),
            partition: delivery.id.partition,
            offset: delivery.id.offset,
            payload: delivery.payload.clone(),
            error_message: error_message.to_string(),
            attempts,
            failed_at: Utc::now(),
            status: DeadLetterStatus::Pending,
        });
        Ok(id)
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<DeadLetter>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.status == DeadLetterStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }
}
