//! Score entities shared by the worker and its backends.
//!
//! - [`ScoreEvent`]: a decoded queue message, transient per delivery attempt
//! - [`ScoreRecord`]: an append-only row in the record store
//! - [`RankingEntry`]: an identity's best score in the ranking store

use crate::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated score submission.
///
/// Only produced by [`decode`](crate::decode::decode), so the identity is
/// always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScoreEvent {
    identity: String,
    score: i64,
}

impl ScoreEvent {
    /// Build an event from parts that have already been validated.
    ///
    /// Returns `None` when `identity` is empty.
    #[must_use]
    pub fn new(identity: impl Into<String>, score: i64) -> Option<Self> {
        let identity = identity.into();
        if identity.is_empty() {
            return None;
        }
        Some(Self { identity, score })
    }

    /// Opaque account key that owns the score.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The submitted score.
    #[must_use]
    pub const fn score(&self) -> i64 {
        self.score
    }
}

impl fmt::Display for ScoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.identity, self.score)
    }
}

/// A row of score history in the record store.
///
/// Rows carry no uniqueness constraint: a redelivered event produces a
/// second identical row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Owner of the score
    pub identity: String,
    /// Submitted score
    pub score: i64,
    /// When the row was written
    pub recorded_at: DateTime<Utc>,
}

/// An identity's highest observed score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// Owner of the score
    pub identity: String,
    /// Best score applied to the ranking store so far
    pub score: i64,
}

impl RankingEntry {
    /// Create a ranking entry.
    #[must_use]
    pub fn new(identity: impl Into<String>, score: i64) -> Self {
        Self {
            identity: identity.into(),
            score,
        }
    }
}
