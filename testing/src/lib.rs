//! # Scoreboard Testing
//!
//! In-memory backends for exercising the score worker without a broker,
//! Postgres or Redis.
//!
//! Every backend is cheap to clone and clones share state, so a test keeps
//! one copy for assertions while the worker owns another. Each exposes one
//! or more [`FailureSwitch`]es for injecting outages.
//!
//! ## Example
//!
//! ```
//! use scoreboard_core::connector::Backend;
//! use scoreboard_testing::{InMemoryConnector, InMemoryRankingStore};
//!
//! let ranking = InMemoryRankingStore::new();
//! let connector = InMemoryConnector::new(Backend::RankingStore, ranking.clone());
//! connector.probe_failures().fail_next(1);
//! assert_eq!(connector.connects(), 0);
//! ```

pub mod connector;
pub mod failure;
pub mod queue;
pub mod stores;

pub use connector::InMemoryConnector;
pub use failure::FailureSwitch;
pub use queue::InMemoryScoreQueue;
pub use stores::{InMemoryDeadLetterStore, InMemoryRankingStore, InMemoryRecordStore};

/// Well-formed queue payload for `identity` and `score`.
#[must_use]
pub fn score_payload(identity: &str, score: i64) -> Vec<u8> {
    serde_json::json!({ "email": identity, "score": score })
        .to_string()
        .into_bytes()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use scoreboard_core::decode::decode;

    #[test]
    fn payload_escapes_identity() {
        let identity = r#"a"b\c@x.com"#;
        let event = decode(&score_payload(identity, 5)).unwrap();
        assert_eq!(event.identity(), identity);
        assert_eq!(event.score(), 5);
    }
}
