//! Dual-write outcomes and the acknowledgment policy.
//!
//! | outcome | decision | handle invalidated |
//! |---|---|---|
//! | `Committed` | `Ack` | none |
//! | `RecordStoreFailed` | `NackRequeue` | record store |
//! | `RankingStoreFailed` | `NackRequeue` | ranking store |
//! | decode failure, below bound | `NackRequeue` | none |
//! | decode failure, at bound | `DeadLetter` | none |

use crate::connector::Backend;
use crate::store::StoreError;

/// Result of applying one event to both stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The record was inserted and the ranking step finished.
    Committed {
        /// Whether the ranking entry was actually raised
        ranking_updated: bool,
    },
    /// The record insert failed; the ranking store was not touched.
    RecordStoreFailed(StoreError),
    /// The record insert committed but the ranking read or write failed.
    RankingStoreFailed(StoreError),
}

impl Outcome {
    /// Whether both stores finished their part.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// What to tell the queue about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Accept and remove the message
    Ack,
    /// Reject and redeliver the identical message
    NackRequeue,
    /// Divert the message to the dead-letter store, then remove it
    DeadLetter,
}

/// Default number of decode attempts before a message is dead-lettered.
pub const DEFAULT_MAX_DECODE_ATTEMPTS: u32 = 3;

/// Maps processing results to queue decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPolicy {
    max_decode_attempts: u32,
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DECODE_ATTEMPTS)
    }
}

impl AckPolicy {
    /// Policy that dead-letters a payload after `max_decode_attempts`
    /// failed decodes. A value of 0 is treated as 1.
    #[must_use]
    pub const fn new(max_decode_attempts: u32) -> Self {
        Self {
            max_decode_attempts: if max_decode_attempts == 0 {
                1
            } else {
                max_decode_attempts
            },
        }
    }

    /// Decode attempts allowed before dead-lettering.
    #[must_use]
    pub const fn max_decode_attempts(&self) -> u32 {
        self.max_decode_attempts
    }

    /// Decision for a dual-write outcome.
    #[must_use]
    pub const fn decide(&self, outcome: &Outcome) -> AckDecision {
        match outcome {
            Outcome::Committed { .. } => AckDecision::Ack,
            Outcome::RecordStoreFailed(_) | Outcome::RankingStoreFailed(_) => {
                AckDecision::NackRequeue
            }
        }
    }

    /// Backend whose handle must be rebuilt before the next attempt.
    #[must_use]
    pub const fn backend_at_fault(&self, outcome: &Outcome) -> Option<Backend> {
        match outcome {
            Outcome::Committed { .. } => None,
            Outcome::RecordStoreFailed(_) => Some(Backend::RecordStore),
            Outcome::RankingStoreFailed(_) => Some(Backend::RankingStore),
        }
    }

    /// Decision for a payload that has now failed to decode `attempts` times.
    ///
    /// The payload, not a backend, is at fault, so no handle is invalidated.
    #[must_use]
    pub const fn decide_decode_failure(&self, attempts: u32) -> AckDecision {
        if attempts >= self.max_decode_attempts {
            AckDecision::DeadLetter
        } else {
            AckDecision::NackRequeue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> StoreError {
        StoreError::ConnectionFailed("down".to_string())
    }

    #[test]
    fn committed_is_acked_without_invalidation() {
        let policy = AckPolicy::default();
        for ranking_updated in [true, false] {
            let outcome = Outcome::Committed { ranking_updated };
            assert_eq!(policy.decide(&outcome), AckDecision::Ack);
            assert_eq!(policy.backend_at_fault(&outcome), None);
        }
    }

    #[test]
    fn store_failures_requeue_and_blame_their_backend() {
        let policy = AckPolicy::default();

        let record = Outcome::RecordStoreFailed(failure());
        assert_eq!(policy.decide(&record), AckDecision::NackRequeue);
        assert_eq!(policy.backend_at_fault(&record), Some(Backend::RecordStore));

        let ranking = Outcome::RankingStoreFailed(failure());
        assert_eq!(policy.decide(&ranking), AckDecision::NackRequeue);
        assert_eq!(policy.backend_at_fault(&ranking), Some(Backend::RankingStore));
    }

    #[test]
    fn decode_failures_dead_letter_at_the_bound() {
        let policy = AckPolicy::new(3);
        assert_eq!(policy.decide_decode_failure(1), AckDecision::NackRequeue);
        assert_eq!(policy.decide_decode_failure(2), AckDecision::NackRequeue);
        assert_eq!(policy.decide_decode_failure(3), AckDecision::DeadLetter);
    }

    #[test]
    fn zero_bound_dead_letters_immediately() {
        let policy = AckPolicy::new(0);
        assert_eq!(policy.max_decode_attempts(), 1);
        assert_eq!(policy.decide_decode_failure(1), AckDecision::DeadLetter);
    }
}
