//! Dual write of one score event to the record store and the ranking store.
//!
//! The order is fixed and there is no compensation:
//!
//! 1. Insert the score record (its own transaction, committed immediately).
//!    On failure stop with `RecordStoreFailed`; the ranking is untouched.
//! 2. Raise the identity's ranking entry if the score is strictly greater
//!    (or the identity has no entry yet). A lower or equal score is not an
//!    error.
//! 3. Any ranking failure yields `RankingStoreFailed`. The record from step 1
//!    stays committed, so a redelivery writes a duplicate history row.

use crate::metrics::{APPLY_DURATION, RANKING_UPDATED, counter, histogram};
use crate::supervisor::Supervised;
use scoreboard_core::ack::Outcome;
use scoreboard_core::connector::Connector;
use scoreboard_core::score::ScoreEvent;
use scoreboard_core::store::{RankingStore, RecordStore, StoreError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Applies score events to both stores through supervised handles.
pub struct DualWriteCoordinator<R: Connector, K: Connector> {
    record_store: Arc<Supervised<R>>,
    ranking_store: Arc<Supervised<K>>,
}

impl<R, K> DualWriteCoordinator<R, K>
where
    R: Connector,
    R::Handle: RecordStore,
    K: Connector,
    K::Handle: RankingStore,
{
    /// Create a coordinator borrowing handles from the given slots.
    #[must_use]
    pub const fn new(record_store: Arc<Supervised<R>>, ranking_store: Arc<Supervised<K>>) -> Self {
        Self {
            record_store,
            ranking_store,
        }
    }

    /// Apply one event and report a single outcome.
    pub async fn apply(&self, event: &ScoreEvent) -> Outcome {
        let started = Instant::now();
        let outcome = self.apply_inner(event).await;
        histogram!(APPLY_DURATION).record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn apply_inner(&self, event: &ScoreEvent) -> Outcome {
        let records = match self.record_store.acquire().await {
            Ok(handle) => handle,
            Err(e) => return Outcome::RecordStoreFailed(StoreError::ConnectionFailed(e.to_string())),
        };

        match records.insert(event).await {
            Ok(record) => {
                debug!(
                    identity = %record.identity,
                    score = record.score,
                    recorded_at = %record.recorded_at,
                    "Score recorded"
                );
            }
            Err(e) => {
                warn!(identity = event.identity(), score = event.score(), error = %e, "Record insert failed");
                return Outcome::RecordStoreFailed(e);
            }
        }
        drop(records);

        let ranking = match self.ranking_store.acquire().await {
            Ok(handle) => handle,
            Err(e) => {
                return Outcome::RankingStoreFailed(StoreError::ConnectionFailed(e.to_string()));
            }
        };

        match ranking.set_if_greater(event.identity(), event.score()).await {
            Ok(true) => {
                info!(identity = event.identity(), score = event.score(), "Ranking raised to new best score");
                counter!(RANKING_UPDATED).increment(1);
                Outcome::Committed {
                    ranking_updated: true,
                }
            }
            Ok(false) => {
                debug!(
                    identity = event.identity(),
                    score = event.score(),
                    "Score does not beat current best, ranking unchanged"
                );
                Outcome::Committed {
                    ranking_updated: false,
                }
            }
            Err(e) => {
                warn!(identity = event.identity(), score = event.score(), error = %e, "Ranking update failed");
                Outcome::RankingStoreFailed(e)
            }
        }
    }
}
