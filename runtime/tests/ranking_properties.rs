//! Property tests for the keep-the-maximum ranking rule, run through the
//! dual-write coordinator.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use scoreboard_core::{RANKING_FLOOR, ScoreEvent};
use scoreboard_core::ack::{AckDecision, AckPolicy, Outcome};
use scoreboard_core::connector::Backend;
use scoreboard_runtime::DualWriteCoordinator;
use scoreboard_runtime::retry::RetryPolicy;
use scoreboard_runtime::supervisor::Supervised;
use scoreboard_testing::{InMemoryConnector, InMemoryRankingStore, InMemoryRecordStore};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    records: InMemoryRecordStore,
    ranking: InMemoryRankingStore,
    coordinator: DualWriteCoordinator<
        InMemoryConnector<InMemoryRecordStore>,
        InMemoryConnector<InMemoryRankingStore>,
    >,
}

fn fixture() -> Fixture {
    let records = InMemoryRecordStore::new();
    let ranking = InMemoryRankingStore::new();
    let policy = RetryPolicy::fixed(Duration::from_millis(1));
    let coordinator = DualWriteCoordinator::new(
        Arc::new(Supervised::new(
            InMemoryConnector::new(Backend::RecordStore, records.clone()),
            policy.clone(),
        )),
        Arc::new(Supervised::new(
            InMemoryConnector::new(Backend::RankingStore, ranking.clone()),
            policy,
        )),
    );
    Fixture {
        records,
        ranking,
        coordinator,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

proptest! {
    #[test]
    fn ranking_equals_max_of_applied_scores(scores in prop::collection::vec(any::<i64>(), 1..40)) {
        let f = fixture();
        let policy = AckPolicy::default();

        runtime().block_on(async {
            let mut best: Option<i64> = None;
            for score in &scores {
                let event = ScoreEvent::new("a@x.com", *score).unwrap();
                let outcome = f.coordinator.apply(&event).await;
                prop_assert_eq!(policy.decide(&outcome), AckDecision::Ack);

                // Absent entries compare as the floor; a first floor score
                // still creates the entry.
                let raised = match best {
                    None => *score >= RANKING_FLOOR,
                    Some(b) => *score > b,
                };
                prop_assert_eq!(outcome, Outcome::Committed { ranking_updated: raised });
                if raised {
                    best = Some(*score);
                }

                // Never decreases.
                prop_assert_eq!(f.ranking.entry("a@x.com"), best);
            }
            Ok(())
        })?;

        let expected = scores.iter().copied().filter(|s| *s >= RANKING_FLOOR).max();
        prop_assert_eq!(f.ranking.entry("a@x.com"), expected);
        prop_assert_eq!(f.records.scores_for("a@x.com"), scores);
    }

    #[test]
    fn reapplying_an_event_is_idempotent_for_ranking(score in RANKING_FLOOR..=i64::MAX) {
        let f = fixture();
        let event = ScoreEvent::new("a@x.com", score).unwrap();

        runtime().block_on(async {
            f.coordinator.apply(&event).await;
            let outcome = f.coordinator.apply(&event).await;
            prop_assert_eq!(outcome, Outcome::Committed { ranking_updated: false });
            Ok(())
        })?;

        prop_assert_eq!(f.ranking.entry("a@x.com"), Some(score));
        prop_assert_eq!(f.ranking.writes().len(), 1);
        prop_assert_eq!(f.records.len(), 2);
    }

    #[test]
    fn scores_below_floor_are_recorded_but_never_ranked(score in i64::MIN..RANKING_FLOOR) {
        let f = fixture();
        let event = ScoreEvent::new("a@x.com", score).unwrap();

        runtime().block_on(async {
            let outcome = f.coordinator.apply(&event).await;
            prop_assert_eq!(outcome, Outcome::Committed { ranking_updated: false });
            Ok(())
        })?;

        prop_assert_eq!(f.ranking.entry("a@x.com"), None);
        prop_assert_eq!(f.records.scores_for("a@x.com"), vec![score]);
    }
}
