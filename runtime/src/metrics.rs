//! Metric names and descriptions for the worker.
//!
//! Metrics go through the `metrics` facade. Installing an exporter is left
//! to the embedding binary; without one, recording is a no-op.

use metrics::{describe_counter, describe_histogram};

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Deliveries acknowledged after a committed dual write.
pub const MESSAGES_ACKED: &str = "score_worker_messages_acked_total";
/// Deliveries rejected and requeued.
pub const MESSAGES_REQUEUED: &str = "score_worker_messages_requeued_total";
/// Deliveries diverted to the dead-letter store.
pub const MESSAGES_DEAD_LETTERED: &str = "score_worker_messages_dead_lettered_total";
/// Ranking entries actually raised.
pub const RANKING_UPDATED: &str = "score_worker_ranking_updated_total";
/// Backend connections (re)established, labelled by `backend`.
pub const RECONNECTS: &str = "score_worker_reconnects_total";
/// Failed connect attempts, labelled by `backend`.
pub const CONNECT_FAILURES: &str = "score_worker_connect_failures_total";
/// Time spent applying one event to both stores.
pub const APPLY_DURATION: &str = "score_worker_apply_duration_seconds";

/// Register descriptions for every worker metric.
///
/// Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!(MESSAGES_ACKED, "Deliveries acknowledged after a committed dual write");
    describe_counter!(MESSAGES_REQUEUED, "Deliveries rejected and requeued");
    describe_counter!(
        MESSAGES_DEAD_LETTERED,
        "Deliveries diverted to the dead-letter store"
    );
    describe_counter!(RANKING_UPDATED, "Ranking entries raised to a new best score");
    describe_counter!(RECONNECTS, "Backend connections established or rebuilt");
    describe_counter!(CONNECT_FAILURES, "Failed backend connect attempts");
    describe_histogram!(APPLY_DURATION, "Time taken to apply one event to both stores");
}
