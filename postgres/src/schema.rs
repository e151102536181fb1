//! Table definitions.
//!
//! The worker never migrates: these statements exist for local setup and
//! integration tests. Every statement is idempotent.

use scoreboard_core::store::StoreError;
use sqlx::PgPool;

/// Append-only score history.
pub const SCORES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS scores (
    id BIGSERIAL PRIMARY KEY,
    user_email TEXT NOT NULL,
    score BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

/// Lookup index for per-identity history.
pub const SCORES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_scores_user_email ON scores(user_email, created_at)";

/// Dead-lettered queue messages.
pub const FAILED_SCORE_MESSAGES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS failed_score_messages (
    id BIGSERIAL PRIMARY KEY,
    queue TEXT NOT NULL,
    queue_partition INTEGER NOT NULL,
    queue_offset BIGINT NOT NULL,
    payload BYTEA NOT NULL,
    error_message TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    failed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    status TEXT NOT NULL DEFAULT 'pending',
    resolved_at TIMESTAMPTZ,
    resolution_notes TEXT
)";

/// Index for pending-first listing.
pub const FAILED_SCORE_MESSAGES_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_failed_score_messages_status \
     ON failed_score_messages(status, failed_at)";

/// Create every table the worker touches, if missing.
///
/// # Errors
///
/// Returns [`StoreError`] if any statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    for statement in [
        SCORES_TABLE,
        SCORES_INDEX,
        FAILED_SCORE_MESSAGES_TABLE,
        FAILED_SCORE_MESSAGES_INDEX,
    ] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| crate::store_error(&e))?;
    }
    tracing::debug!("Score schema ensured");
    Ok(())
}
