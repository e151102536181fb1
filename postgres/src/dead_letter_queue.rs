//! Dead Letter Queue (DLQ) for poison score messages.
//!
//! Keeps the raw payload of messages that never decoded, with enough queue
//! coordinates to find them again, so an operator can inspect, fix and
//! replay or discard them.

use crate::store_error;
use scoreboard_core::dead_letter::{DeadLetter, DeadLetterStatus, DeadLetterStore};
use scoreboard_core::queue::Delivery;
use scoreboard_core::store::StoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

const SELECT_COLUMNS: &str = r"
    SELECT id, queue, queue_partition, queue_offset, payload,
           error_message, attempts, failed_at, status
    FROM failed_score_messages
";

/// `PostgreSQL`-backed Dead Letter Queue.
///
/// # Example
///
/// ```no_run
/// use scoreboard_postgres::PostgresDeadLetterQueue;
/// use scoreboard_core::dead_letter::DeadLetterStore;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let dlq = PostgresDeadLetterQueue::new(pool);
///
/// for entry in dlq.list_pending(100).await? {
///     println!("{}/{}@{}: {}", entry.queue, entry.partition, entry.offset, entry.error_message);
///     dlq.mark_discarded(entry.id, "not a score message").await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresDeadLetterQueue {
    pool: PgPool,
}

impl PostgresDeadLetterQueue {
    /// Create a DLQ over the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a DLQ with its own single-connection pool that connects on
    /// first use, so startup never waits on the database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if `database_url` is invalid.
    pub fn connect_lazy(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy(database_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Mark an entry as resolved (replayed or fixed upstream).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn mark_resolved(&self, id: i64, notes: Option<&str>) -> Result<(), StoreError> {
        self.set_status(id, DeadLetterStatus::Resolved, notes).await?;
        tracing::info!(dlq_id = id, "DLQ entry marked as resolved");
        metrics::counter!("score_worker.dlq.resolved").increment(1);
        Ok(())
    }

    /// Mark an entry as permanently discarded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn mark_discarded(&self, id: i64, reason: &str) -> Result<(), StoreError> {
        self.set_status(id, DeadLetterStatus::Discarded, Some(reason))
            .await?;
        tracing::warn!(dlq_id = id, reason, "DLQ entry marked as discarded");
        metrics::counter!("score_worker.dlq.discarded").increment(1);
        Ok(())
    }

    /// Number of pending entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn count_pending(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM failed_score_messages WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| store_error(&e))?;
        Ok(count)
    }

    /// Fetch one entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueryFailed`] if no such entry exists.
    pub async fn get_by_id(&self, id: i64) -> Result<DeadLetter, StoreError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error(&e))?;
        Self::row_to_dead_letter(&row)
    }

    async fn set_status(
        &self,
        id: i64,
        status: DeadLetterStatus,
        notes: Option<&str>,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r"
            UPDATE failed_score_messages
            SET status = $1,
                resolved_at = NOW(),
                resolution_notes = $2
            WHERE id = $3
            ",
        )
        .bind(status.as_str())
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error(&e))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::QueryFailed(format!("No DLQ entry with id {id}")));
        }
        Ok(())
    }

    fn row_to_dead_letter(row: &sqlx::postgres::PgRow) -> Result<DeadLetter, StoreError> {
        let corrupt = |e: sqlx::Error| StoreError::CorruptData(e.to_string());
        let status: String = row.try_get("status").map_err(corrupt)?;

        Ok(DeadLetter {
            id: row.try_get("id").map_err(corrupt)?,
            queue: row.try_get("queue").map_err(corrupt)?,
            partition: row.try_get("queue_partition").map_err(corrupt)?,
            offset: row.try_get("queue_offset").map_err(corrupt)?,
            payload: row.try_get("payload").map_err(corrupt)?,
            error_message: row.try_get("error_message").map_err(corrupt)?,
            attempts: row.try_get("attempts").map_err(corrupt)?,
            failed_at: row.try_get("failed_at").map_err(corrupt)?,
            status: DeadLetterStatus::parse(&status)?,
        })
    }
}

impl DeadLetterStore for PostgresDeadLetterQueue {
    async fn add_entry(
        &self,
        delivery: &Delivery,
        error_message: &str,
        attempts: i32,
    ) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO failed_score_messages (
                queue, queue_partition, queue_offset, payload, error_message, attempts
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&delivery.id.queue)
        .bind(delivery.id.partition)
        .bind(delivery.id.offset)
        .bind(&delivery.payload)
        .bind(error_message)
        .bind(attempts)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error(&e))?;

        tracing::warn!(
            dlq_id = id,
            delivery = %delivery.id,
            error = error_message,
            attempts,
            "Message added to Dead Letter Queue"
        );
        metrics::counter!("score_worker.dlq.added").increment(1);

        Ok(id)
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<DeadLetter>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE status = 'pending' ORDER BY failed_at ASC, id ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error(&e))?;

        rows.iter().map(Self::row_to_dead_letter).collect()
    }
}
