//! Append-only score history in `PostgreSQL`.

use crate::store_error;
use scoreboard_core::score::{ScoreEvent, ScoreRecord};
use scoreboard_core::store::{RecordStore, Result, StoreError};
use scoreboard_core::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// Record store over a shared connection pool.
///
/// Cloning shares the pool.
#[derive(Clone, Debug)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Connect a new pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionFailed`] if the database is unreachable.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RecordStore for PostgresRecordStore {
    async fn insert(&self, event: &ScoreEvent) -> Result<ScoreRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        let inserted = sqlx::query(
            r"
            INSERT INTO scores (user_email, score)
            VALUES ($1, $2)
            RETURNING created_at
            ",
        )
        .bind(event.identity())
        .bind(event.score())
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback after failed insert also failed");
                }
                return Err(store_error(&e));
            }
        };

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        let recorded_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| StoreError::CorruptData(e.to_string()))?;

        metrics::counter!("record_store.scores.inserted").increment(1);

        Ok(ScoreRecord {
            identity: event.identity().to_string(),
            score: event.score(),
            recorded_at,
        })
    }

    async fn history(&self, identity: &str) -> Result<Vec<ScoreRecord>> {
        let rows = sqlx::query(
            r"
            SELECT user_email, score, created_at
            FROM scores
            WHERE user_email = $1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error(&e))?;

        rows.iter()
            .map(|row| {
                Ok(ScoreRecord {
                    identity: row
                        .try_get("user_email")
                        .map_err(|e| StoreError::CorruptData(e.to_string()))?,
                    score: row
                        .try_get("score")
                        .map_err(|e| StoreError::CorruptData(e.to_string()))?,
                    recorded_at: row
                        .try_get("created_at")
                        .map_err(|e| StoreError::CorruptData(e.to_string()))?,
                })
            })
            .collect()
    }
}
