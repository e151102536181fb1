use crate::record_store::PostgresRecordStore;
use scoreboard_core::connector::{Backend, ConnectError, Connector};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Builds [`PostgresRecordStore`] pools for the connection supervisor.
#[derive(Clone, Debug)]
pub struct PostgresConnector {
    database_url: String,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PostgresConnector {
    /// Connector for `database_url` with a pool of at most `max_connections`.
    #[must_use]
    pub fn new(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: max_connections.max(1),
            acquire_timeout: Duration::from_secs(5),
        }
    }

    /// How long a pool waits for a free connection before failing.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Connector for PostgresConnector {
    type Handle = PostgresRecordStore;

    fn backend(&self) -> Backend {
        Backend::RecordStore
    }

    async fn connect(&self) -> Result<PostgresRecordStore, ConnectError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await
            .map_err(|e| ConnectError::Unreachable {
                backend: Backend::RecordStore,
                reason: e.to_string(),
            })?;
        Ok(PostgresRecordStore::from_pool(pool))
    }

    async fn probe(&self, handle: &PostgresRecordStore) -> Result<(), ConnectError> {
        sqlx::query("SELECT 1")
            .execute(handle.pool())
            .await
            .map(|_| ())
            .map_err(|e| ConnectError::ProbeFailed {
                backend: Backend::RecordStore,
                reason: e.to_string(),
            })
    }
}
