//! `PostgreSQL` backends for the score worker.
//!
//! - [`PostgresRecordStore`]: append-only `scores` table, one transaction per
//!   insert
//! - [`PostgresConnector`]: builds pools for the connection supervisor
//! - [`PostgresDeadLetterQueue`]: `failed_score_messages` table for poison
//!   messages
//!
//! # Example
//!
//! ```no_run
//! use scoreboard_core::{RecordStore, ScoreEvent};
//! use scoreboard_postgres::PostgresRecordStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresRecordStore::new("postgres://localhost/scoreboard").await?;
//! let event = ScoreEvent::new("a@x.com", 42).ok_or("empty identity")?;
//! let record = store.insert(&event).await?;
//! println!("recorded at {}", record.recorded_at);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod connector;
mod dead_letter_queue;
mod record_store;
pub mod schema;

pub use connector::PostgresConnector;
pub use dead_letter_queue::PostgresDeadLetterQueue;
pub use record_store::PostgresRecordStore;

use scoreboard_core::store::StoreError;

/// Classify a sqlx error: lost connectivity versus a rejected statement.
pub(crate) fn store_error(e: &sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::ConnectionFailed(e.to_string()),
        _ => StoreError::QueryFailed(e.to_string()),
    }
}
