//! # Scoreboard Runtime
//!
//! Runtime for the score-ingestion worker.
//!
//! ## Core Components
//!
//! - **Connection Supervisor** ([`supervisor`]): owns the queue, record-store
//!   and ranking-store handles and rebuilds them with a [`retry::RetryPolicy`]
//! - **Dual-Write Coordinator** ([`coordinator`]): record store first, then
//!   the ranking store's keep-the-maximum rule
//! - **Consumption Loop** ([`consumer`]): one delivery at a time, settled by
//!   the acknowledgment policy from `scoreboard-core`
//!
//! ## Example
//!
//! ```ignore
//! use scoreboard_runtime::{ConnectionSupervisor, ScoreWorker, retry::RetryPolicy};
//! use scoreboard_core::AckPolicy;
//!
//! let supervisor = Arc::new(ConnectionSupervisor::new(
//!     queue_connector,
//!     record_connector,
//!     ranking_connector,
//!     &RetryPolicy::default(),
//! ));
//! let worker = ScoreWorker::new(supervisor, AckPolicy::default(), dead_letters);
//! worker.spawn(shutdown_rx).await?;
//! ```

/// Reconnect policy
pub mod retry;

/// Metric names for the worker
pub mod metrics;

pub mod consumer;
pub mod coordinator;
pub mod supervisor;

pub use consumer::{DeliveryTracker, ScoreWorker, WorkerState};
pub use coordinator::DualWriteCoordinator;
pub use supervisor::{ConnectionSupervisor, Supervised};
