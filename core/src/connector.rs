//! Backend connection factories.
//!
//! A [`Connector`] knows how to build a fresh handle to one backend and how
//! to check that an existing handle still works. The connection supervisor
//! in `scoreboard-runtime` owns the handles; everything else borrows a clone
//! for the span of one operation.

use std::fmt;
use std::future::Future;
use thiserror::Error;

/// The three external systems the worker depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Message broker holding the score queue
    Queue,
    /// Relational system of record
    RecordStore,
    /// Leaderboard ranking structure
    RankingStore,
}

impl Backend {
    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::RecordStore => "record_store",
            Self::RankingStore => "ranking_store",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to establish or verify a backend connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// A connect attempt failed
    #[error("Could not connect to {backend}: {reason}")]
    Unreachable {
        /// The backend that failed
        backend: Backend,
        /// The reason for failure
        reason: String,
    },

    /// A liveness probe on an existing handle failed
    #[error("Liveness probe failed for {backend}: {reason}")]
    ProbeFailed {
        /// The backend that failed
        backend: Backend,
        /// The reason for failure
        reason: String,
    },

    /// A bounded retry policy ran out of attempts
    #[error("Gave up connecting to {backend} after {attempts} attempts")]
    Exhausted {
        /// The backend that failed
        backend: Backend,
        /// Connect attempts made
        attempts: usize,
    },
}

/// Builds and verifies handles for one backend.
pub trait Connector: Send + Sync {
    /// Cheap-to-clone handle type (pool, connection manager, `Arc`).
    type Handle: Clone + Send + Sync + 'static;

    /// Which backend this connector targets.
    fn backend(&self) -> Backend;

    /// Establish a new handle.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Unreachable`] if the backend cannot be reached.
    fn connect(&self) -> impl Future<Output = Result<Self::Handle, ConnectError>> + Send;

    /// Lightweight liveness check (ping-equivalent) on an existing handle.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::ProbeFailed`] if the handle is no longer usable.
    fn probe(&self, handle: &Self::Handle) -> impl Future<Output = Result<(), ConnectError>> + Send;
}
