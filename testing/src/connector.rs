//! Connector over an already-built in-memory backend.

use crate::failure::FailureSwitch;
use scoreboard_core::connector::{Backend, ConnectError, Connector};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out clones of one in-memory backend.
///
/// `connect_failures` makes connection attempts fail, `probe_failures` makes
/// a cached handle look dead. `connects` counts successful connections, which
/// is how tests observe a handle being rebuilt.
#[derive(Clone, Debug)]
pub struct InMemoryConnector<H> {
    backend: Backend,
    handle: H,
    connect_failures: FailureSwitch,
    probe_failures: FailureSwitch,
    connects: Arc<AtomicUsize>,
}

impl<H: Clone> InMemoryConnector<H> {
    /// Connector for `backend` that always yields `handle`.
    #[must_use]
    pub fn new(backend: Backend, handle: H) -> Self {
        Self {
            backend,
            handle,
            connect_failures: FailureSwitch::new(),
            probe_failures: FailureSwitch::new(),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The backend handed out on connect.
    #[must_use]
    pub const fn handle(&self) -> &H {
        &self.handle
    }

    /// Switch controlling connection attempts.
    #[must_use]
    pub const fn connect_failures(&self) -> &FailureSwitch {
        &self.connect_failures
    }

    /// Switch controlling liveness probes.
    #[must_use]
    pub const fn probe_failures(&self) -> &FailureSwitch {
        &self.probe_failures
    }

    /// Successful connections so far.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl<H> Connector for InMemoryConnector<H>
where
    H: Clone + Send + Sync + 'static,
{
    type Handle = H;

    fn backend(&self) -> Backend {
        self.backend
    }

    async fn connect(&self) -> Result<H, ConnectError> {
        if self.connect_failures.trip() {
            return Err(ConnectError::Unreachable {
                backend: self.backend,
                reason: "connection refused".to_string(),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.handle.clone())
    }

    async fn probe(&self, _handle: &H) -> Result<(), ConnectError> {
        if self.probe_failures.trip() {
            return Err(ConnectError::ProbeFailed {
                backend: self.backend,
                reason: "no pong".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn counts_successful_connects_only() {
        let connector = InMemoryConnector::new(Backend::RankingStore, 7_u8);
        connector.connect_failures().fail_next(2);

        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_err());
        assert_eq!(connector.connect().await.unwrap(), 7);
        assert_eq!(connector.connects(), 1);
    }
}
