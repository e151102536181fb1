//! Connection supervision for the worker's three backends.
//!
//! Each backend gets its own [`Supervised`] slot. A slot owns the live handle,
//! probes it before lending it out, and rebuilds it with the
//! [`RetryPolicy`] when the probe fails or the handle was invalidated.
//! Slots are locked independently, so a broker outage never delays a
//! reconnect to the record store or the ranking store.
//!
//! ```text
//!               ┌──────────────────────────┐
//!   acquire ──► │ cached handle?           │
//!               │   yes ─► probe ─ ok ─────┼──► clone of handle
//!               │            └─ fail ─┐    │
//!               │   no ───────────────┴──► │ connect, retry every interval
//!               └──────────────────────────┘
//! ```

use crate::metrics::{CONNECT_FAILURES, RECONNECTS, counter};
use crate::retry::{RetryPolicy, retry_with_backoff};
use scoreboard_core::connector::{Backend, ConnectError, Connector};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Owner of one backend's live handle.
pub struct Supervised<C: Connector> {
    connector: C,
    policy: RetryPolicy,
    slot: Mutex<Option<C::Handle>>,
}

impl<C: Connector> Supervised<C> {
    /// Create a slot that connects lazily on first [`acquire`](Self::acquire).
    #[must_use]
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        Self {
            connector,
            policy,
            slot: Mutex::new(None),
        }
    }

    /// Backend served by this slot.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.connector.backend()
    }

    /// Retry policy used when (re)connecting.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Borrow a usable handle, connecting or reconnecting as needed.
    ///
    /// A cached handle is probed first; a failed probe is treated like a
    /// missing handle. The returned clone must not outlive the operation it
    /// was acquired for.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Exhausted`] only when the retry policy is
    /// bounded and every attempt failed. With the default policy this
    /// waits until the backend is reachable.
    pub async fn acquire(&self) -> Result<C::Handle, ConnectError> {
        let mut slot = self.slot.lock().await;

        if let Some(handle) = slot.as_ref() {
            match self.connector.probe(handle).await {
                Ok(()) => return Ok(handle.clone()),
                Err(e) => {
                    warn!(backend = %self.backend(), error = %e, "Cached handle failed probe, rebuilding");
                    *slot = None;
                }
            }
        }

        let handle = self.connect_with_retry().await?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Drop the cached handle so the next [`acquire`](Self::acquire)
    /// rebuilds it.
    pub async fn invalidate(&self) {
        if self.slot.lock().await.take().is_some() {
            info!(backend = %self.backend(), "Handle invalidated");
        }
    }

    /// Whether a handle is currently cached. Does not probe it.
    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    async fn connect_with_retry(&self) -> Result<C::Handle, ConnectError> {
        let backend = self.backend();
        let attempts = AtomicUsize::new(0);

        let result = retry_with_backoff(&self.policy, || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            info!(backend = %backend, attempt, "Connecting");
            async move {
                let result = self.connector.connect().await;
                if result.is_err() {
                    counter!(CONNECT_FAILURES, "backend" => backend.as_str()).increment(1);
                }
                result
            }
        })
        .await;

        match result {
            Ok(handle) => {
                info!(backend = %backend, "Connected");
                counter!(RECONNECTS, "backend" => backend.as_str()).increment(1);
                Ok(handle)
            }
            Err(_) => Err(ConnectError::Exhausted {
                backend,
                attempts: attempts.load(Ordering::Relaxed),
            }),
        }
    }
}

/// Sole owner of the queue, record-store and ranking-store handles.
///
/// Passed by reference (via `Arc`) to every component that touches a
/// backend.
pub struct ConnectionSupervisor<Q: Connector, R: Connector, K: Connector> {
    queue: Arc<Supervised<Q>>,
    record_store: Arc<Supervised<R>>,
    ranking_store: Arc<Supervised<K>>,
}

impl<Q: Connector, R: Connector, K: Connector> ConnectionSupervisor<Q, R, K> {
    /// Supervise three connectors, all under the same retry policy.
    #[must_use]
    pub fn new(queue: Q, record_store: R, ranking_store: K, policy: &RetryPolicy) -> Self {
        Self {
            queue: Arc::new(Supervised::new(queue, policy.clone())),
            record_store: Arc::new(Supervised::new(record_store, policy.clone())),
            ranking_store: Arc::new(Supervised::new(ranking_store, policy.clone())),
        }
    }

    /// Slot for the message broker.
    #[must_use]
    pub fn queue(&self) -> &Arc<Supervised<Q>> {
        &self.queue
    }

    /// Slot for the record store.
    #[must_use]
    pub fn record_store(&self) -> &Arc<Supervised<R>> {
        &self.record_store
    }

    /// Slot for the ranking store.
    #[must_use]
    pub fn ranking_store(&self) -> &Arc<Supervised<K>> {
        &self.ranking_store
    }

    /// Mark `backend`'s handle unusable.
    pub async fn invalidate(&self, backend: Backend) {
        match backend {
            Backend::Queue => self.queue.invalidate().await,
            Backend::RecordStore => self.record_store.invalidate().await,
            Backend::RankingStore => self.ranking_store.invalidate().await,
        }
    }

    /// Eagerly connect all three backends, concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConnectError`] if a bounded policy gives up.
    pub async fn connect_all(&self) -> Result<(), ConnectError> {
        let (queue, record_store, ranking_store) = tokio::join!(
            self.queue.acquire(),
            self.record_store.acquire(),
            self.ranking_store.acquire(),
        );
        queue?;
        record_store?;
        ranking_store?;
        Ok(())
    }
}
