//! Failure injection for in-memory backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const ALWAYS: usize = usize::MAX;

/// Shared switch that makes the next N operations (or all of them) fail.
///
/// Clones share state, so a test can keep one clone and flip the switch
/// while the worker holds another.
///
/// # Example
///
/// ```
/// use scoreboard_testing::FailureSwitch;
///
/// let switch = FailureSwitch::new();
/// switch.fail_next(1);
/// assert!(switch.trip());
/// assert!(!switch.trip());
/// ```
#[derive(Clone, Debug, Default)]
pub struct FailureSwitch {
    remaining: Arc<AtomicUsize>,
}

impl FailureSwitch {
    /// A switch that never fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` operations, then recover.
    pub fn fail_next(&self, n: usize) {
        self.remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every operation until [`heal`](Self::heal) is called.
    pub fn fail_always(&self) {
        self.remaining.store(ALWAYS, Ordering::SeqCst);
    }

    /// Stop failing.
    pub fn heal(&self) {
        self.remaining.store(0, Ordering::SeqCst);
    }

    /// Whether the switch is currently set to fail.
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.remaining.load(Ordering::SeqCst) > 0
    }

    /// Consume one operation: returns `true` if it must fail.
    pub fn trip(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                ALWAYS => Some(ALWAYS),
                n => Some(n - 1),
            })
            .is_ok()
    }
}
