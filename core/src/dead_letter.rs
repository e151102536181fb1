//! Dead-letter path for messages that can never be processed.
//!
//! A payload that keeps failing to decode is diverted here after a bounded
//! number of attempts instead of being requeued forever.

use crate::queue::Delivery;
use crate::store::StoreError;
use crate::{DateTime, Utc};
use std::future::Future;

/// Status of a dead-lettered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterStatus {
    /// Waiting for investigation
    Pending,
    /// Fixed and replayed by an operator
    Resolved,
    /// Permanently dropped
    Discarded,
}

impl DeadLetterStatus {
    /// Convert status to its stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }

    /// Parse status from its stored string form.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptData`] for an unknown status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "discarded" => Ok(Self::Discarded),
            _ => Err(StoreError::CorruptData(format!(
                "Invalid dead-letter status: {s}"
            ))),
        }
    }
}

/// A message diverted to the dead-letter store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Store-assigned id
    pub id: i64,
    /// Queue the message came from
    pub queue: String,
    /// Partition it was read from
    pub partition: i32,
    /// Offset it was read from
    pub offset: i64,
    /// Raw message body, unchanged
    pub payload: Vec<u8>,
    /// Last error seen for this message
    pub error_message: String,
    /// How many times the message was attempted
    pub attempts: i32,
    /// When it was dead-lettered
    pub failed_at: DateTime<Utc>,
    /// Current status
    pub status: DeadLetterStatus,
}

/// Storage for dead-lettered messages.
pub trait DeadLetterStore: Send + Sync {
    /// Record `delivery` as permanently failed.
    ///
    /// Returns the id of the new entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn add_entry(
        &self,
        delivery: &Delivery,
        error_message: &str,
        attempts: i32,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Pending entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn list_pending(&self, limit: usize)
    -> impl Future<Output = Result<Vec<DeadLetter>, StoreError>> + Send;
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            DeadLetterStatus::Pending,
            DeadLetterStatus::Resolved,
            DeadLetterStatus::Discarded,
        ] {
            let parsed = DeadLetterStatus::parse(status.as_str()).expect("known status");
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn unknown_status_is_corrupt() {
        assert!(matches!(
            DeadLetterStatus::parse("processing"),
            Err(StoreError::CorruptData(_))
        ));
    }
}
