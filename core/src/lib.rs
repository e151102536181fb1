//! # Scoreboard Core
//!
//! Core types and traits for the score-ingestion worker.
//!
//! The worker reads score submissions from a durable queue and applies each
//! one to two independently failing backends:
//!
//! ```text
//! ┌─────────────┐
//! │ Score queue │
//! └──────┬──────┘
//!        │ decode
//!        ▼
//! ┌─────────────────┐
//! │ 1. Record store │◄─── Source of truth (append-only)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 2. Ranking      │◄─── Derived view (best score per identity)
//! └────────┬────────┘
//!          │
//!          ▼
//!    ack / requeue / dead-letter
//! ```
//!
//! This crate holds only the pieces without I/O:
//!
//! - [`score`]: `ScoreEvent`, `ScoreRecord`, `RankingEntry`
//! - [`decode`]: payload validation and parsing
//! - [`store`], [`queue`], [`dead_letter`]: backend traits
//! - [`connector`]: how backend handles are built and probed
//! - [`ack`]: outcomes and the acknowledgment policy

pub use chrono::{DateTime, Utc};

pub mod ack;
pub mod connector;
pub mod dead_letter;
pub mod decode;
pub mod queue;
pub mod score;
pub mod store;

pub use ack::{AckDecision, AckPolicy, Outcome};
pub use connector::{Backend, ConnectError, Connector};
pub use decode::{DecodeError, decode};
pub use queue::{Delivery, DeliveryId, QueueError, ScoreQueue};
pub use score::{RankingEntry, ScoreEvent, ScoreRecord};
pub use store::{RANKING_FLOOR, RankingStore, RecordStore, StoreError};
