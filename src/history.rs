//! Session history.
//!
//! [`HistoryRecorder`] listens on the event bus and keeps one [`History`]
//! record per consumer session in a [`HistoryStorage`] backend.
//!
//! [`HistoryStorage`]: crate::storage::storage_trait::HistoryStorage

pub mod recorder;
pub mod types;

pub use recorder::HistoryRecorder;
pub use types::{History, HistoryStatus};
