//! History storage trait
//!
//! Backends persist one [`History`] record per session, keyed by session id.
//! Saving an existing id replaces the stored record.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::history::types::History;

#[async_trait]
pub trait HistoryStorage: Send + Sync {
    /// Inserts or replaces the record for `record.session_id`.
    async fn save(&self, record: &History) -> Result<(), StorageError>;

    /// Returns the record of `session_id`, or `StorageError::NotFound`.
    async fn get(&self, session_id: Uuid) -> Result<History, StorageError>;

    /// Returns every stored record, oldest first.
    async fn list(&self) -> Result<Vec<History>, StorageError>;
}
