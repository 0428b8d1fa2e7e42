//! Storage subsystem
//!
//! Persistence for session history records.
//!
//! Components:
//! - `storage_trait`: the `HistoryStorage` trait shared by all backends.
//! - `file_storage`: one JSON file per session, easy to inspect by hand.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `db_entities`: SeaORM entity model for the database backend.

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod storage_trait;

pub use database_storage::DatabaseStorage;
pub use file_storage::FileStorage;
pub use storage_trait::HistoryStorage;
