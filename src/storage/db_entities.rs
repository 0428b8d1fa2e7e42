//! SeaORM entity model used by the database storage backend.
//!
//! Maps to the `session_history` table created by `database_storage`.
//! Timestamps are RFC3339 strings and the status is its display form.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session_history")]
pub struct Model {
    /// Session UUID as string
    #[sea_orm(primary_key, auto_increment = false)]
    pub session_id: String,
    pub provider_id: String,
    pub service_type: String,
    pub provider_country: String,
    /// RFC3339 start timestamp
    pub started: String,
    /// "New" or "Completed"
    pub status: String,
    /// Optional RFC3339 completion timestamp
    pub updated: Option<String>,
    pub bytes_sent: i64,
    pub bytes_received: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
