use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, Database, DatabaseConnection, EntityTrait, QueryOrder,
    Schema,
};
use uuid::Uuid;

use crate::connection::types::SessionStatistics;
use crate::error_handling::types::StorageError;
use crate::history::types::History;
use crate::storage::db_entities::{ActiveModel, Column, Entity, Model};
use crate::storage::storage_trait::HistoryStorage;

fn parse_time(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            error!("Invalid timestamp {:?}: {}", value, e);
            StorageError::ReadFailed
        })
}

impl TryFrom<Model> for History {
    type Error = StorageError;

    fn try_from(row: Model) -> Result<Self, Self::Error> {
        Ok(History {
            session_id: Uuid::parse_str(&row.session_id).map_err(|_| StorageError::ReadFailed)?,
            provider_id: row.provider_id,
            service_type: row.service_type,
            provider_country: row.provider_country,
            started: parse_time(&row.started)?,
            status: row.status.parse().map_err(|e| {
                error!("{}", e);
                StorageError::ReadFailed
            })?,
            updated: row.updated.as_deref().map(parse_time).transpose()?,
            data_stats: SessionStatistics {
                bytes_sent: row.bytes_sent.max(0) as u64,
                bytes_received: row.bytes_received.max(0) as u64,
            },
        })
    }
}

impl From<&History> for ActiveModel {
    fn from(record: &History) -> Self {
        ActiveModel {
            session_id: Set(record.session_id.to_string()),
            provider_id: Set(record.provider_id.clone()),
            service_type: Set(record.service_type.clone()),
            provider_country: Set(record.provider_country.clone()),
            started: Set(record.started.to_rfc3339()),
            status: Set(record.status.to_string()),
            updated: Set(record.updated.map(|d| d.to_rfc3339())),
            bytes_sent: Set(record.data_stats.bytes_sent as i64),
            bytes_received: Set(record.data_stats.bytes_received as i64),
        }
    }
}

/// SQLite-backed history storage.
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    /// Default database filename inside the storage directory
    pub const DEFAULT_DB_FILE: &'static str = "veil.sqlite3";

    /// Opens (creating if needed) the database file and its schema.
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create {}: {}", parent.display(), e);
                StorageError::WriteFailed
            })?;
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let db = Database::connect(url.as_str()).await.map_err(|e| {
            error!("Failed to open database {}: {}", path.display(), e);
            StorageError::ConnectionFailed
        })?;

        let backend = db.get_database_backend();
        let mut table = Schema::new(backend).create_table_from_entity(Entity);
        table.if_not_exists();
        db.execute(backend.build(&table)).await.map_err(|e| {
            error!("Failed to create session_history table: {}", e);
            StorageError::WriteFailed
        })?;

        info!("DatabaseStorage initialized at {}", path.display());
        Ok(Self { db })
    }

    pub async fn in_dir<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        Self::connect(dir.as_ref().join(Self::DEFAULT_DB_FILE)).await
    }
}

#[async_trait]
impl HistoryStorage for DatabaseStorage {
    async fn save(&self, record: &History) -> Result<(), StorageError> {
        Entity::insert(ActiveModel::from(record))
            .on_conflict(
                OnConflict::column(Column::SessionId)
                    .update_columns([
                        Column::ProviderId,
                        Column::ServiceType,
                        Column::ProviderCountry,
                        Column::Started,
                        Column::Status,
                        Column::Updated,
                        Column::BytesSent,
                        Column::BytesReceived,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to save history {}: {}", record.session_id, e);
                StorageError::WriteFailed
            })?;
        debug!("Saved history {}", record.session_id);
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<History, StorageError> {
        let row = Entity::find_by_id(session_id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to load history {}: {}", session_id, e);
                StorageError::ReadFailed
            })?
            .ok_or(StorageError::NotFound)?;
        History::try_from(row)
    }

    async fn list(&self) -> Result<Vec<History>, StorageError> {
        let rows = Entity::find()
            .order_by_asc(Column::Started)
            .all(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to list history: {}", e);
                StorageError::ReadFailed
            })?;
        rows.into_iter().map(History::try_from).collect()
    }
}
