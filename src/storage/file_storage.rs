use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::history::types::History;
use crate::storage::storage_trait::HistoryStorage;

/// Environment variable overriding the storage directory.
pub const STORAGE_DIR_ENV: &str = "VEIL_STORAGE_DIR";

/// One JSON file per session under `<base>/history`.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        let history_dir = base_path.join("history");
        fs::create_dir_all(&history_dir).map_err(|e| {
            error!("Failed to create history dir {}: {}", history_dir.display(), e);
            StorageError::WriteFailed
        })?;
        info!("FileStorage initialized at {}", base_path.display());
        Ok(Self { base_path })
    }

    /// Uses `VEIL_STORAGE_DIR` when set, otherwise `fallback`.
    pub fn new_default<P: AsRef<Path>>(fallback: P) -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var(STORAGE_DIR_ENV) {
            info!("Using FileStorage from {}: {}", STORAGE_DIR_ENV, dir);
            return Self::new(PathBuf::from(dir));
        }
        Self::new(fallback)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn history_dir(&self) -> PathBuf {
        self.base_path.join("history")
    }

    fn record_path(&self, session_id: Uuid) -> PathBuf {
        self.history_dir().join(format!("{}.json", session_id))
    }

    fn read_record(&self, path: &Path) -> Result<History, StorageError> {
        let mut content = String::new();
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut content))
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    return StorageError::NotFound;
                }
                error!("Failed to read history file {}: {}", path.display(), e);
                StorageError::ReadFailed
            })?;
        serde_json::from_str(&content).map_err(|e| {
            error!("Invalid history file {}: {}", path.display(), e);
            StorageError::ReadFailed
        })
    }
}

#[async_trait]
impl HistoryStorage for FileStorage {
    async fn save(&self, record: &History) -> Result<(), StorageError> {
        let path = self.record_path(record.session_id);
        let json = serde_json::to_string_pretty(record).map_err(|e| {
            error!("Failed to serialize history {}: {}", record.session_id, e);
            StorageError::WriteFailed
        })?;
        // write then rename
        let tmp = path.with_extension("json.tmp");
        File::create(&tmp)
            .and_then(|mut f| f.write_all(json.as_bytes()))
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| {
                error!("Failed to write history file {}: {}", path.display(), e);
                StorageError::WriteFailed
            })?;
        debug!("Saved history {} to {}", record.session_id, path.display());
        Ok(())
    }

    async fn get(&self, session_id: Uuid) -> Result<History, StorageError> {
        self.read_record(&self.record_path(session_id))
    }

    async fn list(&self) -> Result<Vec<History>, StorageError> {
        let dir = self.history_dir();
        let entries = fs::read_dir(&dir).map_err(|e| {
            error!("Failed to read history dir {}: {}", dir.display(), e);
            StorageError::ReadFailed
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                error!("Dir entry error: {}", e);
                StorageError::ReadFailed
            })?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        records.sort_by_key(|r| r.started);
        debug!("Loaded {} history record(s)", records.len());
        Ok(records)
    }
}
