use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::connection::types::SessionStatistics;
use crate::error_handling::types::HistoryError;
use crate::service_management::types::Proposal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryStatus {
    New,
    Completed,
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryStatus::New => write!(f, "New"),
            HistoryStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for HistoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(HistoryStatus::New),
            "Completed" => Ok(HistoryStatus::Completed),
            other => Err(format!("unknown history status: {}", other)),
        }
    }
}

/// Persisted record of one consumer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub session_id: Uuid,
    pub provider_id: String,
    pub service_type: String,
    pub provider_country: String,
    pub started: DateTime<Utc>,
    pub status: HistoryStatus,
    pub updated: Option<DateTime<Utc>>,
    pub data_stats: SessionStatistics,
}

impl History {
    pub fn new(session_id: Uuid, proposal: &Proposal) -> Self {
        Self::new_at(session_id, proposal, Utc::now())
    }

    pub(crate) fn new_at(session_id: Uuid, proposal: &Proposal, started: DateTime<Utc>) -> Self {
        Self {
            session_id,
            provider_id: proposal.provider_id.clone(),
            service_type: proposal.service_type.clone(),
            provider_country: proposal.location.country.clone(),
            started,
            status: HistoryStatus::New,
            updated: None,
            data_stats: SessionStatistics::default(),
        }
    }

    /// Marks the session finished with its final traffic counters.
    ///
    /// A record completes once; later calls fail and leave it untouched.
    pub fn complete(&mut self, stats: SessionStatistics) -> Result<(), HistoryError> {
        self.complete_at(stats, Utc::now())
    }

    pub(crate) fn complete_at(
        &mut self,
        stats: SessionStatistics,
        at: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
        if self.status == HistoryStatus::Completed {
            return Err(HistoryError::AlreadyCompleted(self.session_id.to_string()));
        }
        self.status = HistoryStatus::Completed;
        self.updated = Some(at);
        self.data_stats = stats;
        Ok(())
    }

    /// Whole seconds between start and completion; 0 while the session is open.
    pub fn duration(&self) -> u64 {
        match (self.status, self.updated) {
            (HistoryStatus::Completed, Some(updated)) => {
                (updated - self.started).num_seconds().max(0) as u64
            }
            _ => 0,
        }
    }
}
