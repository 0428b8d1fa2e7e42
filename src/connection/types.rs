//! Common data types used across the connection subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::service_management::types::Proposal;

/// Lifecycle state of a tunnel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    NotConnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::NotConnected => "NotConnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
        };
        write!(f, "{}", s)
    }
}

/// Traffic counters sampled by the engine. Pushed, never pulled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Identity of the session a bus event belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub consumer_id: String,
    pub proposal: Proposal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateEvent {
    pub state: ConnectionState,
    pub session: SessionInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsEvent {
    pub stats: SessionStatistics,
    pub session: SessionInfo,
}

/// Everything published on the shared event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    State(StateEvent),
    Statistics(StatisticsEvent),
}

/// Input handed to a connection factory for one connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub consumer_id: String,
    pub session_id: Uuid,
    /// Negotiated, service-specific session configuration.
    pub session_config: serde_json::Value,
    pub proposal: Proposal,
}

impl ConnectOptions {
    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id,
            consumer_id: self.consumer_id.clone(),
            proposal: self.proposal.clone(),
        }
    }
}
