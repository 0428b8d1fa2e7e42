//! Seams to the native tunnel engine.
//!
//! The engine itself (tunnel protocol, crypto, packet I/O) lives outside this
//! crate. It is consumed through [`NativeEngine`], which builds
//! [`NativeSession`]s, and it reports back through [`EngineCallbacks`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::error_handling::types::EngineError;

/// Named lifecycle event pushed by the engine (e.g. `"CONNECTED"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub name: String,
    pub info: String,
    pub error: bool,
}

impl EngineEvent {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            info: String::new(),
            error: false,
        }
    }
}

/// Raw traffic counters as sampled by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatistics {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Push interface the engine calls into. Implementations must not block.
pub trait EngineCallbacks: Send + Sync {
    fn on_event(&self, event: EngineEvent);
    fn on_stats(&self, stats: EngineStatistics);
    fn log(&self, text: &str);
}

/// Platform tunnel I/O provided by the host OS (e.g. Android `VpnService`).
pub trait TunnelSetup: Send + Sync {
    /// Excludes `socket` from the tunnel so engine traffic does not loop.
    fn protect(&self, socket: i32) -> bool;
    /// Creates the tunnel interface and returns its file descriptor.
    fn establish(&self) -> Result<i32, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub profile: String,
    pub gui_version: String,
    pub compression_mode: String,
    /// Seconds before giving up on a connection; 0 retries forever.
    pub conn_timeout: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

#[async_trait]
pub trait NativeSession: Send + Sync {
    fn start(&self) -> Result<(), EngineError>;
    fn stop(&self);
    /// Resolves when the session has ended, with its terminal error if any.
    async fn wait(&self) -> Result<(), EngineError>;
    fn reconnect(&self, after_seconds: u32) -> Result<(), EngineError>;
}

pub trait NativeEngine: Send + Sync {
    fn new_session(
        &self,
        config: EngineConfig,
        credentials: UserCredentials,
        callbacks: Arc<dyn EngineCallbacks>,
        tunnel_setup: Arc<dyn TunnelSetup>,
    ) -> Arc<dyn NativeSession>;
}
