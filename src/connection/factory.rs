//! Connection factory backed by the native tunnel engine.

use async_trait::async_trait;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use super::credentials::{CredentialProvider, SignerFactory};
use super::engine::{EngineConfig, NativeEngine, NativeSession, TunnelSetup};
use super::event_adapter::EventAdapter;
use super::profile::ProfileBuilder;
use super::registry::{Connection, ConnectionFactory};
use super::tracker::SessionTracker;
use super::types::{ConnectOptions, ConnectionState, SessionStatistics};
use crate::error_handling::types::ConnectionError;

/// Engine tuning applied to every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub gui_version: String,
    pub compression_mode: String,
    /// 0 reconnects forever.
    pub conn_timeout: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            gui_version: format!("veil {}", env!("CARGO_PKG_VERSION")),
            compression_mode: "asym".to_string(),
            conn_timeout: 0,
        }
    }
}

pub struct MobileConnectionFactory {
    engine: Arc<dyn NativeEngine>,
    tunnel_setup: Arc<dyn TunnelSetup>,
    tracker: Arc<SessionTracker>,
    profiles: Arc<dyn ProfileBuilder>,
    credentials: Arc<dyn CredentialProvider>,
    signer_factory: SignerFactory,
    settings: EngineSettings,
}

impl MobileConnectionFactory {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        tunnel_setup: Arc<dyn TunnelSetup>,
        tracker: Arc<SessionTracker>,
        profiles: Arc<dyn ProfileBuilder>,
        credentials: Arc<dyn CredentialProvider>,
        signer_factory: SignerFactory,
        settings: EngineSettings,
    ) -> Self {
        Self {
            engine,
            tunnel_setup,
            tracker,
            profiles,
            credentials,
            signer_factory,
            settings,
        }
    }
}

impl ConnectionFactory for MobileConnectionFactory {
    fn create(
        &self,
        options: ConnectOptions,
        state_tx: UnboundedSender<ConnectionState>,
        statistics_tx: UnboundedSender<SessionStatistics>,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        let profile = self.profiles.build(&options.session_config)?;

        let signer = (self.signer_factory)(&options.consumer_id);
        let credentials = self
            .credentials
            .credentials(options.session_id, signer.as_ref())?;

        let config = EngineConfig {
            profile,
            gui_version: self.settings.gui_version.clone(),
            compression_mode: self.settings.compression_mode.clone(),
            conn_timeout: self.settings.conn_timeout,
        };
        let adapter = Arc::new(EventAdapter::new(state_tx, statistics_tx));
        let session =
            self.engine
                .new_session(config, credentials, adapter, self.tunnel_setup.clone());

        self.tracker.session_created(session.clone());
        info!("Native session created for {}", options.session_id);

        Ok(Box::new(NativeConnection::new(session)))
    }
}

/// [`Connection`] over a native engine session.
pub struct NativeConnection {
    session: Arc<dyn NativeSession>,
    started: AtomicBool,
}

impl NativeConnection {
    pub fn new(session: Arc<dyn NativeSession>) -> Self {
        Self {
            session,
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connection for NativeConnection {
    async fn start(&self) -> Result<(), ConnectionError> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Native session already started");
            return Ok(());
        }
        if let Err(e) = self.session.start() {
            self.started.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    async fn stop(&self) {
        self.session.stop();
    }

    async fn wait(&self) -> Result<(), ConnectionError> {
        self.session.wait().await?;
        Ok(())
    }
}
