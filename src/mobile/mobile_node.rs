use log::{error, info};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use super::identity::IdentitySelector;
use crate::configuration::types::ProviderConfig;
use crate::connection::connection_manager::ConnectionManager;
use crate::connection::credentials::{SignatureCredentialProvider, SignerFactory};
use crate::connection::engine::{NativeEngine, TunnelSetup};
use crate::connection::event_bus::EventBus;
use crate::connection::factory::{EngineSettings, MobileConnectionFactory};
use crate::connection::profile::OpenvpnProfileBuilder;
use crate::connection::registry::ConnectionRegistry;
use crate::connection::tracker::SessionTracker;
use crate::connection::types::ConnectionState;
use crate::error_handling::types::ConnectionError;
use crate::service_management::control::ServiceControl;
use crate::service_management::types::{Proposal, ServiceRequest, ServiceState};

/// Process-level entry points used by the mobile host application.
///
/// Provider mode goes through the [`ServiceControl`] like the HTTP API does.
/// Consumer mode goes through a [`ConnectionManager`] over the shared
/// connection registry and event bus.
pub struct MobileNode {
    control: Arc<ServiceControl>,
    identities: Arc<dyn IdentitySelector>,
    provider: ProviderConfig,
    engine_settings: EngineSettings,
    connections: Arc<ConnectionRegistry>,
    bus: Arc<EventBus>,
    consumer: ConnectionManager,
    tracker: OnceLock<Arc<SessionTracker>>,
}

impl MobileNode {
    pub fn new(
        control: Arc<ServiceControl>,
        identities: Arc<dyn IdentitySelector>,
        provider: ProviderConfig,
        engine_settings: EngineSettings,
        connections: Arc<ConnectionRegistry>,
        bus: Arc<EventBus>,
    ) -> Self {
        let consumer = ConnectionManager::new(connections.clone(), bus.clone());
        Self {
            control,
            identities,
            provider,
            engine_settings,
            connections,
            bus,
            consumer,
            tracker: OnceLock::new(),
        }
    }

    /// Starts every configured service type, stopping at the first failure.
    pub async fn start_provider(&self) {
        let identity = match self.identities.use_or_create(
            &self.provider.identity,
            &self.provider.passphrase,
            self.provider.chain_id,
        ) {
            Ok(identity) => identity,
            Err(e) => {
                error!("Unable to unlock provider identity: {}", e);
                return;
            }
        };
        info!("Unlocked identity: {}", identity.address);

        for service_type in self.provider.service_types() {
            let request = ServiceRequest {
                provider_id: identity.address.clone(),
                passphrase: self.provider.passphrase.clone(),
                service_type: service_type.clone(),
                options: None,
            };
            if let Err(e) = self.control.start(request).await {
                error!("Failed to start {} service: {}", service_type, e);
                return;
            }
        }
    }

    /// Stops every running service, stopping at the first failure.
    pub async fn stop_provider(&self) {
        let mut running: Vec<String> = self
            .control
            .list()
            .into_iter()
            .filter(|(_, instance)| instance.state == ServiceState::Running)
            .map(|(id, _)| id)
            .collect();
        running.sort();

        for id in running {
            if let Err(e) = self.control.stop(&id).await {
                error!("Failed to stop service {}: {}", id, e);
                return;
            }
        }
    }

    /// Routes OpenVPN connections through the native engine of the host.
    ///
    /// The returned tracker lets the host reconnect the active session, for
    /// instance after a network change. Calling this again replaces the
    /// factory but keeps the same tracker.
    pub fn override_openvpn_connection(
        &self,
        engine: Arc<dyn NativeEngine>,
        tunnel_setup: Arc<dyn TunnelSetup>,
        signer_factory: SignerFactory,
    ) -> Arc<SessionTracker> {
        let tracker = self
            .tracker
            .get_or_init(|| {
                let tracker = Arc::new(SessionTracker::new());
                self.bus.subscribe(tracker.clone());
                tracker
            })
            .clone();

        let factory = MobileConnectionFactory::new(
            engine,
            tunnel_setup,
            tracker.clone(),
            Arc::new(OpenvpnProfileBuilder),
            Arc::new(SignatureCredentialProvider),
            signer_factory,
            self.engine_settings.clone(),
        );
        self.connections.register("openvpn", Arc::new(factory));
        tracker
    }

    pub async fn connect(
        &self,
        consumer_id: &str,
        proposal: Proposal,
        session_config: serde_json::Value,
    ) -> Result<Uuid, ConnectionError> {
        self.consumer
            .connect(consumer_id, proposal, session_config)
            .await
    }

    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.consumer.disconnect().await
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.consumer.status()
    }
}
