use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::configuration::config::Config;
use crate::configuration::types::StorageBackend;
use crate::connection::event_bus::EventBus;
use crate::connection::factory::EngineSettings;
use crate::connection::registry::ConnectionRegistry;
use crate::error_handling::types::*;
use crate::history::recorder::HistoryRecorder;
use crate::mobile::identity::ConfiguredIdentitySelector;
use crate::mobile::mobile_node::MobileNode;
use crate::service_management::control::ServiceControl;
use crate::service_management::options::OptionsParsers;
use crate::service_management::registry::{NoopRunner, ServiceRegistry};
use crate::service_management::service_manager::ServiceManager;
use crate::storage::database_storage::DatabaseStorage;
use crate::storage::file_storage::FileStorage;
use crate::storage::storage_trait::HistoryStorage;
use crate::web_interface::web_server::WebServer;

/// Owns every long-lived component of the node and drives its lifetime.
pub struct Controller {
    config: Config,
    registry: Arc<ServiceManager>,
    control: Arc<ServiceControl>,
    storage: Arc<dyn HistoryStorage>,
    bus: Arc<EventBus>,
    node: Arc<MobileNode>,
    web: WebServer,
}

impl Controller {
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        let storage = open_storage(&config).await?;

        let bus = Arc::new(EventBus::new());
        bus.subscribe(Arc::new(HistoryRecorder::new(storage.clone())));

        // tunnel processes are owned by the host platform
        let registry = Arc::new(
            ServiceManager::new(config.location.clone())
                .with_runner("openvpn", Arc::new(NoopRunner))
                .with_runner("wireguard", Arc::new(NoopRunner))
                .with_runner("noop", Arc::new(NoopRunner)),
        );
        let control = Arc::new(ServiceControl::new(
            registry.clone(),
            OptionsParsers::with_defaults(),
        ));

        let node = Arc::new(MobileNode::new(
            control.clone(),
            Arc::new(ConfiguredIdentitySelector::new(
                &config.provider.identity,
                &config.provider.passphrase,
            )),
            config.provider.clone(),
            EngineSettings::from(&config.engine),
            Arc::new(ConnectionRegistry::new()),
            bus.clone(),
        ));
        let web = WebServer::new(control.clone());

        debug!("Controller initialized");
        Ok(Self {
            config,
            registry,
            control,
            storage,
            bus,
            node,
            web,
        })
    }

    /// Handle for the host application, e.g. to plug in its native engine.
    pub fn node(&self) -> Arc<MobileNode> {
        self.node.clone()
    }

    pub fn storage(&self) -> Arc<dyn HistoryStorage> {
        self.storage.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Serves the HTTP API until ctrl-c, then shuts the node down.
    pub async fn run(&self) -> Result<(), ControllerError> {
        if self.config.provider.autostart {
            info!("Autostarting provider services");
            self.node.start_provider().await;
        }

        let outcome = tokio::select! {
            res = self.web.start(&self.config.api.bind_address, self.config.api.port) => {
                res.map_err(ControllerError::from)
            }
            res = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                res.map_err(|e| ControllerError::InitializationFailed(e.to_string()))
            }
        };
        if let Err(e) = &outcome {
            error!("Controller stopped: {}", e);
        }

        self.shutdown().await?;
        outcome
    }

    /// Disconnects the consumer session and stops every provider service.
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        match self.node.disconnect().await {
            Ok(()) | Err(ConnectionError::NotConnected) => {}
            Err(e) => warn!("Failed to disconnect consumer session: {}", e),
        }

        let running = self.control.list().len();
        self.registry
            .kill()
            .await
            .map_err(ControllerError::ServiceError)?;
        info!("Stopped {} service(s), bye", running);
        Ok(())
    }
}

async fn open_storage(config: &Config) -> Result<Arc<dyn HistoryStorage>, ControllerError> {
    let storage: Arc<dyn HistoryStorage> = match config.storage.backend() {
        Some(StorageBackend::File) => {
            Arc::new(FileStorage::new_default(&config.storage.path)?)
        }
        Some(StorageBackend::Database) => {
            Arc::new(DatabaseStorage::in_dir(&config.storage.path).await?)
        }
        None => {
            return Err(ControllerError::ConfigurationError(
                ConfigError::UnknownStorageBackend(config.storage.backend.clone()),
            ))
        }
    };
    info!("History backend: {}", config.storage.backend);
    Ok(storage)
}
