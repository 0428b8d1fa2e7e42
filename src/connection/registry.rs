use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::UnboundedSender;

use super::types::{ConnectOptions, ConnectionState, SessionStatistics};
use crate::error_handling::types::ConnectionError;

/// One consumer-side tunnel connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Starts the tunnel. Calling it again on a started connection is a no-op.
    async fn start(&self) -> Result<(), ConnectionError>;
    /// Requests teardown. Completion is observed through `wait`.
    async fn stop(&self);
    /// Resolves once the underlying session has ended.
    async fn wait(&self) -> Result<(), ConnectionError>;
}

pub trait ConnectionFactory: Send + Sync {
    fn create(
        &self,
        options: ConnectOptions,
        state_tx: UnboundedSender<ConnectionState>,
        statistics_tx: UnboundedSender<SessionStatistics>,
    ) -> Result<Box<dyn Connection>, ConnectionError>;
}

/// Connection factories keyed by service type.
#[derive(Default)]
pub struct ConnectionRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ConnectionFactory>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `service_type`, replacing any previous one.
    pub fn register(&self, service_type: &str, factory: Arc<dyn ConnectionFactory>) {
        let replaced = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service_type.to_string(), factory)
            .is_some();
        if replaced {
            info!("Connection factory for {} overridden", service_type);
        } else {
            info!("Connection factory for {} registered", service_type);
        }
    }

    pub fn factory(&self, service_type: &str) -> Option<Arc<dyn ConnectionFactory>> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service_type)
            .cloned()
    }

    pub fn create(
        &self,
        options: ConnectOptions,
        state_tx: UnboundedSender<ConnectionState>,
        statistics_tx: UnboundedSender<SessionStatistics>,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        let service_type = options.proposal.service_type.clone();
        let factory = self
            .factory(&service_type)
            .ok_or(ConnectionError::UnknownServiceType(service_type))?;
        factory.create(options, state_tx, statistics_tx)
    }
}
