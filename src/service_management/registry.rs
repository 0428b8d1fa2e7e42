//! Service registry seam.
//!
//! The control surface never owns service instances; it talks to a
//! [`ServiceRegistry`] which creates, starts, stops and tracks them. A registry
//! delegates the type-specific work to a [`ServiceRunner`].

use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;

use super::types::{ServiceId, ServiceInstance, ServiceOptions};
use crate::error_handling::types::RegistryError;

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Creates and starts a service for `provider_id`.
    ///
    /// Implementations must reject a second instance for the same provider and
    /// service type with [`RegistryError::AlreadyRunning`], atomically with
    /// their own bookkeeping.
    async fn start(
        &self,
        provider_id: &str,
        service_type: &str,
        options: ServiceOptions,
    ) -> Result<ServiceId, RegistryError>;

    /// Requests the service to stop. Teardown may finish after this returns.
    async fn stop(&self, id: &str) -> Result<(), RegistryError>;

    fn service(&self, id: &str) -> Option<ServiceInstance>;

    fn list(&self) -> HashMap<ServiceId, ServiceInstance>;

    /// Stops every known service.
    async fn kill(&self) -> Result<(), RegistryError>;
}

/// Type-specific start/stop of a provider service.
#[async_trait]
pub trait ServiceRunner: Send + Sync {
    async fn start(&self, instance: &ServiceInstance) -> Result<(), RegistryError>;
    async fn stop(&self, instance: &ServiceInstance) -> Result<(), RegistryError>;
}

/// Runner for service types without a native backend on this node.
pub struct NoopRunner;

#[async_trait]
impl ServiceRunner for NoopRunner {
    async fn start(&self, instance: &ServiceInstance) -> Result<(), RegistryError> {
        info!(
            "Noop service {} started for {}",
            instance.proposal.service_type, instance.proposal.provider_id
        );
        Ok(())
    }

    async fn stop(&self, instance: &ServiceInstance) -> Result<(), RegistryError> {
        debug!("Noop service {} stopped", instance.id);
        Ok(())
    }
}
