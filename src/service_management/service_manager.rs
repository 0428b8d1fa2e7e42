use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::registry::{ServiceRegistry, ServiceRunner};
use super::types::{Location, Proposal, ServiceId, ServiceInstance, ServiceOptions, ServiceState};
use crate::error_handling::types::RegistryError;

/// In-memory service registry.
///
/// Keeps every known instance in a map guarded by one lock. The duplicate
/// check and the insertion of the new `Starting` instance happen under that
/// lock, so concurrent starts for the same provider and service type cannot
/// both succeed.
///
/// # Fields Overview
///
/// - `instances`: registry of known service instances keyed by id
/// - `runners`: type-specific start/stop backends keyed by service type
/// - `location`: location advertised in proposals; `None` means it could not
///   be detected and every start is rejected
pub struct ServiceManager {
    instances: Mutex<HashMap<ServiceId, ServiceInstance>>,
    runners: HashMap<String, Arc<dyn ServiceRunner>>,
    location: Option<Location>,
}

impl ServiceManager {
    pub fn new(location: Option<Location>) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            runners: HashMap::new(),
            location,
        }
    }

    pub fn with_runner(mut self, service_type: &str, runner: Arc<dyn ServiceRunner>) -> Self {
        self.runners.insert(service_type.to_string(), runner);
        self
    }

    fn instances(&self) -> MutexGuard<'_, HashMap<ServiceId, ServiceInstance>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, id: &str, state: ServiceState) {
        if let Some(instance) = self.instances().get_mut(id) {
            instance.state = state;
        }
    }

    /// Reserves a `Starting` instance, or fails if the pair is already served.
    fn reserve(
        &self,
        provider_id: &str,
        service_type: &str,
        location: Location,
        options: ServiceOptions,
    ) -> Result<ServiceInstance, RegistryError> {
        let mut instances = self.instances();
        if instances
            .values()
            .any(|instance| instance.serves(provider_id, service_type))
        {
            warn!(
                "Refusing duplicate {} service for provider {}",
                service_type, provider_id
            );
            return Err(RegistryError::AlreadyRunning);
        }

        let instance = ServiceInstance {
            id: Uuid::new_v4().to_string(),
            proposal: Proposal {
                provider_id: provider_id.to_string(),
                service_type: service_type.to_string(),
                location,
            },
            state: ServiceState::Starting,
            options,
        };
        instances.insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }
}

#[async_trait]
impl ServiceRegistry for ServiceManager {
    async fn start(
        &self,
        provider_id: &str,
        service_type: &str,
        options: ServiceOptions,
    ) -> Result<ServiceId, RegistryError> {
        let location = self
            .location
            .clone()
            .ok_or_else(|| RegistryError::Location("no location configured".to_string()))?;
        let runner = self
            .runners
            .get(service_type)
            .cloned()
            .ok_or_else(|| RegistryError::UnsupportedServiceType(service_type.to_string()))?;

        let instance = self.reserve(provider_id, service_type, location, options)?;
        info!(
            "Starting {} service {} for provider {}",
            service_type, instance.id, provider_id
        );

        if let Err(e) = runner.start(&instance).await {
            error!("Service {} failed to start: {}", instance.id, e);
            self.instances().remove(&instance.id);
            return Err(e);
        }

        self.set_state(&instance.id, ServiceState::Running);
        Ok(instance.id)
    }

    async fn stop(&self, id: &str) -> Result<(), RegistryError> {
        let instance = self.service(id).ok_or(RegistryError::NotFound)?;
        let runner = self
            .runners
            .get(&instance.proposal.service_type)
            .cloned()
            .ok_or_else(|| {
                RegistryError::UnsupportedServiceType(instance.proposal.service_type.clone())
            })?;

        self.set_state(id, ServiceState::NotRunning);
        runner.stop(&instance).await?;
        self.instances().remove(id);
        info!("Service {} stopped", id);
        Ok(())
    }

    fn service(&self, id: &str) -> Option<ServiceInstance> {
        let result = self.instances().get(id).cloned();
        debug!(
            "Service lookup for {}: {}",
            id,
            if result.is_some() { "found" } else { "not found" }
        );
        result
    }

    fn list(&self) -> HashMap<ServiceId, ServiceInstance> {
        self.instances().clone()
    }

    async fn kill(&self) -> Result<(), RegistryError> {
        let ids: Vec<ServiceId> = self.instances().keys().cloned().collect();
        info!("Stopping {} service(s)", ids.len());

        let mut last_error = None;
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                error!("Failed to stop service {}: {}", id, e);
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
