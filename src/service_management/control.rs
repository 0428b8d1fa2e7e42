use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::options::{OptionsParseError, OptionsParsers};
use super::registry::ServiceRegistry;
use super::types::{ServiceId, ServiceInstance, ServiceRequest};
use super::validation::FieldErrorMap;
use crate::error_handling::types::ServiceError;

/// Control surface for provider services.
///
/// Validates start requests, refuses duplicates and maps registry outcomes to
/// [`ServiceError`] variants. Holds no mutable state of its own; all instance
/// bookkeeping lives in the registry.
pub struct ServiceControl {
    registry: Arc<dyn ServiceRegistry>,
    options: OptionsParsers,
}

impl ServiceControl {
    pub fn new(registry: Arc<dyn ServiceRegistry>, options: OptionsParsers) -> Self {
        Self { registry, options }
    }

    pub fn list(&self) -> HashMap<ServiceId, ServiceInstance> {
        self.registry.list()
    }

    pub fn get(&self, id: &str) -> Result<ServiceInstance, ServiceError> {
        self.registry.service(id).ok_or(ServiceError::NotFound)
    }

    pub async fn start(
        &self,
        request: ServiceRequest,
    ) -> Result<(ServiceId, ServiceInstance), ServiceError> {
        let mut errors = FieldErrorMap::new();
        errors.require("providerId", &request.provider_id);
        errors.require("serviceType", &request.service_type);
        if errors.has_errors() {
            debug!("Rejecting start request: missing {:?}", errors.fields());
            return Err(ServiceError::Validation(errors));
        }

        let options = match &request.options {
            Some(raw) => self
                .options
                .parse(&request.service_type, raw)
                .map_err(|e| match e {
                    OptionsParseError::UnknownServiceType => {
                        ServiceError::InvalidOptions("Invalid service type".to_string())
                    }
                    OptionsParseError::Malformed(reason) => {
                        debug!("Options for {} rejected: {}", request.service_type, reason);
                        ServiceError::InvalidOptions("Invalid options".to_string())
                    }
                })?,
            None => self.options.default_for(&request.service_type),
        };

        // Best-effort early answer; the registry enforces uniqueness atomically.
        if self.is_already_running(&request.provider_id, &request.service_type) {
            warn!(
                "Service {} already running for provider {}",
                request.service_type, request.provider_id
            );
            return Err(ServiceError::Conflict);
        }

        let id = self
            .registry
            .start(&request.provider_id, &request.service_type, options)
            .await?;
        let instance = self.registry.service(&id).ok_or_else(|| {
            ServiceError::Internal(format!("Service {} vanished after start", id))
        })?;

        info!(
            "Service {} ({}) started for provider {}",
            id, request.service_type, request.provider_id
        );
        Ok((id, instance))
    }

    pub async fn stop(&self, id: &str) -> Result<(), ServiceError> {
        if self.registry.service(id).is_none() {
            return Err(ServiceError::NotFound);
        }

        self.registry
            .stop(id)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        info!("Stop requested for service {}", id);
        Ok(())
    }

    fn is_already_running(&self, provider_id: &str, service_type: &str) -> bool {
        self.registry
            .list()
            .values()
            .any(|instance| instance.serves(provider_id, service_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::RegistryError;
    use crate::service_management::registry::NoopRunner;
    use crate::service_management::service_manager::ServiceManager;
    use crate::service_management::types::{Location, OpenvpnOptions, ServiceOptions};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    fn control() -> ServiceControl {
        let registry = ServiceManager::new(Some(Location {
            country: "DE".into(),
            city: "Berlin".into(),
        }))
        .with_runner("wireguard", Arc::new(NoopRunner))
        .with_runner("openvpn", Arc::new(NoopRunner));
        ServiceControl::new(Arc::new(registry), OptionsParsers::with_defaults())
    }

    fn request(provider: &str, service_type: &str) -> ServiceRequest {
        ServiceRequest {
            provider_id: provider.into(),
            passphrase: "pw".into(),
            service_type: service_type.into(),
            options: None,
        }
    }

    /// Registry that records calls and fails on demand.
    #[derive(Default)]
    struct RecordingRegistry {
        starts: Mutex<usize>,
        stop_error: Option<RegistryError>,
        instance: Option<ServiceInstance>,
    }

    #[async_trait]
    impl ServiceRegistry for RecordingRegistry {
        async fn start(
            &self,
            _provider_id: &str,
            _service_type: &str,
            _options: ServiceOptions,
        ) -> Result<ServiceId, RegistryError> {
            *self.starts.lock().unwrap() += 1;
            Err(RegistryError::Failed("unreachable backend".into()))
        }

        async fn stop(&self, _id: &str) -> Result<(), RegistryError> {
            match &self.stop_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        fn service(&self, id: &str) -> Option<ServiceInstance> {
            self.instance.clone().filter(|i| i.id == id)
        }

        fn list(&self) -> HashMap<ServiceId, ServiceInstance> {
            self.instance
                .iter()
                .map(|i| (i.id.clone(), i.clone()))
                .collect()
        }

        async fn kill(&self) -> Result<(), RegistryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn validation_lists_exactly_the_missing_fields() {
        let control = control();

        let err = assert_err!(control.start(request("", "")).await);
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.fields(), vec!["providerId", "serviceType"])
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = assert_err!(control.start(request("0xabc", "")).await);
        match err {
            ServiceError::Validation(errors) => assert_eq!(errors.fields(), vec!["serviceType"]),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = assert_err!(control.start(request("", "wireguard")).await);
        match err {
            ServiceError::Validation(errors) => assert_eq!(errors.fields(), vec!["providerId"]),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn validation_never_reaches_registry() {
        let registry = Arc::new(RecordingRegistry::default());
        let control = ServiceControl::new(registry.clone(), OptionsParsers::with_defaults());

        assert_err!(control.start(request("", "wireguard")).await);
        assert_eq!(*registry.starts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn options_are_parsed_per_service_type() {
        let control = control();

        let mut req = request("0xabc", "openvpn");
        req.options = Some(json!({"protocol": "tcp", "port": 443}));
        let (_, instance) = assert_ok!(control.start(req).await);
        assert_eq!(
            instance.options,
            ServiceOptions::Openvpn(OpenvpnOptions {
                protocol: "tcp".into(),
                port: 443
            })
        );

        let mut req = request("0xabc", "shadowsocks");
        req.options = Some(json!({}));
        let err = assert_err!(control.start(req).await);
        assert!(matches!(err, ServiceError::InvalidOptions(msg) if msg == "Invalid service type"));

        let mut req = request("0xdef", "wireguard");
        req.options = Some(json!({"bogus": 1}));
        let err = assert_err!(control.start(req).await);
        assert!(matches!(err, ServiceError::InvalidOptions(msg) if msg == "Invalid options"));
    }

    #[tokio::test]
    async fn duplicate_provider_and_type_conflicts() {
        let control = control();
        assert_ok!(control.start(request("0xabc", "wireguard")).await);
        assert_ok!(control.start(request("0xabc", "openvpn")).await);
        assert_ok!(control.start(request("0x123", "wireguard")).await);

        let err = assert_err!(control.start(request("0xabc", "wireguard")).await);
        assert!(matches!(err, ServiceError::Conflict));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_starts_conflict() {
        let control = Arc::new(control());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let control = control.clone();
            handles.push(tokio::spawn(async move {
                control.start(request("0xabc", "wireguard")).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, ServiceError::Conflict)),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(control.list().len(), 1);
    }

    #[tokio::test]
    async fn registry_failures_are_mapped() {
        let no_location = ServiceManager::new(None).with_runner("wireguard", Arc::new(NoopRunner));
        let control = ServiceControl::new(Arc::new(no_location), OptionsParsers::with_defaults());
        let err = assert_err!(control.start(request("0xabc", "wireguard")).await);
        assert!(matches!(err, ServiceError::InvalidLocation(_)));

        let control = ServiceControl::new(
            Arc::new(RecordingRegistry::default()),
            OptionsParsers::with_defaults(),
        );
        let err = assert_err!(control.start(request("0xabc", "wireguard")).await);
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[tokio::test]
    async fn get_and_stop_unknown_id_is_not_found() {
        let control = control();
        assert!(matches!(control.get("missing"), Err(ServiceError::NotFound)));
        assert!(matches!(
            control.stop("missing").await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn stop_delegates_and_maps_failures() {
        let control = control();
        let (id, _) = assert_ok!(control.start(request("0xabc", "wireguard")).await);
        assert_ok!(control.stop(&id).await);
        assert!(control.list().is_empty());

        let registry = RecordingRegistry {
            stop_error: Some(RegistryError::Failed("tunnel stuck".into())),
            instance: Some(ServiceInstance {
                id: "svc-1".into(),
                proposal: crate::service_management::types::Proposal {
                    provider_id: "0xabc".into(),
                    service_type: "wireguard".into(),
                    location: Location::default(),
                },
                state: crate::service_management::types::ServiceState::Running,
                options: ServiceOptions::Generic,
            }),
            ..Default::default()
        };
        let control = ServiceControl::new(Arc::new(registry), OptionsParsers::with_defaults());
        let err = assert_err!(control.stop("svc-1").await);
        assert!(matches!(err, ServiceError::Internal(msg) if msg.contains("tunnel stuck")));
    }
}
