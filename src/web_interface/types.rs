use serde::Serialize;

use crate::service_management::types::{ServiceId, ServiceInstance};
use crate::service_management::validation::FieldErrorMap;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    pub message: String,
    pub errors: FieldErrorMap,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub country: String,
    pub city: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalResponse {
    pub provider_id: String,
    pub service_type: String,
    pub location: LocationResponse,
}

#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub protocol: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfoResponse {
    pub id: ServiceId,
    pub proposal: ProposalResponse,
    pub status: String,
    pub options: OptionsResponse,
}

impl ServiceInfoResponse {
    pub fn new(id: &str, instance: &ServiceInstance) -> Self {
        let (protocol, port) = instance.options.summary();
        Self {
            id: id.to_string(),
            proposal: ProposalResponse {
                provider_id: instance.proposal.provider_id.clone(),
                service_type: instance.proposal.service_type.clone(),
                location: LocationResponse {
                    country: instance.proposal.location.country.clone(),
                    city: instance.proposal.location.city.clone(),
                },
            },
            status: instance.state.to_string(),
            options: OptionsResponse { protocol, port },
        }
    }
}
