//! Core types shared by the service registry and the control surface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque service instance identifier (UUID v4 text).
pub type ServiceId = String;

/// Geographic location a service is offered from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub city: String,
}

/// Advertised offer describing who provides which service from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub provider_id: String,
    pub service_type: String,
    pub location: Location,
}

/// Lifecycle state of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Starting,
    Running,
    NotRunning,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::Starting => "Starting",
            ServiceState::Running => "Running",
            ServiceState::NotRunning => "NotRunning",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenvpnOptions {
    #[serde(default = "OpenvpnOptions::default_protocol")]
    pub protocol: String,
    #[serde(default = "OpenvpnOptions::default_port")]
    pub port: u16,
}

impl OpenvpnOptions {
    fn default_protocol() -> String {
        "udp".to_string()
    }

    fn default_port() -> u16 {
        1194
    }
}

impl Default for OpenvpnOptions {
    fn default() -> Self {
        Self {
            protocol: Self::default_protocol(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct WireguardOptions {
    /// Listen port; `None` lets the service pick one.
    #[serde(default)]
    pub port: Option<u16>,
    /// Delay in milliseconds before the consumer connects.
    #[serde(default)]
    pub connect_delay: u32,
}

/// Typed, service-specific options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOptions {
    Openvpn(OpenvpnOptions),
    Wireguard(WireguardOptions),
    /// Service types that take no options.
    Generic,
}

impl ServiceOptions {
    /// Transport protocol and port reported in service info.
    pub fn summary(&self) -> (String, u16) {
        match self {
            ServiceOptions::Openvpn(o) => (o.protocol.to_uppercase(), o.port),
            ServiceOptions::Wireguard(o) => ("UDP".to_string(), o.port.unwrap_or(0)),
            ServiceOptions::Generic => (String::new(), 0),
        }
    }
}

/// A running (or starting/stopping) offer bound to a provider and service type.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceInstance {
    pub id: ServiceId,
    pub proposal: Proposal,
    pub state: ServiceState,
    pub options: ServiceOptions,
}

impl ServiceInstance {
    /// True when this instance serves `service_type` for `provider_id`.
    pub fn serves(&self, provider_id: &str, service_type: &str) -> bool {
        self.proposal.provider_id == provider_id && self.proposal.service_type == service_type
    }
}

/// Start request as received from a client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub passphrase: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}
