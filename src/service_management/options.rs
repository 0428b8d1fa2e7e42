//! Registry of per-service-type option decoders.
//!
//! Each service type registers a decode function turning the raw JSON payload
//! of a start request into a tagged [`ServiceOptions`] value, plus the options
//! used when the request carries none.

use log::debug;
use std::collections::HashMap;

use super::types::{OpenvpnOptions, ServiceOptions, WireguardOptions};

/// Decodes a raw options payload for one service type.
pub type OptionsParser = fn(&serde_json::Value) -> Result<ServiceOptions, serde_json::Error>;

struct ParserEntry {
    parse: OptionsParser,
    default: ServiceOptions,
}

#[derive(Default)]
pub struct OptionsParsers {
    parsers: HashMap<String, ParserEntry>,
}

/// Why a payload could not be turned into options.
#[derive(Debug, PartialEq, Eq)]
pub enum OptionsParseError {
    UnknownServiceType,
    Malformed(String),
}

impl OptionsParsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsers for the service types the node knows how to configure.
    pub fn with_defaults() -> Self {
        let mut parsers = Self::new();
        parsers.register(
            "openvpn",
            parse_openvpn,
            ServiceOptions::Openvpn(OpenvpnOptions::default()),
        );
        parsers.register(
            "wireguard",
            parse_wireguard,
            ServiceOptions::Wireguard(WireguardOptions::default()),
        );
        parsers.register("noop", parse_generic, ServiceOptions::Generic);
        parsers
    }

    pub fn register(&mut self, service_type: &str, parse: OptionsParser, default: ServiceOptions) {
        debug!("Registering options parser for service type {}", service_type);
        self.parsers
            .insert(service_type.to_string(), ParserEntry { parse, default });
    }

    pub fn parse(
        &self,
        service_type: &str,
        raw: &serde_json::Value,
    ) -> Result<ServiceOptions, OptionsParseError> {
        let entry = self
            .parsers
            .get(service_type)
            .ok_or(OptionsParseError::UnknownServiceType)?;
        (entry.parse)(raw).map_err(|e| OptionsParseError::Malformed(e.to_string()))
    }

    /// Options for a request that carried none.
    pub fn default_for(&self, service_type: &str) -> ServiceOptions {
        self.parsers
            .get(service_type)
            .map(|entry| entry.default.clone())
            .unwrap_or(ServiceOptions::Generic)
    }
}

fn parse_openvpn(raw: &serde_json::Value) -> Result<ServiceOptions, serde_json::Error> {
    serde_json::from_value::<OpenvpnOptions>(raw.clone()).map(ServiceOptions::Openvpn)
}

fn parse_wireguard(raw: &serde_json::Value) -> Result<ServiceOptions, serde_json::Error> {
    serde_json::from_value::<WireguardOptions>(raw.clone()).map(ServiceOptions::Wireguard)
}

fn parse_generic(raw: &serde_json::Value) -> Result<ServiceOptions, serde_json::Error> {
    // Anything but an empty object is an unknown key.
    serde_json::from_value::<EmptyOptions>(raw.clone()).map(|_| ServiceOptions::Generic)
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyOptions {}
