//! Engine profile derived from a negotiated session configuration.

use serde::Deserialize;
use std::fmt::Write;

use crate::error_handling::types::ConnectionError;

pub trait ProfileBuilder: Send + Sync {
    fn build(&self, session_config: &serde_json::Value) -> Result<String, ConnectionError>;
}

/// Session configuration sent by an OpenVPN provider.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenvpnSessionConfig {
    remote: String,
    port: u16,
    #[serde(default = "default_protocol")]
    protocol: String,
    ca_certificate: String,
    #[serde(default)]
    tls_preshared_key: Option<String>,
}

fn default_protocol() -> String {
    "udp".to_string()
}

/// Renders a client profile for the OpenVPN engine.
pub struct OpenvpnProfileBuilder;

impl ProfileBuilder for OpenvpnProfileBuilder {
    fn build(&self, session_config: &serde_json::Value) -> Result<String, ConnectionError> {
        let config: OpenvpnSessionConfig = serde_json::from_value(session_config.clone())
            .map_err(|e| ConnectionError::ConfigurationError(e.to_string()))?;

        if config.remote.is_empty() {
            return Err(ConnectionError::ConfigurationError(
                "remote address is empty".to_string(),
            ));
        }
        let proto = match config.protocol.to_lowercase().as_str() {
            "udp" => "udp",
            "tcp" => "tcp-client",
            other => {
                return Err(ConnectionError::ConfigurationError(format!(
                    "unsupported protocol: {}",
                    other
                )))
            }
        };

        let mut profile = String::new();
        let _ = writeln!(profile, "client");
        let _ = writeln!(profile, "dev tun");
        let _ = writeln!(profile, "proto {}", proto);
        let _ = writeln!(profile, "remote {} {}", config.remote, config.port);
        let _ = writeln!(profile, "nobind");
        let _ = writeln!(profile, "persist-key");
        let _ = writeln!(profile, "auth-user-pass");
        let _ = writeln!(profile, "verb 3");
        let _ = writeln!(profile, "<ca>\n{}\n</ca>", config.ca_certificate.trim());
        if let Some(key) = config.tls_preshared_key {
            let _ = writeln!(profile, "<tls-crypt>\n{}\n</tls-crypt>", key.trim());
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_remote_and_certificates() {
        let profile = OpenvpnProfileBuilder
            .build(&json!({
                "remote": "10.0.0.1",
                "port": 1194,
                "caCertificate": "CA-PEM",
                "tlsPresharedKey": "TLS-KEY"
            }))
            .unwrap();

        assert!(profile.contains("proto udp\n"));
        assert!(profile.contains("remote 10.0.0.1 1194\n"));
        assert!(profile.contains("<ca>\nCA-PEM\n</ca>"));
        assert!(profile.contains("<tls-crypt>\nTLS-KEY\n</tls-crypt>"));
    }

    #[test]
    fn tcp_maps_to_client_mode() {
        let profile = OpenvpnProfileBuilder
            .build(&json!({
                "remote": "10.0.0.1",
                "port": 443,
                "protocol": "TCP",
                "caCertificate": "CA"
            }))
            .unwrap();
        assert!(profile.contains("proto tcp-client\n"));
        assert!(!profile.contains("tls-crypt"));
    }

    #[test]
    fn malformed_config_is_a_configuration_error() {
        let err = OpenvpnProfileBuilder.build(&json!({"port": 1194})).unwrap_err();
        assert!(matches!(err, ConnectionError::ConfigurationError(_)));

        let err = OpenvpnProfileBuilder
            .build(&json!({
                "remote": "10.0.0.1",
                "port": 1194,
                "protocol": "sctp",
                "caCertificate": "CA"
            }))
            .unwrap_err();
        assert_eq!(
            err,
            ConnectionError::ConfigurationError("unsupported protocol: sctp".to_string())
        );
    }
}
