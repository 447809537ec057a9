//! Endpoint configuration
//!
//! Loaded from defaults, an optional TOML file and `PORTERO_CLIENT__*`
//! environment variables:
//!
//! ```toml
//! server_url = "ws://192.168.1.20:3000/ws"
//! role = "Soporte"
//! candidate_debounce_ms = 1000
//!
//! [[ice_servers]]
//! urls = ["stun:stun.l.google.com:19302"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use portero_signaling_core::config::DEFAULT_GATEKEEPER_ROLE;
use portero_signaling_core::Role;

use crate::error::{ClientError, ClientResult};
use crate::recovery::{reconnect_preset, RetryConfig};

/// Environment prefix for endpoint settings, e.g. `PORTERO_CLIENT__ROLE`
pub const ENV_PREFIX: &str = "PORTERO_CLIENT";

/// One STUN/TURN server entry handed to the peer connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Default::default()
        }
    }

    pub fn turn(url: impl Into<String>, username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    fn validate(&self, index: usize) -> ClientResult<()> {
        let field = format!("ice_servers[{}]", index);
        if self.urls.is_empty() {
            return Err(ClientError::invalid_configuration(field, "at least one URL is required"));
        }

        for url in &self.urls {
            let scheme = url.split(':').next().unwrap_or_default();
            match scheme {
                "stun" => {}
                "turn" | "turns" => {
                    if self.username.is_none() || self.credential.is_none() {
                        return Err(ClientError::invalid_configuration(
                            field,
                            format!("{} requires a username and credential", url),
                        ));
                    }
                }
                _ => {
                    return Err(ClientError::invalid_configuration(
                        field,
                        format!("unsupported ICE server URL {}", url),
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Settings for one endpoint (gatekeeper or department)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Coordinator WebSocket URL
    pub server_url: String,
    /// Role this endpoint registers as
    pub role: Role,
    /// Role that places calls; it creates offers, everyone else answers
    pub gatekeeper_role: Role,
    /// Empty for local-network-only deployments
    pub ice_servers: Vec<IceServerConfig>,
    pub media_ready_timeout_ms: u64,
    /// Window after which the accumulated local description is sent.
    /// `None` sends every local candidate as soon as it is gathered.
    pub candidate_debounce_ms: Option<u64>,
    /// How long a connected call may go without remote media before the
    /// gatekeeper renegotiates once
    pub media_watchdog_ms: u64,
    /// Fields left out keep their [`RetryConfig::reconnect`] values
    #[serde(deserialize_with = "reconnect_preset::deserialize")]
    pub reconnect: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3000/ws".to_string(),
            role: Role::new(""),
            gatekeeper_role: Role::from(DEFAULT_GATEKEEPER_ROLE),
            ice_servers: Vec::new(),
            media_ready_timeout_ms: 2000,
            candidate_debounce_ms: Some(1000),
            media_watchdog_ms: 10_000,
            reconnect: RetryConfig::reconnect(),
        }
    }
}

impl ClientConfig {
    pub fn new(role: impl Into<Role>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    /// Load from an optional TOML file and `PORTERO_CLIENT__*` variables
    pub fn load(file: Option<&Path>) -> ClientResult<Self> {
        portero_infra_common::load_settings(file, ENV_PREFIX)
            .map_err(|e| ClientError::invalid_configuration("settings", e.to_string()))
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_gatekeeper_role(mut self, role: impl Into<Role>) -> Self {
        self.gatekeeper_role = role.into();
        self
    }

    pub fn with_ice_server(mut self, server: IceServerConfig) -> Self {
        self.ice_servers.push(server);
        self
    }

    /// Send candidates one by one instead of a debounced description
    pub fn with_trickle_ice(mut self) -> Self {
        self.candidate_debounce_ms = None;
        self
    }

    pub fn with_candidate_debounce(mut self, window: Duration) -> Self {
        self.candidate_debounce_ms = Some(window.as_millis() as u64);
        self
    }

    pub fn with_media_ready_timeout(mut self, timeout: Duration) -> Self {
        self.media_ready_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_media_watchdog(mut self, window: Duration) -> Self {
        self.media_watchdog_ms = window.as_millis() as u64;
        self
    }

    pub fn with_reconnect(mut self, retry: RetryConfig) -> Self {
        self.reconnect = retry;
        self
    }

    pub fn media_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.media_ready_timeout_ms)
    }

    pub fn candidate_debounce(&self) -> Option<Duration> {
        self.candidate_debounce_ms.map(Duration::from_millis)
    }

    pub fn media_watchdog(&self) -> Duration {
        Duration::from_millis(self.media_watchdog_ms)
    }

    /// Whether this endpoint is the one that places calls
    pub fn is_gatekeeper(&self) -> bool {
        self.role == self.gatekeeper_role
    }

    pub fn validate(&self) -> ClientResult<()> {
        let url = Url::parse(&self.server_url)
            .map_err(|e| ClientError::invalid_configuration("server_url", e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ClientError::invalid_configuration(
                "server_url",
                format!("scheme must be ws or wss, got {}", url.scheme()),
            ));
        }

        if self.role.is_empty() {
            return Err(ClientError::invalid_configuration("role", "must not be empty"));
        }
        if self.gatekeeper_role.is_empty() {
            return Err(ClientError::invalid_configuration("gatekeeper_role", "must not be empty"));
        }

        for (index, server) in self.ice_servers.iter().enumerate() {
            server.validate(index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("Soporte");
        assert_eq!(config.media_ready_timeout(), Duration::from_secs(2));
        assert_eq!(config.candidate_debounce(), Some(Duration::from_secs(1)));
        assert_eq!(config.media_watchdog(), Duration::from_secs(10));
        assert!(!config.is_gatekeeper());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn gatekeeper_is_detected_by_role() {
        assert!(ClientConfig::new("Portero").is_gatekeeper());
        assert!(ClientConfig::new("Recepcion")
            .with_gatekeeper_role("Recepcion")
            .is_gatekeeper());
    }

    #[test]
    fn rejects_http_server_url() {
        let err = ClientConfig::new("Soporte")
            .with_server_url("http://127.0.0.1:3000/ws")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfiguration { field, .. } if field == "server_url"));
    }

    #[test]
    fn rejects_empty_role() {
        let err = ClientConfig::default().validate().unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfiguration { field, .. } if field == "role"));
    }

    #[test]
    fn turn_requires_credentials() {
        let config = ClientConfig::new("Soporte").with_ice_server(IceServerConfig {
            urls: vec!["turn:turn.example.org:3478".to_string()],
            username: Some("portero".to_string()),
            credential: None,
        });
        assert!(config.validate().is_err());

        let config = ClientConfig::new("Soporte")
            .with_ice_server(IceServerConfig::stun("stun:stun.l.google.com:19302"))
            .with_ice_server(IceServerConfig::turn("turns:turn.example.org:5349", "portero", "secret"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_ice_scheme() {
        let config = ClientConfig::new("Soporte")
            .with_ice_server(IceServerConfig::stun("http://stun.example.org"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn trickle_mode_disables_debounce() {
        let config = ClientConfig::new("Portero").with_trickle_ice();
        assert_eq!(config.candidate_debounce(), None);
    }

    #[test]
    #[serial]
    fn loads_file_and_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
server_url = "ws://192.168.1.20:3000/ws"
role = "Soporte"
media_watchdog_ms = 5000

[[ice_servers]]
urls = ["stun:stun.l.google.com:19302"]

[reconnect]
max_attempts = 10
initial_delay_ms = 500
"#
        )
        .unwrap();

        std::env::set_var("PORTERO_CLIENT__ROLE", "Recepcion");
        let config = ClientConfig::load(Some(file.path()));
        std::env::remove_var("PORTERO_CLIENT__ROLE");
        let config = config.unwrap();

        assert_eq!(config.server_url, "ws://192.168.1.20:3000/ws");
        assert_eq!(config.role, Role::from("Recepcion"));
        assert_eq!(config.media_watchdog(), Duration::from_secs(5));
        assert_eq!(config.ice_servers, vec![IceServerConfig::stun("stun:stun.l.google.com:19302")]);
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(500));
        assert_eq!(config.reconnect.max_delay, RetryConfig::reconnect().max_delay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_reconnect_table_keeps_reconnecting_forever() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"role":"Soporte","reconnect":{"initial_delay_ms":500}}"#).unwrap();
        assert_eq!(config.reconnect.max_attempts, u32::MAX);
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(500));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(5));

        let config: ClientConfig = serde_json::from_str(r#"{"role":"Soporte"}"#).unwrap();
        assert_eq!(config.reconnect, RetryConfig::reconnect());
    }

    #[test]
    #[serial]
    fn single_reconnect_variable_keeps_the_other_fields() {
        std::env::set_var("PORTERO_CLIENT__ROLE", "Soporte");
        std::env::set_var("PORTERO_CLIENT__RECONNECT__INITIAL_DELAY_MS", "250");
        let config = ClientConfig::load(None);
        std::env::remove_var("PORTERO_CLIENT__RECONNECT__INITIAL_DELAY_MS");
        std::env::remove_var("PORTERO_CLIENT__ROLE");
        let config = config.unwrap();

        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_attempts, u32::MAX);
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn missing_file_is_a_configuration_error() {
        let err = ClientConfig::load(Some(Path::new("/nonexistent/endpoint.toml"))).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfiguration { .. }));
    }
}
