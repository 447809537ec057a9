//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::protocol::Role;

/// Environment prefix for coordinator settings, e.g. `PORTERO_COORDINATOR__BIND_ADDR`
pub const ENV_PREFIX: &str = "PORTERO_COORDINATOR";

/// Default role of the endpoint that places calls
pub const DEFAULT_GATEKEEPER_ROLE: &str = "Portero";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_addr: SocketAddr,
    /// Role that receives accept/reject answers and is left out of the roster
    pub gatekeeper_role: Role,
    /// Path of the WebSocket endpoint
    pub ws_path: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            gatekeeper_role: Role::from(DEFAULT_GATEKEEPER_ROLE),
            ws_path: "/ws".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Load from an optional TOML file and `PORTERO_COORDINATOR__*` variables
    pub fn load(file: Option<&Path>) -> portero_infra_common::Result<Self> {
        portero_infra_common::load_settings(file, ENV_PREFIX)
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_gatekeeper_role(mut self, role: impl Into<Role>) -> Self {
        self.gatekeeper_role = role.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_server() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.gatekeeper_role, Role::from("Portero"));
        assert_eq!(config.ws_path, "/ws");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_value(serde_json::json!({ "gatekeeper_role": "Recepcion" })).unwrap();
        assert_eq!(config.gatekeeper_role, Role::from("Recepcion"));
        assert_eq!(config.bind_addr.port(), 3000);
    }
}
