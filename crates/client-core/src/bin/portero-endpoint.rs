//! Headless Portero endpoint
//!
//! Registers a role with the coordinator and takes part in calls without
//! local capture (receive-only). Useful for smoke-testing a deployment:
//! run one instance as `--role Soporte --auto-accept` and another as
//! `--role Portero --call Soporte`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

use portero_client_core::{
    CallAction, CallEndedInfo, CallSession, CallStatusInfo, ClientConfig, ClientError,
    ClientEventHandler, IncomingCallInfo, LocalMediaSource, RemoteTrack, Role, WebRtcNegotiator,
    WebSocketTransport,
};
use portero_infra_common::{log_welcome, parse_log_level, setup_logging, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "portero-endpoint")]
#[command(about = "Headless intercom endpoint for the Portero coordinator")]
pub struct Args {
    /// TOML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Coordinator WebSocket URL, e.g. ws://192.168.1.20:3000/ws
    #[arg(short, long)]
    pub server_url: Option<String>,

    /// Role to register as
    #[arg(short, long)]
    pub role: Option<String>,

    /// Accept incoming calls without asking
    #[arg(long)]
    pub auto_accept: bool,

    /// Ring this role once registered (gatekeeper only)
    #[arg(long)]
    pub call: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Include source file and line in log lines
    #[arg(long)]
    pub log_location: bool,

    /// Log span enter/exit events
    #[arg(long)]
    pub log_spans: bool,
}

impl Args {
    fn logging(&self) -> Result<LoggingConfig> {
        let level = parse_log_level(&self.log_level)?;
        Ok(LoggingConfig::new(level, "portero-endpoint").with_flags(
            self.json_logs,
            self.log_location,
            self.log_spans,
        ))
    }
}

struct ConsoleHandler {
    auto_accept: bool,
    connected: Arc<Notify>,
}

#[async_trait]
impl ClientEventHandler for ConsoleHandler {
    async fn on_incoming_call(&self, call: IncomingCallInfo) -> CallAction {
        if self.auto_accept {
            CallAction::Accept
        } else {
            info!(caller = %call.caller, "Declining call (start with --auto-accept to answer)");
            CallAction::Reject
        }
    }

    async fn on_call_state_changed(&self, info: CallStatusInfo) {
        info!(from = %info.previous, to = %info.status, "Call status");
    }

    async fn on_call_ended(&self, info: CallEndedInfo) {
        info!(reason = %info.reason, remote = info.remote, "Call ended");
    }

    async fn on_remote_track(&self, track: RemoteTrack) {
        info!(kind = %track.kind, id = %track.id, "Remote track");
    }

    async fn on_roster_changed(&self, roles: Vec<Role>) {
        let roles: Vec<&str> = roles.iter().map(Role::as_str).collect();
        info!(roles = ?roles, "Departments online");
    }

    async fn on_error(&self, error: &ClientError) {
        warn!(category = error.category(), error = %error, "Call error");
    }

    async fn on_network_event(&self, connected: bool, reason: Option<String>) {
        if connected {
            self.connected.notify_one();
        } else {
            warn!(reason = ?reason, "Lost the coordinator, reconnecting");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.logging()?)?;
    log_welcome("portero-endpoint", env!("CARGO_PKG_VERSION"));

    let mut config = ClientConfig::load(args.config.as_deref())
        .context("Failed to load endpoint settings")?;
    if let Some(url) = args.server_url {
        config.server_url = url;
    }
    if let Some(role) = args.role {
        config.role = Role::new(role);
    }
    config.validate().context("Invalid endpoint settings")?;

    let (transport, transport_events) =
        WebSocketTransport::connect(&config.server_url, config.role.clone(), config.reconnect.clone())?;
    let negotiator = Arc::new(WebRtcNegotiator::new(&config.ice_servers));
    let connected = Arc::new(Notify::new());
    let handler = Arc::new(ConsoleHandler {
        auto_accept: args.auto_accept,
        connected: connected.clone(),
    });

    info!(role = %config.role, server = %config.server_url, "Endpoint configured");
    let (session, driver) = CallSession::new(
        config,
        transport,
        transport_events,
        negotiator,
        LocalMediaSource::ready(Vec::new()),
    )
    .with_handler(handler)
    .spawn();

    if let Some(target) = args.call {
        connected.notified().await;
        session.initiate(target).await.context("Failed to place call")?;
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("Shutting down");
    session.shutdown().await?;
    driver.await.context("Session driver panicked")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_defaults_to_plain_info() {
        let args = Args::try_parse_from(["portero-endpoint", "--role", "Soporte"]).unwrap();
        let logging = args.logging().unwrap();

        assert_eq!(logging.level, tracing::Level::INFO);
        assert_eq!(logging.app_name, "portero-endpoint");
        assert!(!logging.file_info);
        assert!(!logging.log_spans);
    }

    #[test]
    fn json_logs_keep_the_other_switches() {
        let args = Args::try_parse_from(["portero-endpoint", "--json-logs", "--log-spans"]).unwrap();
        let logging = args.logging().unwrap();

        assert!(logging.json);
        assert!(logging.log_spans);
        assert!(!logging.file_info);
    }
}
