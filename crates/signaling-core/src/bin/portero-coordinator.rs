//! Portero signaling coordinator
//!
//! Runs the role registry and SDP/ICE relay behind a WebSocket endpoint.
//! Settings come from defaults, an optional TOML file,
//! `PORTERO_COORDINATOR__*` environment variables and finally the flags below.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use portero_infra_common::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
use portero_signaling_core::{server, CoordinatorConfig, Role};

#[derive(Parser, Debug)]
#[command(name = "portero-coordinator")]
#[command(about = "Signaling coordinator for the Portero intercom")]
pub struct Args {
    /// TOML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:3000
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Role that places calls and receives accept/reject answers
    #[arg(long)]
    pub gatekeeper_role: Option<String>,

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
        Ok(LoggingConfig::new(level, "portero-coordinator").with_flags(
            self.json_logs,
            self.log_location,
            self.log_spans,
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.logging()?)?;
    log_welcome("portero-coordinator", env!("CARGO_PKG_VERSION"));

    let mut config = CoordinatorConfig::load(args.config.as_deref())
        .context("Failed to load coordinator settings")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(role) = args.gatekeeper_role {
        config.gatekeeper_role = Role::new(role);
    }

    tracing::info!(
        bind = %config.bind_addr,
        gatekeeper = %config.gatekeeper_role,
        "Coordinator configured"
    );
    server::serve(config).await
}
