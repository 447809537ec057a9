//! Common infrastructure for the Portero intercom stack
//!
//! Shared by the signaling coordinator and the endpoint client:
//!
//! - [`errors`] - the infrastructure error type
//! - [`logging`] - tracing subscriber setup
//! - [`settings`] - layered configuration loading (defaults, file, environment)

pub mod errors;
pub mod logging;
pub mod settings;

pub use errors::{Error, Result};
pub use logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
pub use settings::load_settings;
