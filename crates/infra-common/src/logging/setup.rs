use crate::errors::{Error, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Whether to log spans
    pub log_spans: bool,
    /// Application name to include in logs
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "portero".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Enable span logging
    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Set up the global tracing subscriber.
///
/// `RUST_LOG` directives are honoured on top of `config.level`. Fails with
/// [`Error::Logging`] when a global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().with_writer(std::io::stdout).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::Logging(e.to_string()))?;
    tracing::debug!(
        app = %config.app_name,
        json = config.json,
        file_info = config.file_info,
        log_spans = config.log_spans,
        "Logging initialized"
    );
    Ok(())
}

impl LoggingConfig {
    /// Apply the common `--json-logs`, `--log-location` and `--log-spans` switches
    pub fn with_flags(mut self, json: bool, file_info: bool, log_spans: bool) -> Self {
        self.json |= json;
        self.file_info |= file_info;
        self.log_spans |= log_spans;
        self
    }
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Config(format!("Invalid log level: {}", level)))
}

/// Log a welcome message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
    }

    #[test]
    fn rejects_unknown_level() {
        let err = parse_log_level("chatty").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("chatty")));
    }

    #[test]
    fn builder_flags() {
        let config = LoggingConfig::new(Level::DEBUG, "coordinator")
            .with_json()
            .with_file_info();
        assert!(config.json);
        assert!(config.file_info);
        assert!(!config.log_spans);
        assert_eq!(config.app_name, "coordinator");
    }

    #[test]
    fn flags_only_switch_options_on() {
        let config = LoggingConfig::new(Level::INFO, "endpoint").with_flags(false, true, true);
        assert!(!config.json);
        assert!(config.file_info);
        assert!(config.log_spans);

        let config = LoggingConfig::new(Level::INFO, "endpoint")
            .with_json()
            .with_flags(false, false, false);
        assert!(config.json);
        assert!(!config.file_info);
    }
}
