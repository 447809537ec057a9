//! Layered configuration loading
//!
//! Settings are resolved from three layers, later layers winning:
//!
//! 1. the serde defaults of the target type
//! 2. an optional TOML file
//! 3. environment variables named `<PREFIX>__<FIELD>` (nested fields use `__`)

use crate::errors::{Error, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load a settings struct from an optional file and the environment.
///
/// `env_prefix` is e.g. `"PORTERO_COORDINATOR"`, which makes
/// `PORTERO_COORDINATOR__BIND_ADDR` override `bind_addr`. Types must carry
/// `#[serde(default)]` so that missing keys fall back to their defaults.
pub fn load_settings<T: DeserializeOwned>(file: Option<&Path>, env_prefix: &str) -> Result<T> {
    let mut builder = Config::builder();

    if let Some(path) = file {
        if !path.exists() {
            return Err(Error::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator("__")
            .separator("__"),
    );

    let settings = builder.build()?;
    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        name: String,
        port: u16,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                name: "default".to_string(),
                port: 3000,
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_when_nothing_is_provided() {
        let sample: Sample = load_settings(None, "PORTERO_SETTINGS_EMPTY").unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    #[serial]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "port = 4000").unwrap();

        let sample: Sample = load_settings(Some(file.path()), "PORTERO_SETTINGS_FILE").unwrap();
        assert_eq!(sample.port, 4000);
        assert_eq!(sample.name, "default");
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "name = \"from-file\"").unwrap();

        std::env::set_var("PORTERO_SETTINGS_ENV__NAME", "from-env");
        let sample: Sample = load_settings(Some(file.path()), "PORTERO_SETTINGS_ENV").unwrap();
        std::env::remove_var("PORTERO_SETTINGS_ENV__NAME");

        assert_eq!(sample.name, "from-env");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result: Result<Sample> =
            load_settings(Some(Path::new("/nonexistent/portero.toml")), "PORTERO_SETTINGS_MISSING");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
