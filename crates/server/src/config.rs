//! Server configuration

use anyhow::{Context, Result};
use housing_core::pipeline::DEFAULT_MODEL_NAME;
use housing_core::tracking::DEFAULT_TRACKING_URI;
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration, read from `HOUSING_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port for the prediction, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Location of the tracking store and model registry
    #[serde(default = "default_tracking_uri")]
    pub tracking_uri: String,

    /// Registered model to serve
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Pinned registry version, resolved once at startup
    #[serde(default = "default_model_version")]
    pub model_version: u32,

    /// Optional JSON request log, appended to
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_api_port() -> u16 {
    8000
}

fn default_tracking_uri() -> String {
    DEFAULT_TRACKING_URI.to_string()
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_model_version() -> u32 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            tracking_uri: default_tracking_uri(),
            model_name: default_model_name(),
            model_version: default_model_version(),
            log_file: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix("HOUSING"))
    }

    fn from_env(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()?;

        config
            .try_deserialize()
            .context("invalid HOUSING_* configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("HOUSING").source(Some(map))
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = ServerConfig::from_env(env(&[])).unwrap();

        assert_eq!(config.api_port, 8000);
        assert_eq!(config.tracking_uri, "file:./mlruns");
        assert_eq!(config.model_name, "california-housing-regressor");
        assert_eq!(config.model_version, 1);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ServerConfig::from_env(env(&[
            ("HOUSING_API_PORT", "9000"),
            ("HOUSING_TRACKING_URI", "file:/srv/mlruns"),
            ("HOUSING_MODEL_VERSION", "3"),
            ("HOUSING_LOG_FILE", "/var/log/housing-api.log"),
        ]))
        .unwrap();

        assert_eq!(config.api_port, 9000);
        assert_eq!(config.tracking_uri, "file:/srv/mlruns");
        assert_eq!(config.model_version, 3);
        assert_eq!(
            config.log_file.as_deref(),
            Some(std::path::Path::new("/var/log/housing-api.log"))
        );
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(ServerConfig::from_env(env(&[("HOUSING_API_PORT", "not-a-port")])).is_err());
    }
}
