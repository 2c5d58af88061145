//! Configuration management for smoketrace
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! `SMOKETRACE__SECTION__KEY` environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix for environment overrides, e.g. `SMOKETRACE__BACKEND__URL`
pub const ENV_PREFIX: &str = "SMOKETRACE";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fake backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Stability polling configuration
    #[serde(default)]
    pub stability: StabilityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

/// Fake backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend's HTTP port
    pub url: String,
    /// Path returning the accumulated export requests
    pub get_requests_path: String,
    /// Path clearing the accumulated export requests
    pub clear_requests_path: String,
    /// Readiness path
    pub health_path: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            get_requests_path: "/get-requests".to_string(),
            clear_requests_path: "/clear-requests".to_string(),
            health_path: "/health".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Stability polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Give up waiting for quiescence after this long
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
    /// Delay between fetches
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Payloads this long or shorter never count as stable
    pub min_length: usize,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            min_length: 2,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.backend.url, "http://localhost:8080");
        assert_eq!(config.backend.get_requests_path, "/get-requests");
        assert_eq!(config.stability.deadline, Duration::from_secs(30));
        assert_eq!(config.stability.poll_interval, Duration::from_millis(500));
        assert_eq!(config.stability.min_length, 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[backend]
url = "http://backend:9090"

[stability]
deadline = "5s"
poll_interval = "100ms"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.backend.url, "http://backend:9090");
        assert_eq!(config.backend.clear_requests_path, "/clear-requests");
        assert_eq!(config.stability.deadline, Duration::from_secs(5));
        assert_eq!(config.stability.poll_interval, Duration::from_millis(100));
        assert_eq!(config.stability.min_length, 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/smoketrace.toml"))).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_environment_override() {
        std::env::set_var("SMOKETRACE__BACKEND__HEALTH_PATH", "/ready");
        let config = Config::load(None);
        std::env::remove_var("SMOKETRACE__BACKEND__HEALTH_PATH");

        assert_eq!(config.unwrap().backend.health_path, "/ready");
    }
}
