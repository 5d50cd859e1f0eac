//! Configuration for the Homebrew exporter.
//!
//! Values are resolved from built-in defaults, then an optional JSON5 file,
//! then the environment variables below, then command-line flags.
//!
//! | Variable            | Effect                                        |
//! |---------------------|-----------------------------------------------|
//! | `LISTEN_PORT`       | listen on `0.0.0.0:<port>`                    |
//! | `METRICS_PATH`      | path of the metrics endpoint                  |
//! | `HOMEBREW_FORMULAE` | comma-separated formulae to track             |

use std::path::Path;

use homebrew_analytics::LoggingConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::DEFAULT_BASE_URL;

/// Environment variable overriding the listen port.
pub const ENV_LISTEN_PORT: &str = "LISTEN_PORT";
/// Environment variable overriding the metrics path.
pub const ENV_METRICS_PATH: &str = "METRICS_PATH";
/// Environment variable overriding the tracked formulae.
pub const ENV_FORMULAE: &str = "HOMEBREW_FORMULAE";

/// Paths served by the exporter itself, unavailable for metrics.
const RESERVED_PATHS: [&str; 2] = ["/", "/health"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] homebrew_analytics::Error),
    #[error("Invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Upstream analytics settings.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:9888").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9888".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Upstream analytics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Root of the analytics API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Formulae to publish samples for.
    #[serde(default)]
    pub formulae: Vec<String>,

    /// Timeout for a single document request (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deadline for a whole scrape across all documents (seconds).
    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_scrape_timeout() -> u64 {
    30
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            formulae: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            scrape_timeout_secs: default_scrape_timeout(),
        }
    }
}

/// Split a comma-separated formula list, trimming whitespace and dropping
/// empty entries.
pub fn parse_formulae(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON5 file without validating it, for callers that still
    /// apply overrides before calling [`validate`](Self::validate).
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Ok(homebrew_analytics::load_config(path)?)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = homebrew_analytics::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides using `lookup` to read variables. Unset and empty
    /// variables leave the configuration untouched.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = get(ENV_LISTEN_PORT) {
            let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
                name: ENV_LISTEN_PORT,
                value: port.clone(),
            })?;
            self.prometheus.listen = format!("0.0.0.0:{}", port);
        }

        if let Some(path) = get(ENV_METRICS_PATH) {
            self.prometheus.path = path.trim().to_string();
        }

        if let Some(formulae) = get(ENV_FORMULAE) {
            self.analytics.formulae = parse_formulae(&formulae);
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if RESERVED_PATHS.contains(&self.prometheus.path.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Metrics path cannot be {} (reserved)",
                self.prometheus.path
            )));
        }

        if self
            .prometheus
            .path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
        {
            return Err(ConfigError::Validation(
                "Metrics path segments cannot start with : or *".to_string(),
            ));
        }

        if self
            .prometheus
            .path
            .chars()
            .any(|c| matches!(c, '"' | '\'' | '<' | '>' | '&') || c.is_whitespace())
        {
            return Err(ConfigError::Validation(
                "Metrics path contains characters not allowed in a URL path".to_string(),
            ));
        }

        if self.analytics.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "base_url must not be empty".to_string(),
            ));
        }

        if self.analytics.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.analytics.scrape_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "scrape_timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homebrew_analytics::LogFormat;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = ExporterConfig::parse("{}").unwrap();

        assert_eq!(config.prometheus.listen, "0.0.0.0:9888");
        assert_eq!(config.prometheus.path, "/metrics");
        assert_eq!(
            config.analytics.base_url,
            "https://formulae.brew.sh/api/analytics"
        );
        assert!(config.analytics.formulae.is_empty());
        assert_eq!(config.analytics.request_timeout_secs, 10);
        assert_eq!(config.analytics.scrape_timeout_secs, 30);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            prometheus: {
                listen: "127.0.0.1:9999",
                path: "/homebrew/metrics",
            },
            analytics: {
                base_url: "http://mirror.local/api/analytics",
                formulae: ["wget", "curl"],
                request_timeout_secs: 5,
                scrape_timeout_secs: 20,
            },
            logging: {
                level: "debug",
                format: "json"
            }
        }"#;

        let config = ExporterConfig::parse(json).unwrap();

        assert_eq!(config.prometheus.listen, "127.0.0.1:9999");
        assert_eq!(config.prometheus.path, "/homebrew/metrics");
        assert_eq!(
            config.analytics.base_url,
            "http://mirror.local/api/analytics"
        );
        assert_eq!(config.analytics.formulae, vec!["wget", "curl"]);
        assert_eq!(config.analytics.request_timeout_secs, 5);
        assert_eq!(config.analytics.scrape_timeout_secs, 20);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_invalid_listen() {
        let json = r#"{
            prometheus: { listen: "not-an-address" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid listen address")
        );
    }

    #[test]
    fn test_validate_invalid_path() {
        let json = r#"{
            prometheus: { path: "no-leading-slash" }
        }"#;

        let result = ExporterConfig::parse(json);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_root_path() {
        let json = r#"{
            prometheus: { path: "/" }
        }"#;

        assert!(ExporterConfig::parse(json).is_err());
    }

    #[test]
    fn test_validate_reserved_path() {
        let err = ExporterConfig::parse(r#"{ prometheus: { path: "/health" } }"#).unwrap_err();
        assert!(err.to_string().contains("reserved"));

        let mut config = ExporterConfig::default();
        config
            .apply_env_from(env(&[("METRICS_PATH", "/health")]))
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_path_captures() {
        assert!(ExporterConfig::parse(r#"{ prometheus: { path: "/:name" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ prometheus: { path: "/metrics/*rest" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ prometheus: { path: "/brew:metrics" } }"#).is_ok());
    }

    #[test]
    fn test_validate_path_markup() {
        assert!(ExporterConfig::parse(r#"{ prometheus: { path: "/m\"><script>" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ prometheus: { path: "/<b>" } }"#).is_err());
        assert!(ExporterConfig::parse(r#"{ prometheus: { path: "/a b" } }"#).is_err());
    }

    #[test]
    fn test_overrides_applied_before_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.json5");
        std::fs::write(&path, r#"{ prometheus: { listen: "not-an-address" } }"#).unwrap();

        assert!(ExporterConfig::load_from_file(&path).is_err());

        let mut config = ExporterConfig::read_file(&path).unwrap();
        config
            .apply_env_from(env(&[("LISTEN_PORT", "9100")]))
            .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.prometheus.listen, "0.0.0.0:9100");
    }

    #[test]
    fn test_validate_zero_timeouts() {
        assert!(ExporterConfig::parse("{ analytics: { request_timeout_secs: 0 } }").is_err());
        assert!(ExporterConfig::parse("{ analytics: { scrape_timeout_secs: 0 } }").is_err());
    }

    #[test]
    fn test_parse_formulae() {
        assert_eq!(parse_formulae("wget, curl"), vec!["wget", "curl"]);
        assert_eq!(parse_formulae("wget,curl,"), vec!["wget", "curl"]);
        assert_eq!(parse_formulae(" python@3.12 ,, jq "), vec!["python@3.12", "jq"]);
        assert!(parse_formulae("").is_empty());
    }

    #[test]
    fn test_apply_env() {
        let mut config = ExporterConfig::default();
        config
            .apply_env_from(env(&[
                ("LISTEN_PORT", "9100"),
                ("METRICS_PATH", "/brew"),
                ("HOMEBREW_FORMULAE", "wget, curl"),
            ]))
            .unwrap();

        assert_eq!(config.prometheus.listen, "0.0.0.0:9100");
        assert_eq!(config.prometheus.path, "/brew");
        assert_eq!(config.analytics.formulae, vec!["wget", "curl"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_env_unset_keeps_file_values() {
        let mut config = ExporterConfig::parse(r#"{ analytics: { formulae: ["jq"] } }"#).unwrap();
        config
            .apply_env_from(env(&[("HOMEBREW_FORMULAE", "")]))
            .unwrap();

        assert_eq!(config.analytics.formulae, vec!["jq"]);
        assert_eq!(config.prometheus.listen, "0.0.0.0:9888");
    }

    #[test]
    fn test_apply_env_invalid_port() {
        let mut config = ExporterConfig::default();
        let err = config
            .apply_env_from(env(&[("LISTEN_PORT", "http")]))
            .unwrap_err();

        assert!(err.to_string().contains("LISTEN_PORT"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exporter.json5");
        std::fs::write(&path, r#"{ analytics: { formulae: ["wget"] } }"#).unwrap();

        let config = ExporterConfig::load_from_file(&path).unwrap();
        assert_eq!(config.analytics.formulae, vec!["wget"]);
    }
}
