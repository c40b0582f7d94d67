//! Daemon configuration.
//!
//! Layering, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. TOML file (`--config <path>` or `HERALD_CONFIG`)
//! 3. Environment variables (`HERALD_BIND`, `HERALD_CONTROL_PORT`,
//!    `HERALD_SUBSCRIPTION_PORT`, `HERALD_MAX_SUBSCRIBERS`)
//! 4. Command-line flags (applied by the `heraldd` binary)
//!
//! ```toml
//! bind_address = "0.0.0.0"
//! control_port = 4000
//! subscription_port = 3000
//! max_subscribers = 1024
//! shutdown_message = "server finished"
//! shutdown_timeout_secs = 5
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "HERALD_CONFIG";

const BIND_ENV: &str = "HERALD_BIND";
const CONTROL_PORT_ENV: &str = "HERALD_CONTROL_PORT";
const SUBSCRIPTION_PORT_ENV: &str = "HERALD_SUBSCRIPTION_PORT";
const MAX_SUBSCRIBERS_ENV: &str = "HERALD_MAX_SUBSCRIBERS";

/// Default port of the HTTP control endpoint
pub const DEFAULT_CONTROL_PORT: u16 = 4000;

/// Default port subscribers connect to
pub const DEFAULT_SUBSCRIPTION_PORT: u16 = 3000;

/// Default advisory subscriber limit
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 1024;

/// Farewell written to every subscriber when the daemon stops
pub const DEFAULT_SHUTDOWN_MESSAGE: &str = "server finished";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration of the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address both listeners bind to
    pub bind_address: IpAddr,

    /// Port of the HTTP control endpoint
    pub control_port: u16,

    /// Port subscribers connect to
    pub subscription_port: u16,

    /// Connections beyond this many are turned away by the listener
    pub max_subscribers: usize,

    /// Farewell written to every subscriber on shutdown
    pub shutdown_message: String,

    /// How long shutdown waits for read loops to finish
    pub shutdown_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            control_port: DEFAULT_CONTROL_PORT,
            subscription_port: DEFAULT_SUBSCRIPTION_PORT,
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            shutdown_message: DEFAULT_SHUTDOWN_MESSAGE.to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads defaults, the config file and the environment, then validates.
    ///
    /// `path` takes precedence over `HERALD_CONFIG`. Without either, only
    /// defaults and environment apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);

        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_vars(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `HERALD_*` overrides looked up through `lookup`.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(BIND_ENV) {
            self.bind_address = parse_var(BIND_ENV, &value)?;
        }
        if let Some(value) = lookup(CONTROL_PORT_ENV) {
            self.control_port = parse_var(CONTROL_PORT_ENV, &value)?;
        }
        if let Some(value) = lookup(SUBSCRIPTION_PORT_ENV) {
            self.subscription_port = parse_var(SUBSCRIPTION_PORT_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_SUBSCRIBERS_ENV) {
            self.max_subscribers = parse_var(MAX_SUBSCRIBERS_ENV, &value)?;
        }
        Ok(())
    }

    /// Rejects configurations the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_port != 0 && self.control_port == self.subscription_port {
            return Err(ConfigError::Invalid(format!(
                "control_port and subscription_port are both {}",
                self.control_port
            )));
        }
        if self.max_subscribers == 0 {
            return Err(ConfigError::Invalid(
                "max_subscribers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Address of the HTTP control endpoint.
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.control_port)
    }

    /// Address subscribers connect to.
    pub fn subscription_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.subscription_port)
    }

    /// Shutdown grace period for read loops.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_var<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.control_port, 4000);
        assert_eq!(config.subscription_port, 3000);
        assert_eq!(config.max_subscribers, 1024);
        assert_eq!(config.shutdown_message, "server finished");
        assert_eq!(config.control_addr().to_string(), "0.0.0.0:4000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("control_port = 8080\n").unwrap();
        assert_eq!(config.control_port, 8080);
        assert_eq!(config.subscription_port, DEFAULT_SUBSCRIPTION_PORT);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_toml_str("contrl_port = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_address = \"127.0.0.1\"").unwrap();
        writeln!(file, "max_subscribers = 8").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.subscription_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.max_subscribers, 8);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/herald.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/herald.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_vars(lookup_from(&[
                ("HERALD_CONTROL_PORT", "5000"),
                ("HERALD_SUBSCRIPTION_PORT", "5001"),
                ("HERALD_MAX_SUBSCRIBERS", "3"),
                ("HERALD_BIND", "127.0.0.1"),
            ]))
            .unwrap();

        assert_eq!(config.control_addr().to_string(), "127.0.0.1:5000");
        assert_eq!(config.subscription_addr().to_string(), "127.0.0.1:5001");
        assert_eq!(config.max_subscribers, 3);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();
        let err = config
            .apply_vars(lookup_from(&[("HERALD_CONTROL_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == "HERALD_CONTROL_PORT"));
    }

    #[test]
    fn test_same_ports_rejected() {
        let config = Config {
            control_port: 3000,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_subscriber_limit_rejected() {
        let config = Config {
            max_subscribers: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
