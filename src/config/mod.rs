// ABOUTME: Configuration types and parsing for dockutil.yml.
// ABOUTME: Handles YAML parsing, defaults, file discovery and environment overrides.

mod retry;

pub use retry::RetryConfig;

use crate::docker::ClientOptions;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "dockutil.yml";
pub const CONFIG_FILENAME_ALT: &str = "dockutil.yaml";

/// Overrides `query_timeout` with a humantime duration such as `2s` or `1500ms`.
pub const ENV_QUERY_TIMEOUT: &str = "DOCKUTIL_QUERY_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_query_timeout", with = "humantime_serde")]
    pub query_timeout: Duration,

    #[serde(default = "default_inspect_cache_ttl", with = "humantime_serde")]
    pub inspect_cache_ttl: Duration,

    #[serde(default = "default_inspect_cache_capacity")]
    pub inspect_cache_capacity: usize,

    #[serde(default = "default_true")]
    pub collect_network: bool,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Daemon address (`unix:///var/run/docker.sock`, `tcp://host:2375`).
    /// Falls back to DOCKER_HOST, then the local socket.
    #[serde(default)]
    pub docker_host: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_timeout: default_query_timeout(),
            inspect_cache_ttl: default_inspect_cache_ttl(),
            inspect_cache_capacity: default_inspect_cache_capacity(),
            collect_network: true,
            retry: RetryConfig::default(),
            docker_host: None,
        }
    }
}

fn default_query_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_inspect_cache_ttl() -> Duration {
    Duration::from_secs(10)
}

fn default_inspect_cache_capacity() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the config file in `dir`, or defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Apply environment overrides on top of file values.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(ENV_QUERY_TIMEOUT) {
            self.query_timeout = humantime::parse_duration(value.trim()).map_err(|e| {
                Error::InvalidConfig(format!("{ENV_QUERY_TIMEOUT}={value}: {e}"))
            })?;
            self.validate()?;
        }
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.query_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "query_timeout must be greater than zero".to_string(),
            ));
        }
        if self.inspect_cache_capacity == 0 {
            return Err(Error::InvalidConfig(
                "inspect_cache_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            query_timeout: self.query_timeout,
            inspect_cache_ttl: self.inspect_cache_ttl,
            inspect_cache_capacity: self.inspect_cache_capacity,
            collect_network: self.collect_network,
            retry: self.retry.policy(),
        }
    }
}
