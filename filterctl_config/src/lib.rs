//! Endpoint-list parsing and the optional startup configuration file.
//!
//! Everything in the startup TOML can also be set at runtime through the
//! control channel; the file just provides initial values.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid endpoint '{0}': expected host:port")]
    Endpoint(String),
    #[error("no subscribe endpoints given")]
    NoEndpoints,
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One `host:port` data endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse a comma-separated `host:port` list, e.g. `127.0.0.1:10009,127.0.0.1:10019`.
pub fn parse_endpoints(list: &str) -> Result<Vec<Endpoint>, ConfigError> {
    let mut endpoints = Vec::new();
    for entry in list.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (host, port) = entry
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::Endpoint(entry.to_string()))?;
        if host.is_empty() {
            return Err(ConfigError::Endpoint(entry.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::Endpoint(entry.to_string()))?;
        endpoints.push(Endpoint {
            host: host.to_string(),
            port,
        });
    }
    if endpoints.is_empty() {
        return Err(ConfigError::NoEndpoints);
    }
    Ok(endpoints)
}

/// Initial per-filter positions, motor coordinates.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Positions {
    #[serde(rename = "in")]
    pub in_beam: [i32; 4],
    #[serde(rename = "out")]
    pub out_beam: [i32; 4],
}

impl Default for Positions {
    fn default() -> Self {
        Self {
            in_beam: [0; 4],
            out_beam: [0; 4],
        }
    }
}

/// Initial pixel-count thresholds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub low1: u64,
    pub low2: u64,
    pub high1: u64,
    pub high2: u64,
    pub high3: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low1: 2,
            low2: 2,
            high1: 2,
            high2: 2,
            high3: 2,
        }
    }
}

/// Startup configuration. All fields optional; runtime `configure` commands
/// take precedence once the engine is serving.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StartupConfig {
    /// 0 = manual, 1 = continuous, 2 = singleshot.
    pub mode: Option<u8>,
    /// Data-starvation timeout, seconds.
    pub timeout: Option<f64>,
    pub positions: Positions,
    pub thresholds: Thresholds,
}

impl StartupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mode) = self.mode {
            if mode > 2 {
                return Err(ConfigError::Invalid(format!(
                    "mode must be 0, 1 or 2, got {mode}"
                )));
            }
        }
        if let Some(timeout) = self.timeout {
            if !timeout.is_finite() || timeout < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "timeout must be >= 0, got {timeout}"
                )));
            }
        }
        Ok(())
    }
}

pub fn load_toml(s: &str) -> Result<StartupConfig, ConfigError> {
    let config: StartupConfig = toml::from_str(s)?;
    config.validate()?;
    Ok(config)
}

pub fn load_file(path: &Path) -> Result<StartupConfig, ConfigError> {
    load_toml(&std::fs::read_to_string(path)?)
}
