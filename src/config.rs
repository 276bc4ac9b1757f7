//! Agent configuration loading
//!
//! The configuration file is TOML with a single required field, the agent
//! name, and an optional broker table:
//!
//! ```toml
//! [agent]
//! name = "clock"
//!
//! [agent.broker]
//! host = "broker.example.org"
//! port = 1883
//! ```
//!
//! Loading is atomic: a configuration is either fully resolved (with defaults
//! filled in for the optional broker fields) or an error is returned and
//! nothing is committed.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Broker host used when the config file does not name one.
pub const DEFAULT_HOST: &str = "localhost";

/// Broker port used when the config file does not name one.
pub const DEFAULT_PORT: u16 = 1883;

/// Resolved agent configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Client name announced to the broker. Required, never empty.
    pub client_name: String,
    /// Broker host, `localhost` unless configured.
    pub host: String,
    /// Broker port, 1883 unless configured.
    pub port: u16,
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFailed(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("config file does not name the agent (missing agent.name)")]
    NoClientName,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    agent: Option<AgentTable>,
}

#[derive(Debug, Deserialize)]
struct AgentTable {
    name: Option<String>,
    #[serde(default)]
    broker: BrokerTable,
}

#[derive(Debug, Default, Deserialize)]
struct BrokerTable {
    host: Option<String>,
    port: Option<u16>,
}

impl AgentConfig {
    /// Load and resolve a configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let agent = file.agent.ok_or(ConfigError::NoClientName)?;

        let client_name = match agent.name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ConfigError::NoClientName),
        };

        let host = match agent.broker.host {
            Some(host) => host,
            None => {
                warn!(
                    default = DEFAULT_HOST,
                    "broker host not configured, using default"
                );
                DEFAULT_HOST.to_string()
            }
        };
        let port = agent.broker.port.unwrap_or(DEFAULT_PORT);

        Ok(AgentConfig {
            client_name,
            host,
            port,
        })
    }
}
