//! Configuration management for powledger

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ChainError;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MiningConfig {
    /// Amount paid to this node for every block it mines.
    #[serde(default = "default_reward")]
    pub reward: u64,
    #[serde(default = "default_reward_enabled")]
    pub reward_enabled: bool,
    /// Start the background miner as soon as the node is up.
    #[serde(default)]
    pub autostart: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            reward: default_reward(),
            reward_enabled: default_reward_enabled(),
            autostart: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(&self) -> Result<(), ChainError> {
        if self.server.host.is_empty() {
            return Err(ChainError::ConfigError("server.host must not be empty".to_string()));
        }
        if self.mining.reward_enabled && self.mining.reward == 0 {
            return Err(ChainError::ConfigError(
                "mining.reward must be positive when mining.reward_enabled is set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `config.toml` from the working directory.
pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Load configuration from `path`, falling back to defaults when the file is
/// absent, then apply `HOST`/`PORT` environment overrides.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    let mut config: Config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)?
    } else {
        Config::default()
    };

    if let Ok(host) = std::env::var("HOST") {
        config.server.host = host;
    }
    if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
        config.server.port = port;
    }

    config.validate()?;
    Ok(config)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_reward() -> u64 {
    1
}

fn default_reward_enabled() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.mining.reward, 1);
        assert!(config.mining.reward_enabled);
        assert!(!config.mining.autostart);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[server]\nport = 6000\n").unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.mining, MiningConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nhost = \"127.0.0.1\"\n[mining]\nreward = 3\nautostart = true").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.mining.reward, 3);
        assert!(config.mining.autostart);
    }

    #[test]
    fn test_rejects_zero_reward() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(&path, "[mining]\nreward = 0\n").unwrap();

        assert!(matches!(load_config_from(&path), Err(ChainError::ConfigError(_))));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        assert!(matches!(load_config_from(&path), Err(ChainError::ConfigError(_))));
    }
}
