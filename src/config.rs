//! Configuration for wstelnet.
//!
//! Loaded from `~/.wstelnet/config.toml`; every field is optional:
//!
//! ```toml
//! # Remote endpoint
//! host = "bbs.example.org"
//! port = 23
//! encrypt = false
//!
//! # Identity reported during terminal-type negotiation
//! terminal_type = "VT100"
//!
//! # trace, debug, info, warn, error
//! log_level = "info"
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::telnet::DEFAULT_TERMINAL_TYPE;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote host
    pub host: String,
    /// Remote port
    pub port: u16,
    /// Use the encrypted scheme
    pub encrypt: bool,
    /// Terminal identity
    pub terminal_type: String,
    /// Log level filter
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 23,
            encrypt: false,
            terminal_type: DEFAULT_TERMINAL_TYPE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) if path.exists() => match fs::read_to_string(&path) {
                Ok(content) => Self::parse(&content),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Parse TOML, falling back to defaults when it is invalid
    pub fn parse(content: &str) -> Self {
        toml::from_str(content).unwrap_or_else(|e| {
            warn!("Invalid config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), String> {
        let path = Self::get_config_path().ok_or("Could not determine config path")?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))
    }

    /// `~/.wstelnet`, where config and log live
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".wstelnet"))
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::parse("host = \"bbs.example.org\"\nport = 2323\n");
        assert_eq!(config.host, "bbs.example.org");
        assert_eq!(config.port, 2323);
        assert!(!config.encrypt);
        assert_eq!(config.terminal_type, "VT100");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_config_falls_back() {
        assert_eq!(Config::parse("port = \"twenty-three\""), Config::default());
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = Config {
            encrypt: true,
            terminal_type: "XTERM".to_string(),
            ..Config::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::parse(&text), config);
    }
}
