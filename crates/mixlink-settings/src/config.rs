//! Configuration for MixLink
//!
//! Provides configuration file handling and validation for the serial link.
//! Supports JSON and TOML file formats, stored by default in the platform's
//! config directory. Missing keys fall back to the defaults of the MASTER
//! firmware (115200 baud, 8N1, 100 ms read timeout).

use crate::error::{ConfigError, SettingsError, SettingsResult};
use mixlink_core::SerialParity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Port value that selects auto-detection
pub const AUTO_PORT: &str = "Auto";

const APP_DIR: &str = "mixlink";
const CONFIG_FILE: &str = "config.toml";

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Preferred port name, or "Auto" for detection
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Stop bits (1-2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Maximum bytes per read
    pub read_chunk_size: usize,
    /// Upper bound on waiting for a leftover handle, in milliseconds
    pub stale_handle_settle_ms: u64,
    /// Upper bound on waiting after close, in milliseconds
    pub close_settle_ms: u64,
    /// Port description keywords used by auto-detection
    pub detection_keywords: Vec<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rate: 115200,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            read_timeout_ms: 100,
            read_chunk_size: 1024,
            stale_handle_settle_ms: 300,
            close_settle_ms: 100,
            detection_keywords: ["arduino", "mega", "ch340", "ch341"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl ConnectionSettings {
    /// The configured port, or `None` when auto-detection is requested
    pub fn preferred_port(&self) -> Option<&str> {
        let port = self.port.trim();
        if port.is_empty() || port.eq_ignore_ascii_case(AUTO_PORT) {
            None
        } else {
            Some(port)
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("none").to_string()).into()),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no config directory on this platform".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from file, or defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let c = &self.connection;

        let positive = [
            ("connection.baud_rate", c.baud_rate as u64),
            ("connection.read_timeout_ms", c.read_timeout_ms),
            ("connection.read_chunk_size", c.read_chunk_size as u64),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(SettingsError::InvalidSetting {
                    key: key.to_string(),
                    reason: "must be > 0".to_string(),
                });
            }
        }

        if !(5..=8).contains(&c.data_bits) {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.data_bits".to_string(),
                value: c.data_bits.to_string(),
            }
            .into());
        }
        if !(1..=2).contains(&c.stop_bits) {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.stop_bits".to_string(),
                value: c.stop_bits.to_string(),
            }
            .into());
        }

        if c.detection_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(SettingsError::InvalidSetting {
                key: "connection.detection_keywords".to_string(),
                reason: "at least one keyword is required".to_string(),
            });
        }

        Ok(())
    }
}
