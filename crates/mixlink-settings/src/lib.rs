//! MixLink Settings Crate
//!
//! Handles the link configuration file: defaults, load/save, validation.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, AUTO_PORT};
pub use error::{ConfigError, SettingsError, SettingsResult};
