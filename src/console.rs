//! Operator console input handling

use std::path::PathBuf;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MIXLINK_CONFIG";

/// One line typed at the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Leave the console
    Quit,
    /// Nothing to send
    Blank,
    /// Forward to the MASTER as-is
    Send(String),
}

/// Interpret a console line
pub fn parse_line(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        ConsoleInput::Blank
    } else if trimmed.eq_ignore_ascii_case("quit") {
        ConsoleInput::Quit
    } else {
        ConsoleInput::Send(trimmed.to_string())
    }
}

/// Config file path from the environment, else the platform default
pub fn config_path(env_value: Option<String>) -> Option<PathBuf> {
    match env_value.filter(|v| !v.trim().is_empty()) {
        Some(path) => Some(PathBuf::from(path)),
        None => match crate::Config::default_path() {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        },
    }
}
