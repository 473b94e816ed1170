//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations.

use std::path::PathBuf;

/// Name used for the configuration directory
const APP_NAME: &str = "probe-conform";

/// Environment variable that overrides the configuration file location
pub const CONFIG_ENV: &str = "PROBE_CONFORM_CONFIG";

/// Get the configuration directory path
///
/// - Linux: `~/.config/probe-conform/`
/// - macOS: `~/Library/Application Support/probe-conform/`
/// - Windows: `%APPDATA%\probe-conform\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
///
/// `$PROBE_CONFORM_CONFIG` wins over the platform default.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}
