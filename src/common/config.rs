//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Probe binary and invocation defaults
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Environment skip gate
    #[serde(default)]
    pub skip: SkipConfig,

    /// Report settings
    #[serde(default)]
    pub report: ReportConfig,
}

/// Probe invocation defaults
#[derive(Debug, Deserialize)]
pub struct ProbeConfig {
    /// Path or name of the probe executable
    #[serde(default = "default_probe_path")]
    pub path: PathBuf,

    /// Number of echo requests per run
    #[serde(default = "default_count")]
    pub count: u32,

    /// Payload size every echo reply must report
    #[serde(default = "default_payload_size")]
    pub payload_size: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: default_probe_path(),
            count: default_count(),
            payload_size: default_payload_size(),
        }
    }
}

fn default_probe_path() -> PathBuf {
    PathBuf::from("ping")
}
fn default_count() -> u32 {
    3
}
fn default_payload_size() -> u64 {
    64
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Upper bound for a single run, from launch to exit
    #[serde(default = "default_run_timeout")]
    pub run_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            run_secs: default_run_timeout(),
        }
    }
}

fn default_run_timeout() -> u64 {
    30
}

/// Environment gate that marks the whole invocation as skipped
#[derive(Debug, Deserialize)]
pub struct SkipConfig {
    /// Environment variable to inspect
    #[serde(default = "default_skip_env")]
    pub env_var: String,

    /// Value of `env_var` that triggers the skip
    #[serde(default = "default_skip_value")]
    pub value: String,
}

impl Default for SkipConfig {
    fn default() -> Self {
        Self {
            env_var: default_skip_env(),
            value: default_skip_value(),
        }
    }
}

fn default_skip_env() -> String {
    "VARIANT".to_string()
}
fn default_skip_value() -> String {
    "cross-compile".to_string()
}

impl SkipConfig {
    /// Whether the current environment asks for the harness to be skipped
    pub fn is_active(&self) -> bool {
        std::env::var(&self.env_var)
            .map(|v| v == self.value)
            .unwrap_or(false)
    }
}

/// Report settings
#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    /// Number of trailing probe stderr lines kept for diagnostics
    #[serde(default = "default_stderr_tail")]
    pub stderr_tail_lines: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            stderr_tail_lines: default_stderr_tail(),
        }
    }
}

fn default_stderr_tail() -> usize {
    10
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| super::Error::file_read(path, e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
