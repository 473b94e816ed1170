//! Scenario configuration types
//!
//! A scenario file replaces the built-in variants with its own list.
//!
//! ```yaml
//! name: loopback
//! probe: ../builddir/ping/ping
//! variants:
//!   - name: ipv4-five
//!     count: 5
//!     targets: ["-4", "localhost"]
//!   - name: version
//!     mode: version
//!     targets: ["-V"]
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::probe::{RunMode, RunSpec, DEFAULT_FLAGS};

/// A scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct Scenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario covers
    pub description: Option<String>,
    /// Probe binary, relative paths resolve against the scenario file
    pub probe: Option<PathBuf>,
    /// Runs to execute, in order
    pub variants: Vec<VariantConfig>,
}

/// One run in a scenario
#[derive(Deserialize, Debug)]
pub struct VariantConfig {
    /// Name shown in reports
    pub name: String,
    /// Short options joined into the flags token, without the dash
    #[serde(default = "default_flags")]
    pub flags: String,
    /// Echo count; falls back to the harness default
    pub count: Option<u32>,
    /// Arguments after the count
    #[serde(default)]
    pub targets: Vec<String>,
    /// Expected output shape
    #[serde(default)]
    pub mode: RunMode,
    /// Expected `bytes` in every reply; falls back to the harness default
    pub payload_size: Option<u64>,
}

fn default_flags() -> String {
    DEFAULT_FLAGS.iter().collect()
}

/// Values a scenario inherits when it does not set them
#[derive(Debug, Clone)]
pub struct RunDefaults {
    pub probe: PathBuf,
    pub count: u32,
    pub payload_size: u64,
}

impl Scenario {
    /// Load and parse a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read scenario '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse scenario: {}", e)))?;
        if scenario.variants.is_empty() {
            return Err(Error::Config(format!(
                "Scenario '{}' defines no variants",
                scenario.name
            )));
        }
        Ok(scenario)
    }

    /// Build the run specs, resolving relative probe paths against `base_dir`
    pub fn run_specs(&self, base_dir: &Path, defaults: &RunDefaults) -> Result<Vec<RunSpec>> {
        let probe = match &self.probe {
            Some(p) if p.is_relative() && p.components().count() > 1 => base_dir.join(p),
            Some(p) => p.clone(),
            None => defaults.probe.clone(),
        };

        self.variants
            .iter()
            .map(|variant| {
                if variant.flags.is_empty() || variant.flags.starts_with('-') {
                    return Err(Error::Config(format!(
                        "Variant '{}': flags must be option letters without a dash, got '{}'",
                        variant.name, variant.flags
                    )));
                }
                Ok(RunSpec {
                    name: variant.name.clone(),
                    binary: probe.clone(),
                    flags: variant.flags.chars().collect(),
                    count: variant.count.unwrap_or(defaults.count),
                    target_args: variant.targets.clone(),
                    mode: variant.mode,
                    payload_size: variant.payload_size.unwrap_or(defaults.payload_size),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RunDefaults {
        RunDefaults {
            probe: PathBuf::from("ping"),
            count: 3,
            payload_size: 64,
        }
    }

    #[test]
    fn test_parse_scenario_with_defaults() {
        let scenario = Scenario::parse(
            r#"
name: loopback
probe: ../builddir/ping/ping
variants:
  - name: ipv4-five
    count: 5
    targets: ["-4", "localhost"]
  - name: version
    mode: version
    targets: ["-V"]
"#,
        )
        .unwrap();

        let specs = scenario.run_specs(Path::new("/src/tests"), &defaults()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].binary, PathBuf::from("/src/tests/../builddir/ping/ping"));
        assert_eq!(specs[0].args(), ["-jc", "5", "-4", "localhost"]);
        assert_eq!(specs[0].payload_size, 64);
        assert_eq!(specs[1].mode, RunMode::Version);
        assert_eq!(specs[1].count, 3);
    }

    #[test]
    fn test_bare_probe_name_is_not_joined() {
        let scenario = Scenario::parse(
            "name: s\nprobe: ping\nvariants:\n  - name: v6\n    targets: ['::1']\n",
        )
        .unwrap();
        let specs = scenario.run_specs(Path::new("/tmp"), &defaults()).unwrap();
        assert_eq!(specs[0].binary, PathBuf::from("ping"));
    }

    #[test]
    fn test_empty_variants_rejected() {
        let err = Scenario::parse("name: empty\nvariants: []\n").unwrap_err();
        assert!(err.to_string().contains("no variants"));
    }

    #[test]
    fn test_dashed_flags_rejected() {
        let scenario =
            Scenario::parse("name: s\nvariants:\n  - name: bad\n    flags: '-jc'\n").unwrap();
        assert!(scenario.run_specs(Path::new("."), &defaults()).is_err());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err =
            Scenario::parse("name: s\nvariants:\n  - name: x\n    mode: flood\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
