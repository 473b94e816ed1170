//! Run variants
//!
//! A [`RunSpec`] is the fixed argument template for one probe invocation:
//! `<binary> -<flags> <count> <target-args...>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Short options the built-in variants pass: JSON output and count
pub const DEFAULT_FLAGS: [char; 2] = ['j', 'c'];

/// What a run is expected to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Echo replies followed by one summary record
    #[default]
    Echo,
    /// A single version record
    Version,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            RunMode::Echo => "echo",
            RunMode::Version => "version",
        })
    }
}

/// One probe invocation and what its output must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSpec {
    /// Variant name used in reports (e.g. "ipv4")
    pub name: String,
    pub binary: PathBuf,
    /// Short options, joined into one token
    pub flags: Vec<char>,
    /// Number of echo requests, passed right after the flags token
    pub count: u32,
    pub target_args: Vec<String>,
    pub mode: RunMode,
    /// Size every echo reply must report in `bytes`
    pub payload_size: u64,
}

impl RunSpec {
    /// The single flags token, e.g. `-jc` for `{j, c}`
    ///
    /// Repeated options are dropped, first occurrence wins.
    pub fn flag_token(&self) -> String {
        let mut token = String::from("-");
        for flag in &self.flags {
            if !token[1..].contains(*flag) {
                token.push(*flag);
            }
        }
        token
    }

    /// Full argument vector passed to the probe
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.flag_token(), self.count.to_string()];
        args.extend(self.target_args.iter().cloned());
        args
    }

    /// Human-readable command line, for reports
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.binary.display().to_string()];
        parts.extend(self.args());
        parts.join(" ")
    }
}

/// Names of the built-in variants, in run order
pub const BUILTIN_VARIANTS: [&str; 3] = ["ipv4", "ipv6", "version"];

/// The built-in variants: IPv4 echo to `localhost`, IPv6 echo to `::1`, and
/// the version query
pub fn builtin_variants(binary: &Path, count: u32, payload_size: u64) -> Vec<RunSpec> {
    let spec = |name: &str, targets: &[&str], mode: RunMode| RunSpec {
        name: name.to_string(),
        binary: binary.to_path_buf(),
        flags: DEFAULT_FLAGS.to_vec(),
        count,
        target_args: targets.iter().map(|t| t.to_string()).collect(),
        mode,
        payload_size,
    };

    vec![
        spec("ipv4", &["-4", "localhost"], RunMode::Echo),
        spec("ipv6", &["::1"], RunMode::Echo),
        spec("version", &["-V"], RunMode::Version),
    ]
}
