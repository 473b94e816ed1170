//! CLI command definitions
//!
//! Defines the clap commands for the harness.

use clap::Subcommand;
use std::path::PathBuf;

use crate::probe::RunMode;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the probe for each variant and validate its JSON output
    Run {
        /// Probe executable (default: from config, else `ping` on PATH)
        probe: Option<PathBuf>,

        /// Echo requests per run
        #[arg(long, short = 'c')]
        count: Option<u32>,

        /// Payload size every echo reply must report
        #[arg(long)]
        payload_size: Option<u64>,

        /// Only run the named variant(s); can be given multiple times
        #[arg(long)]
        only: Vec<String>,

        /// YAML scenario file replacing the built-in variants
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Stop a run at its first violation
        #[arg(long)]
        fail_fast: bool,

        /// Run all variants concurrently
        #[arg(long)]
        parallel: bool,

        /// Per-run timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate previously captured probe output
    Check {
        /// File with the captured output, or `-` for stdin
        path: PathBuf,

        /// What the output is expected to contain
        #[arg(long, value_enum, default_value_t = RunMode::Echo)]
        mode: RunMode,

        /// Echo count the probe was invoked with
        #[arg(long, short = 'c')]
        count: Option<u32>,

        /// Payload size every echo reply must report
        #[arg(long)]
        payload_size: Option<u64>,

        /// Stop at the first violation
        #[arg(long)]
        fail_fast: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in variants and their command lines
    Variants {
        /// Probe executable to show in the command lines
        probe: Option<PathBuf>,
    },
}
