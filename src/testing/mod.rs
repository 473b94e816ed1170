//! Conformance runs
//!
//! Runs each variant against the probe (or re-validates captured output),
//! and reports a verdict per run. Scenario files may replace the built-in
//! variants.

mod config;
mod report;
mod runner;

pub use config::*;
pub use report::{print_report, print_summary, RunReport, Verdict, EXIT_SKIPPED};
pub use runner::{check_captured, run_all, run_variant, FailurePolicy, RunOptions};
