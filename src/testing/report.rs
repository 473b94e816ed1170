//! Run reports and verdicts

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::probe::{ProbeExit, RunMode, RunSpec};
use crate::validate::{RecordKind, ValidationOutcome, Violation};

/// Exit code for a skipped invocation, as understood by automake-style runners
pub const EXIT_SKIPPED: i32 = 77;

/// Final determination for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    Skipped,
}

impl Verdict {
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
            Verdict::Skipped => EXIT_SKIPPED,
        }
    }

    /// Combined verdict of several runs: any failure fails, all skipped skips
    pub fn overall(reports: &[RunReport]) -> Verdict {
        if reports.iter().any(|r| r.verdict == Verdict::Fail) {
            Verdict::Fail
        } else if !reports.is_empty() && reports.iter().all(|r| r.verdict == Verdict::Skipped) {
            Verdict::Skipped
        } else {
            Verdict::Pass
        }
    }
}

/// Everything known about one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub variant: String,
    pub command: String,
    pub mode: RunMode,
    pub verdict: Verdict,
    /// Why the run did not pass, when it did not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub lines: usize,
    /// Replies the probe counted as received, from its summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<u64>,
    pub records: BTreeMap<RecordKind, usize>,
    pub violations: Vec<Violation>,
    /// Probe exit code; `None` if it never ran, was killed, or output was captured
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stderr_tail: Vec<String>,
}

impl RunReport {
    /// Build a report from a validation outcome
    ///
    /// `error` is a harness-level failure (launch, timeout, read error) that
    /// fails the run regardless of the records seen.
    pub fn new(
        spec: &RunSpec,
        outcome: ValidationOutcome,
        exit: Option<ProbeExit>,
        error: Option<String>,
    ) -> Self {
        let passed = error.is_none() && outcome.passed();
        let reason = error.or_else(|| outcome.violations.first().map(|v| v.to_string()));
        let (exit_code, stderr_tail) = match exit {
            Some(exit) => (exit.code, exit.stderr_tail),
            None => (None, Vec::new()),
        };

        Self {
            variant: spec.name.clone(),
            command: spec.command_line(),
            mode: spec.mode,
            verdict: if passed { Verdict::Pass } else { Verdict::Fail },
            reason,
            lines: outcome.lines,
            received: outcome.received,
            records: outcome.records,
            violations: outcome.violations,
            exit_code,
            stderr_tail,
        }
    }

    /// Report for a run that failed before producing any output
    pub fn failed(spec: &RunSpec, reason: String) -> Self {
        Self::new(
            spec,
            ValidationOutcome {
                lines: 0,
                received: None,
                records: BTreeMap::new(),
                violations: Vec::new(),
            },
            None,
            Some(reason),
        )
    }

    /// Report for a run that was never started
    pub fn skipped(spec: &RunSpec, reason: &str) -> Self {
        let mut report = Self::failed(spec, reason.to_string());
        report.verdict = Verdict::Skipped;
        report
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Print one report in human-readable form
pub fn print_report(report: &RunReport, verbose: bool) {
    println!(
        "\n{} {}",
        "Variant:".blue().bold(),
        report.variant.white().bold()
    );
    println!("  $ {}", report.command.dimmed());

    if verbose || !report.records.is_empty() {
        let counts: Vec<String> = report
            .records
            .iter()
            .map(|(kind, n)| format!("{n} {kind}"))
            .collect();
        println!(
            "  {} lines: {}",
            report.lines,
            if counts.is_empty() {
                "no records".to_string()
            } else {
                counts.join(", ")
            }
        );
    }

    if let Some(received) = report.received {
        println!("  received: {}", received);
    }

    for violation in &report.violations {
        println!("  {} {}", "✗".red(), violation);
    }

    if report.violations.is_empty() {
        if let Some(reason) = &report.reason {
            let mark = match report.verdict {
                Verdict::Skipped => "-".yellow(),
                _ => "✗".red(),
            };
            println!("  {} {}", mark, reason);
        }
    }

    if let Some(code) = report.exit_code {
        if verbose || code != 0 {
            println!("  probe exit code: {}", code);
        }
    }

    if !report.passed() || verbose {
        for line in &report.stderr_tail {
            println!("  {} {}", "stderr:".dimmed(), line.dimmed());
        }
    }

    match report.verdict {
        Verdict::Pass => println!("  {} {}", "✓".green(), "PASS".green().bold()),
        Verdict::Fail => println!("  {} {}", "✗".red(), "FAIL".red().bold()),
        Verdict::Skipped => println!("  {} {}", "-".yellow(), "SKIPPED".yellow().bold()),
    }
}

/// Print the closing summary line
pub fn print_summary(reports: &[RunReport]) {
    let count = |v: Verdict| reports.iter().filter(|r| r.verdict == v).count();
    let line = format!(
        "{} passed, {} failed, {} skipped",
        count(Verdict::Pass),
        count(Verdict::Fail),
        count(Verdict::Skipped)
    );

    match Verdict::overall(reports) {
        Verdict::Pass => println!("\n{} {}\n", "✓".green().bold(), line.green().bold()),
        Verdict::Fail => println!("\n{} {}\n", "✗".red().bold(), line.red().bold()),
        Verdict::Skipped => println!("\n{} {}\n", "-".yellow().bold(), line.yellow().bold()),
    }
}
