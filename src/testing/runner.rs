//! Run orchestration
//!
//! Ties the probe invoker to a [`RunState`] for each variant and turns the
//! result into a [`RunReport`].

use std::time::Duration;

use futures_util::future::join_all;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{timeout_at, Instant};
use tracing::Instrument;

use super::report::{RunReport, Verdict};
use crate::common::{Error, Result};
use crate::probe::{launch, trim_line_ending, ProbeLines, RunSpec};
use crate::validate::RunState;

/// What to do after the first violation of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop reading and kill the probe
    FailFast,
    /// Keep reading and report every violation
    #[default]
    Accumulate,
}

/// Settings shared by every run of an invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy: FailurePolicy,
    /// Upper bound from launch to exit
    pub timeout: Duration,
    pub stderr_tail_lines: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::default(),
            timeout: Duration::from_secs(30),
            stderr_tail_lines: 10,
        }
    }
}

/// Where the validated lines come from, as raw bytes without terminators
trait LineSource {
    async fn next_record_line(&mut self) -> Result<Option<Vec<u8>>>;
}

impl LineSource for ProbeLines {
    async fn next_record_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.next_line().await
    }
}

impl<R: AsyncBufRead + Unpin> LineSource for tokio::io::Split<R> {
    async fn next_record_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = self.next_segment().await?;
        if let Some(line) = line.as_mut() {
            trim_line_ending(line);
        }
        Ok(line)
    }
}

/// Why [`drive`] stopped reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Exhausted,
    FirstViolation,
}

async fn drive<S: LineSource>(
    source: &mut S,
    state: &mut RunState,
    policy: FailurePolicy,
) -> Result<Stop> {
    while let Some(line) = source.next_record_line().await? {
        tracing::trace!(line = %String::from_utf8_lossy(&line), "probe output");
        if state.validate(&line).is_err() && policy == FailurePolicy::FailFast {
            return Ok(Stop::FirstViolation);
        }
    }
    Ok(Stop::Exhausted)
}

/// Run one variant against the probe
///
/// Never returns an error: launch failures and timeouts become a failing
/// report so every variant gets a verdict.
pub async fn run_variant(spec: &RunSpec, options: &RunOptions) -> RunReport {
    let report = execute(spec, options)
        .instrument(tracing::info_span!("run", variant = %spec.name))
        .await;

    match report.verdict {
        Verdict::Pass => tracing::info!(variant = %spec.name, lines = report.lines, "run passed"),
        _ => tracing::warn!(
            variant = %spec.name,
            reason = report.reason.as_deref().unwrap_or("unknown"),
            violations = report.violations.len(),
            "run failed"
        ),
    }
    report
}

async fn execute(spec: &RunSpec, options: &RunOptions) -> RunReport {
    let mut lines = match launch(spec, options.stderr_tail_lines) {
        Ok(lines) => lines,
        Err(e) => return RunReport::failed(spec, e.to_string()),
    };

    let deadline = Instant::now() + options.timeout;
    let mut state = RunState::for_spec(spec);
    let timed_out = || Error::Timeout(options.timeout.as_secs()).to_string();

    let driven = timeout_at(deadline, drive(&mut lines, &mut state, options.policy)).await;
    let stop = match driven {
        Ok(Ok(stop)) => stop,
        Ok(Err(e)) => {
            let exit = lines.kill().await;
            return RunReport::new(spec, state.abort(), Some(exit), Some(e.to_string()));
        }
        Err(_) => {
            let exit = lines.kill().await;
            return RunReport::new(spec, state.abort(), Some(exit), Some(timed_out()));
        }
    };

    match stop {
        Stop::FirstViolation => {
            let exit = lines.kill().await;
            RunReport::new(spec, state.abort(), Some(exit), None)
        }
        Stop::Exhausted => match timeout_at(deadline, lines.finish()).await {
            Ok(Ok(exit)) => RunReport::new(spec, state.finish(), Some(exit), None),
            Ok(Err(e)) => RunReport::new(spec, state.finish(), None, Some(e.to_string())),
            // Dropping the finish future kills the probe
            Err(_) => RunReport::new(spec, state.finish(), None, Some(timed_out())),
        },
    }
}

/// Run several variants, one after the other or all at once
///
/// Each run owns its own process and validation state.
pub async fn run_all(specs: &[RunSpec], options: &RunOptions, parallel: bool) -> Vec<RunReport> {
    if parallel {
        return join_all(specs.iter().map(|spec| run_variant(spec, options))).await;
    }

    let mut reports = Vec::with_capacity(specs.len());
    for spec in specs {
        reports.push(run_variant(spec, options).await);
    }
    reports
}

/// Validate output that was captured earlier
///
/// The same lines always produce the same report.
pub async fn check_captured<R: AsyncBufRead + Unpin>(
    reader: R,
    spec: &RunSpec,
    policy: FailurePolicy,
) -> Result<RunReport> {
    let mut lines = reader.split(b'\n');
    let mut state = RunState::for_spec(spec);

    let outcome = match drive(&mut lines, &mut state, policy).await? {
        Stop::Exhausted => state.finish(),
        Stop::FirstViolation => state.abort(),
    };
    Ok(RunReport::new(spec, outcome, None, None))
}
