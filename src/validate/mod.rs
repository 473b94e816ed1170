//! Record validation
//!
//! A [`RunState`] consumes the probe's output one line at a time, decodes
//! each line into a [`Record`] and checks it against the run's expectations.
//! State is owned per run, so independent runs never share counters.

mod record;

pub use record::{
    EchoReply, ProbeError, Record, RecordKind, RttValue, SummaryStats, VersionInfo, RTT_FIELDS,
};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::common::truncate_for_display;
use crate::probe::{RunMode, RunSpec};

/// Longest raw line kept on a violation
const MAX_RAW_LEN: usize = 200;

/// What went wrong with a record, or with the run as a whole
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationKind {
    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("Schema violation: {reason}")]
    SchemaViolation { reason: String },

    #[error("Field '{field}' mismatch: expected {expected}, got {actual}")]
    FieldMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Missing field '{field}'")]
    MissingField { field: String },

    #[error("Sequence violation: expected seq {expected}, got {actual}")]
    SequenceViolation { expected: u64, actual: u64 },

    #[error("Incomplete run: {reason}")]
    IncompleteRun { reason: String },

    #[error("Probe reported error{}: {message}", fmt_error_type(.error_type))]
    ProbeReported {
        error_type: String,
        message: String,
        status: Option<i64>,
    },
}

fn fmt_error_type(error_type: &str) -> String {
    if error_type.is_empty() {
        String::new()
    } else {
        format!(" ({error_type})")
    }
}

impl ViolationKind {
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            reason: reason.into(),
        }
    }

    pub fn mismatch(field: &str, expected: impl ToString, actual: impl ToString) -> Self {
        Self::FieldMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    pub fn incomplete(reason: impl Into<String>) -> Self {
        Self::IncompleteRun {
            reason: reason.into(),
        }
    }

    /// Stable identifier for machine-readable reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedRecord { .. } => "MALFORMED_RECORD",
            Self::SchemaViolation { .. } => "SCHEMA_VIOLATION",
            Self::FieldMismatch { .. } => "FIELD_MISMATCH",
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::SequenceViolation { .. } => "SEQUENCE_VIOLATION",
            Self::IncompleteRun { .. } => "INCOMPLETE_RUN",
            Self::ProbeReported { .. } => "PROBE_REPORTED",
        }
    }
}

/// A violation located in the probe's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// 1-based output line, `None` for end-of-stream checks
    pub line: Option<usize>,
    /// Offending line text, truncated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.kind)?,
            None => write!(f, "end of output: {}", self.kind)?,
        }
        if let Some(raw) = &self.raw {
            write!(f, " [{raw}]")?;
        }
        Ok(())
    }
}

/// Progress of a run through its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No line consumed yet
    Start,
    /// At least one line consumed
    Collecting,
    /// A version record has been observed
    VersionSeen,
    /// Stream exhausted and end-of-run checks applied
    Completed,
}

/// Per-run validation state
#[derive(Debug, Clone)]
pub struct RunState {
    mode: RunMode,
    count: u32,
    payload_size: u64,
    phase: Phase,
    lines: usize,
    echo_replies: u64,
    version_seen: bool,
    summary_seen: bool,
    received: Option<u64>,
    records: BTreeMap<RecordKind, usize>,
    violations: Vec<Violation>,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub lines: usize,
    /// `received` from the summary record, when one was seen
    pub received: Option<u64>,
    pub records: BTreeMap<RecordKind, usize>,
    pub violations: Vec<Violation>,
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

impl RunState {
    pub fn new(mode: RunMode, count: u32, payload_size: u64) -> Self {
        Self {
            mode,
            count,
            payload_size,
            phase: Phase::Start,
            lines: 0,
            echo_replies: 0,
            version_seen: false,
            summary_seen: false,
            received: None,
            records: BTreeMap::new(),
            violations: Vec::new(),
        }
    }

    /// State configured for the given run
    pub fn for_spec(spec: &RunSpec) -> Self {
        Self::new(spec.mode, spec.count, spec.payload_size)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn version_seen(&self) -> bool {
        self.version_seen
    }

    pub fn echo_replies(&self) -> u64 {
        self.echo_replies
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Validate one output line, given without its terminator
    ///
    /// Every violation is also recorded in the state, so the caller may stop
    /// at the first one or keep going and collect them all. Bytes that are
    /// not UTF-8 make the line malformed.
    pub fn validate(&mut self, line: impl AsRef<[u8]>) -> Result<RecordKind, Violation> {
        let line = line.as_ref();
        self.lines += 1;
        if self.phase == Phase::Start {
            self.phase = Phase::Collecting;
        }

        match self.check_line(line) {
            Ok(kind) => {
                *self.records.entry(kind).or_default() += 1;
                Ok(kind)
            }
            Err(kind) => {
                let violation = Violation {
                    line: Some(self.lines),
                    raw: Some(truncate_for_display(
                        &String::from_utf8_lossy(line),
                        MAX_RAW_LEN,
                    )),
                    kind,
                };
                tracing::debug!(%violation, "record failed validation");
                self.violations.push(violation.clone());
                Err(violation)
            }
        }
    }

    fn check_line(&mut self, line: &[u8]) -> Result<RecordKind, ViolationKind> {
        let value: serde_json::Value =
            serde_json::from_slice(line).map_err(|e| ViolationKind::MalformedRecord {
                reason: e.to_string(),
            })?;

        let serde_json::Value::Object(obj) = value else {
            return Err(ViolationKind::schema("not an object"));
        };

        let kind = Record::classify(&obj)?;

        // In version mode the probe prints nothing but the version object
        if self.mode == RunMode::Version
            && !matches!(kind, RecordKind::VersionInfo | RecordKind::ProbeError)
        {
            return Err(ViolationKind::missing("version"));
        }

        // Count before decoding so one bad reply does not shift every later seq
        if kind == RecordKind::EchoReply {
            self.echo_replies += 1;
        }

        let record = Record::decode_as(kind, &obj)?;

        match record {
            Record::EchoReply(reply) => self.check_echo_reply(&reply)?,
            Record::SummaryStats(stats) => self.check_summary(&stats)?,
            Record::VersionInfo(info) => {
                tracing::debug!(version = %info.version, "probe version");
                self.version_seen = true;
                self.phase = Phase::VersionSeen;
            }
            Record::ProbeError(err) => {
                return Err(ViolationKind::ProbeReported {
                    error_type: err.error_type,
                    message: err.message,
                    status: err.status,
                });
            }
        }

        Ok(kind)
    }

    fn check_echo_reply(&self, reply: &EchoReply) -> Result<(), ViolationKind> {
        if reply.bytes != self.payload_size {
            return Err(ViolationKind::mismatch(
                "bytes",
                self.payload_size,
                reply.bytes,
            ));
        }

        let seq = reply.seq.ok_or_else(|| ViolationKind::missing("seq"))?;
        if seq != self.echo_replies {
            return Err(ViolationKind::SequenceViolation {
                expected: self.echo_replies,
                actual: seq,
            });
        }
        Ok(())
    }

    fn check_summary(&mut self, stats: &SummaryStats) -> Result<(), ViolationKind> {
        if self.summary_seen {
            return Err(ViolationKind::schema("duplicate summary record"));
        }
        self.summary_seen = true;
        self.received = stats.received;

        let transmitted = stats
            .transmitted
            .ok_or_else(|| ViolationKind::missing("transmitted"))?;
        if transmitted != u64::from(self.count) {
            return Err(ViolationKind::mismatch(
                "transmitted",
                self.count,
                transmitted,
            ));
        }

        if let Some(name) = stats.missing_rtt_field() {
            return Err(ViolationKind::missing(&format!("rtt.{name}")));
        }
        for name in RTT_FIELDS {
            if stats.rtt_value(name).is_none() {
                let actual = stats.rtt.get(name).map(|v| v.to_string()).unwrap_or_default();
                return Err(ViolationKind::mismatch(
                    &format!("rtt.{name}"),
                    "a number or string",
                    actual,
                ));
            }
        }
        Ok(())
    }

    /// Close a run whose output was abandoned before the end
    ///
    /// End-of-stream checks are skipped since the stream was not exhausted.
    pub fn abort(mut self) -> ValidationOutcome {
        self.phase = Phase::Completed;
        self.into_outcome()
    }

    fn into_outcome(self) -> ValidationOutcome {
        ValidationOutcome {
            lines: self.lines,
            received: self.received,
            records: self.records,
            violations: self.violations,
        }
    }

    /// Apply end-of-stream checks and close the run
    pub fn finish(mut self) -> ValidationOutcome {
        let missing = match self.mode {
            RunMode::Version if !self.version_seen => Some("no version record was emitted"),
            RunMode::Echo if !self.summary_seen => Some("no summary record was emitted"),
            _ => None,
        };
        if let Some(reason) = missing {
            self.violations.push(Violation {
                line: None,
                raw: None,
                kind: ViolationKind::incomplete(reason),
            });
        }
        self.phase = Phase::Completed;
        self.into_outcome()
    }
}
