//! Record shapes emitted by the probe
//!
//! The wire format has no type tag. A record's kind follows from which keys
//! it carries, checked in a fixed priority order: `bytes`, `rtt`, `version`,
//! `error`. Once the kind is known the object is decoded into its typed
//! shape; type errors in the discriminating fields surface as violations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::ViolationKind;

/// Keys that must be present under `rtt` in a summary record
pub const RTT_FIELDS: [&str; 4] = ["min", "avg", "max", "mdev"];

/// Kind of a classified record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    EchoReply,
    SummaryStats,
    VersionInfo,
    ProbeError,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::EchoReply => "echo reply",
            RecordKind::SummaryStats => "summary",
            RecordKind::VersionInfo => "version",
            RecordKind::ProbeError => "probe error",
        };
        f.write_str(name)
    }
}

/// One reply to an echo request
#[derive(Debug, Clone, PartialEq)]
pub struct EchoReply {
    pub bytes: u64,
    /// Missing `seq` is left for the validator to report
    pub seq: Option<u64>,
}

/// An rtt statistic; the probe prints these as preformatted strings, other
/// implementations use plain numbers
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RttValue {
    Number(f64),
    Text(String),
}

/// Terminal statistics of an echo run
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub transmitted: Option<u64>,
    pub received: Option<u64>,
    /// The `rtt` object as emitted; field presence is checked by the validator
    pub rtt: Map<String, Value>,
}

impl SummaryStats {
    /// First required rtt field that is absent, if any
    pub fn missing_rtt_field(&self) -> Option<&'static str> {
        RTT_FIELDS.into_iter().find(|name| !self.rtt.contains_key(*name))
    }

    /// Decode one rtt field
    pub fn rtt_value(&self, name: &str) -> Option<RttValue> {
        self.rtt
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Version report
#[derive(Debug, Clone, PartialEq)]
pub struct VersionInfo {
    pub version: String,
}

/// Structured error reported by the probe itself
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProbeError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(rename = "error", default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<i64>,
}

/// A decoded record
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    EchoReply(EchoReply),
    SummaryStats(SummaryStats),
    VersionInfo(VersionInfo),
    ProbeError(ProbeError),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::EchoReply(_) => RecordKind::EchoReply,
            Record::SummaryStats(_) => RecordKind::SummaryStats,
            Record::VersionInfo(_) => RecordKind::VersionInfo,
            Record::ProbeError(_) => RecordKind::ProbeError,
        }
    }

    /// Classify a JSON object by its keys
    pub fn classify(obj: &Map<String, Value>) -> Result<RecordKind, ViolationKind> {
        let has = |key: &str| obj.contains_key(key);

        if has("bytes") && has("rtt") {
            return Err(ViolationKind::schema(
                "ambiguous record kind: carries both `bytes` and `rtt`",
            ));
        }

        if has("bytes") {
            Ok(RecordKind::EchoReply)
        } else if has("rtt") {
            Ok(RecordKind::SummaryStats)
        } else if has("version") {
            Ok(RecordKind::VersionInfo)
        } else if has("error") {
            Ok(RecordKind::ProbeError)
        } else {
            Err(ViolationKind::schema("unrecognized record kind"))
        }
    }

    /// Classify and decode a JSON object
    pub fn decode(obj: &Map<String, Value>) -> Result<Self, ViolationKind> {
        Self::decode_as(Self::classify(obj)?, obj)
    }

    /// Decode a JSON object already classified as `kind`
    pub fn decode_as(kind: RecordKind, obj: &Map<String, Value>) -> Result<Self, ViolationKind> {
        match kind {
            RecordKind::EchoReply => Ok(Record::EchoReply(EchoReply {
                bytes: required_uint(obj, "bytes")?,
                seq: optional_uint(obj, "seq")?,
            })),
            RecordKind::SummaryStats => {
                let rtt = match obj.get("rtt") {
                    Some(Value::Object(rtt)) => rtt.clone(),
                    Some(other) => {
                        return Err(ViolationKind::mismatch("rtt", "an object", other));
                    }
                    None => return Err(ViolationKind::missing("rtt")),
                };
                Ok(Record::SummaryStats(SummaryStats {
                    transmitted: optional_uint(obj, "transmitted")?,
                    received: optional_uint(obj, "received")?,
                    rtt,
                }))
            }
            RecordKind::VersionInfo => match obj.get("version") {
                Some(Value::String(v)) if !v.is_empty() => {
                    Ok(Record::VersionInfo(VersionInfo { version: v.clone() }))
                }
                Some(other) => Err(ViolationKind::mismatch(
                    "version",
                    "a non-empty string",
                    other,
                )),
                None => Err(ViolationKind::missing("version")),
            },
            RecordKind::ProbeError => {
                let body = obj.get("error").cloned().unwrap_or(Value::Null);
                let err = match body {
                    Value::Object(_) => serde_json::from_value(body).map_err(|e| {
                        ViolationKind::schema(format!("malformed error record: {e}"))
                    })?,
                    // Some builds emit a bare message string
                    Value::String(message) => ProbeError {
                        error_type: String::new(),
                        message,
                        status: None,
                    },
                    other => {
                        return Err(ViolationKind::mismatch(
                            "error",
                            "an object or string",
                            &other,
                        ))
                    }
                };
                Ok(Record::ProbeError(err))
            }
        }
    }
}

fn required_uint(obj: &Map<String, Value>, key: &str) -> Result<u64, ViolationKind> {
    optional_uint(obj, key)?.ok_or_else(|| ViolationKind::missing(key))
}

fn optional_uint(obj: &Map<String, Value>, key: &str) -> Result<Option<u64>, ViolationKind> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| ViolationKind::mismatch(key, "a non-negative integer", v)),
    }
}
