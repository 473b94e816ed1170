//! Conformance harness for the JSON Lines output of ping-style probes
//!
//! The probe is run once per variant (IPv4 echo, IPv6 echo, version query)
//! and each line it prints is classified and checked: echo replies must
//! carry the expected payload size and consecutive sequence numbers, the
//! summary must account for every request, and a version query must
//! report a version.

pub mod cli;
pub mod commands;
pub mod common;
pub mod probe;
pub mod testing;
pub mod validate;

pub use common::{Error, Result};
pub use probe::{RunMode, RunSpec};
pub use testing::{RunReport, Verdict};
pub use validate::{RecordKind, RunState, Violation, ViolationKind};
