//! Mock probe binary for integration testing
//!
//! Accepts the harness's argument template (`-jc <count> <targets...>`) and
//! prints ping-style JSON Lines without touching the network. Set
//! `MOCK_PROBE_FAULT` to make the output break in a specific way.

use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;

/// Deliberate defects, selected by `MOCK_PROBE_FAULT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    SeqGap,
    BadBytes,
    NoSummary,
    DuplicateSummary,
    Malformed,
    NotObject,
    WrongTransmitted,
    MissingRtt,
    NoVersion,
    ErrorRecord,
    Hang,
    HangChild,
    ExitNonZero,
    BadUtf8,
    NoTrailingNewline,
}

impl Fault {
    fn from_env() -> Self {
        match std::env::var("MOCK_PROBE_FAULT").as_deref() {
            Ok("seq_gap") => Fault::SeqGap,
            Ok("bad_bytes") => Fault::BadBytes,
            Ok("no_summary") => Fault::NoSummary,
            Ok("duplicate_summary") => Fault::DuplicateSummary,
            Ok("malformed") => Fault::Malformed,
            Ok("not_object") => Fault::NotObject,
            Ok("wrong_transmitted") => Fault::WrongTransmitted,
            Ok("missing_rtt") => Fault::MissingRtt,
            Ok("no_version") => Fault::NoVersion,
            Ok("error_record") => Fault::ErrorRecord,
            Ok("hang") => Fault::Hang,
            Ok("hang_child") => Fault::HangChild,
            Ok("bad_utf8") => Fault::BadUtf8,
            Ok("no_trailing_newline") => Fault::NoTrailingNewline,
            Ok("exit_nonzero") => Fault::ExitNonZero,
            _ => Fault::None,
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let fault = Fault::from_env();

    let json_output = args.first().is_some_and(|f| f.starts_with('-') && f.contains('j'));
    if !json_output {
        eprintln!("mock-probe: only JSON output (-j) is supported");
        std::process::exit(2);
    }

    let count: u64 = match args.get(1).and_then(|c| c.parse().ok()) {
        Some(count) => count,
        None => {
            eprintln!("mock-probe: expected a count after the flags");
            std::process::exit(2);
        }
    };
    let targets = &args[2..];

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if fault == Fault::ErrorRecord {
        emit(
            &mut out,
            &json!({"error": {"type": "socket", "error": "Operation not permitted", "status": 2}}),
        );
        std::process::exit(2);
    }

    if targets.iter().any(|t| t == "-V") {
        if fault == Fault::BadUtf8 {
            out.write_all(b"{\"version\": \"\xff\xfe\"}\n").ok();
            out.flush().ok();
        } else if fault == Fault::NoVersion {
            emit(&mut out, &json!({"package": "mock"}));
        } else {
            emit(&mut out, &json!({"version": "mock-20240905"}));
        }
        return;
    }

    let (host, ip) = match targets.last().map(String::as_str) {
        Some("::1") => ("::1", "::1"),
        Some(other) => (other, "127.0.0.1"),
        None => {
            eprintln!("mock-probe: usage error: Destination address required");
            std::process::exit(2);
        }
    };

    for i in 1..=count {
        let seq = if fault == Fault::SeqGap && i == count { i + 1 } else { i };
        let bytes = if fault == Fault::BadBytes { 72 } else { 64 };

        match (fault, i) {
            (Fault::Malformed, 2) => {
                writeln!(out, "{{\"bytes\": 64, \"seq\": ").ok();
                out.flush().ok();
                continue;
            }
            (Fault::NotObject, 2) => {
                emit(&mut out, &json!([bytes, seq]));
                continue;
            }
            _ => {}
        }

        emit(
            &mut out,
            &json!({
                "bytes": bytes,
                "host": host,
                "ip": ip,
                "seq": seq,
                "ttl": 64,
                "time": format!("0.0{}", 20 + i),
            }),
        );

        match fault {
            Fault::Hang => std::thread::sleep(Duration::from_secs(600)),
            Fault::HangChild => {
                // The child inherits stdout and stderr and outlives this process
                std::process::Command::new("sleep").arg("20").spawn().ok();
                std::thread::sleep(Duration::from_secs(600));
            }
            _ => {}
        }
    }

    if fault == Fault::NoSummary {
        return;
    }

    let mut rtt = json!({"min": "0.021", "avg": "0.030", "max": "0.041", "mdev": "0.008"});
    if fault == Fault::MissingRtt {
        if let Some(rtt) = rtt.as_object_mut() {
            rtt.remove("mdev");
        }
    }
    let transmitted = if fault == Fault::WrongTransmitted { count + 1 } else { count };
    let summary = json!({
        "host": host,
        "transmitted": transmitted,
        "received": count,
        "duplicates": 0,
        "corrupted": 0,
        "errors": 0,
        "loss": 0,
        "time": 1000 * count.saturating_sub(1),
        "rtt": rtt,
    });
    if fault == Fault::NoTrailingNewline {
        write!(out, "{}", summary).ok();
        out.flush().ok();
        return;
    }
    emit(&mut out, &summary);
    if fault == Fault::DuplicateSummary {
        emit(&mut out, &summary);
    }

    if fault == Fault::ExitNonZero {
        std::process::exit(1);
    }
}

fn emit<W: Write>(out: &mut W, value: &Value) {
    writeln!(out, "{}", value).ok();
    out.flush().ok();
}
