//! End-to-end tests for the probe-conform CLI
//!
//! These tests run the harness binary against the `mock-probe` binary, which
//! prints ping-style JSON Lines and can be told to break its output in
//! specific ways through `MOCK_PROBE_FAULT`.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use serde_json::Value;

/// Test context with an isolated config location
struct TestContext {
    /// Temporary directory for this test
    temp_dir: tempfile::TempDir,
    /// Path to the harness binary
    harness_bin: PathBuf,
    /// Path to the mock probe
    mock_probe: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().expect("Failed to create temp dir"),
            harness_bin: PathBuf::from(env!("CARGO_BIN_EXE_probe-conform")),
            mock_probe: PathBuf::from(env!("CARGO_BIN_EXE_mock-probe")),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).expect("Failed to write fixture");
        path
    }

    /// Run the harness with an optional mock fault
    fn run_harness(&self, args: &[&str], fault: Option<&str>) -> HarnessOutput {
        let mut cmd = Command::new(&self.harness_bin);
        cmd.args(args)
            .env("PROBE_CONFORM_CONFIG", self.path("missing-config.toml"))
            .env_remove("VARIANT")
            .env_remove("MOCK_PROBE_FAULT")
            .env("NO_COLOR", "1");
        if let Some(fault) = fault {
            cmd.env("MOCK_PROBE_FAULT", fault);
        }

        let output = cmd.output().expect("Failed to run probe-conform");
        HarnessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        }
    }

    /// `run` against the mock probe
    fn run_mock(&self, extra: &[&str], fault: Option<&str>) -> HarnessOutput {
        let probe = self.mock_probe.to_str().unwrap();
        let mut args = vec!["run", probe];
        args.extend_from_slice(extra);
        self.run_harness(&args, fault)
    }

    /// `run --json` against the mock probe, parsed
    fn run_mock_json(&self, extra: &[&str], fault: Option<&str>) -> (Option<i32>, Vec<Value>) {
        let mut args = vec!["--json"];
        args.extend_from_slice(extra);
        let output = self.run_mock(&args, fault);
        let reports: Vec<Value> = serde_json::from_str(&output.stdout).unwrap_or_else(|e| {
            panic!(
                "Invalid JSON report ({e}):\nstdout: {}\nstderr: {}",
                output.stdout, output.stderr
            )
        });
        (output.code, reports)
    }
}

/// Output from a harness invocation
#[derive(Debug)]
struct HarnessOutput {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

fn violation_types(report: &Value) -> Vec<String> {
    report["violations"]
        .as_array()
        .expect("violations array")
        .iter()
        .map(|v| v["kind"]["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

fn report_for<'a>(reports: &'a [Value], variant: &str) -> &'a Value {
    reports
        .iter()
        .find(|r| r["variant"] == variant)
        .unwrap_or_else(|| panic!("No report for variant '{variant}'"))
}

// ============== Tests ==============

#[test]
fn test_all_variants_pass() {
    let ctx = TestContext::new();
    let output = ctx.run_mock(&[], None);

    assert_eq!(output.code, Some(0), "stdout: {}\nstderr: {}", output.stdout, output.stderr);
    for variant in ["ipv4", "ipv6", "version"] {
        assert!(output.stdout.contains(variant), "Missing {variant}: {}", output.stdout);
    }
    assert!(output.stdout.contains("3 passed, 0 failed, 0 skipped"));
}

#[test]
fn test_json_report_for_passing_run() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--count", "4"], None);

    assert_eq!(code, Some(0));
    assert_eq!(reports.len(), 3);

    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["verdict"], "pass");
    assert_eq!(ipv4["records"]["echo_reply"], 4);
    assert_eq!(ipv4["records"]["summary_stats"], 1);
    assert_eq!(ipv4["exit_code"], 0);
    assert!(ipv4["command"].as_str().unwrap().ends_with("-jc 4 -4 localhost"));

    let version = report_for(&reports, "version");
    assert_eq!(version["mode"], "version");
    assert_eq!(version["records"]["version_info"], 1);
}

#[test]
fn test_sequence_gap_fails() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("seq_gap"));

    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["verdict"], "fail");
    assert_eq!(violation_types(ipv4), ["sequence_violation"]);
    assert_eq!(ipv4["violations"][0]["line"], 3);
    assert_eq!(ipv4["violations"][0]["kind"]["expected"], 3);
    assert_eq!(ipv4["violations"][0]["kind"]["actual"], 4);
}

#[test]
fn test_bad_payload_size_fails() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "ipv6"], Some("bad_bytes"));

    assert_eq!(code, Some(1));
    let ipv6 = report_for(&reports, "ipv6");
    assert_eq!(violation_types(ipv6), ["field_mismatch", "field_mismatch", "field_mismatch"]);
    assert_eq!(ipv6["violations"][0]["kind"]["field"], "bytes");
}

#[test]
fn test_custom_payload_size_accepts_matching_replies() {
    let ctx = TestContext::new();
    let (code, _) = ctx.run_mock_json(&["--only", "ipv4", "--payload-size", "72"], Some("bad_bytes"));
    assert_eq!(code, Some(0));
}

#[test]
fn test_fail_fast_stops_at_first_violation() {
    let ctx = TestContext::new();
    let (code, reports) =
        ctx.run_mock_json(&["--only", "ipv4", "--fail-fast"], Some("bad_bytes"));

    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["violations"].as_array().unwrap().len(), 1);
    assert_eq!(ipv4["lines"], 1);
}

#[test]
fn test_malformed_line_fails() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("malformed"));

    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert!(violation_types(ipv4).contains(&"malformed_record".to_string()));
}

#[test]
fn test_non_object_line_fails() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("not_object"));

    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["violations"][0]["kind"]["type"], "schema_violation");
    assert_eq!(ipv4["violations"][0]["kind"]["reason"], "not an object");
}

#[test]
fn test_summary_checks() {
    let ctx = TestContext::new();

    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("wrong_transmitted"));
    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["violations"][0]["kind"]["field"], "transmitted");

    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("missing_rtt"));
    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["violations"][0]["kind"]["type"], "missing_field");
    assert_eq!(ipv4["violations"][0]["kind"]["field"], "rtt.mdev");

    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("duplicate_summary"));
    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["violations"][0]["kind"]["reason"], "duplicate summary record");
}

#[test]
fn test_missing_summary_is_incomplete() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("no_summary"));

    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(violation_types(ipv4), ["incomplete_run"]);
    assert!(ipv4["violations"][0]["line"].is_null());
}

#[test]
fn test_version_run_without_version_fails() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "version"], Some("no_version"));

    assert_eq!(code, Some(1));
    let version = report_for(&reports, "version");
    assert_eq!(violation_types(version), ["schema_violation", "incomplete_run"]);
}

#[test]
fn test_probe_error_record_fails() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("error_record"));

    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["violations"][0]["kind"]["type"], "probe_reported");
    assert_eq!(ipv4["violations"][0]["kind"]["message"], "Operation not permitted");
    assert_eq!(ipv4["exit_code"], 2);
}

#[test]
fn test_nonzero_exit_alone_does_not_fail() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("exit_nonzero"));

    assert_eq!(code, Some(0));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["verdict"], "pass");
    assert_eq!(ipv4["exit_code"], 1);
}

#[test]
fn test_hung_probe_times_out() {
    let ctx = TestContext::new();
    let (code, reports) =
        ctx.run_mock_json(&["--only", "ipv4", "--timeout", "1"], Some("hang"));

    assert_eq!(code, Some(1));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["verdict"], "fail");
    assert!(ipv4["reason"].as_str().unwrap().contains("did not finish within 1 seconds"));
    assert_eq!(ipv4["lines"], 1);
}

#[test]
fn test_parallel_runs_are_independent() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--parallel", "--count", "5"], None);

    assert_eq!(code, Some(0));
    let names: Vec<&str> = reports.iter().map(|r| r["variant"].as_str().unwrap()).collect();
    assert_eq!(names, ["ipv4", "ipv6", "version"]);
    assert_eq!(report_for(&reports, "ipv4")["records"]["echo_reply"], 5);
    assert_eq!(report_for(&reports, "ipv6")["records"]["echo_reply"], 5);
}

#[test]
fn test_missing_probe_is_launch_failure() {
    let ctx = TestContext::new();
    let output = ctx.run_harness(
        &["run", "/nonexistent/dir/ping", "--only", "ipv4", "--json"],
        None,
    );

    assert_eq!(output.code, Some(1));
    let reports: Vec<Value> = serde_json::from_str(&output.stdout).unwrap();
    assert!(reports[0]["reason"]
        .as_str()
        .unwrap()
        .starts_with("Failed to launch probe '/nonexistent/dir/ping'"));
}

#[test]
fn test_skip_gate() {
    let ctx = TestContext::new();
    let probe = ctx.mock_probe.to_str().unwrap().to_string();
    let output = Command::new(&ctx.harness_bin)
        .args(["run", &probe])
        .env("PROBE_CONFORM_CONFIG", ctx.path("missing-config.toml"))
        .env("VARIANT", "cross-compile")
        .env("MOCK_PROBE_FAULT", "seq_gap")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run probe-conform");

    assert_eq!(output.status.code(), Some(77));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0 passed, 0 failed, 3 skipped"), "{stdout}");
}

#[test]
fn test_skip_gate_from_config() {
    let ctx = TestContext::new();
    let config = ctx.write(
        "config.toml",
        "[skip]\nenv_var = \"PROBE_CONFORM_IT_SKIP\"\nvalue = \"1\"\n",
    );
    let probe = ctx.mock_probe.to_str().unwrap().to_string();
    let output = Command::new(&ctx.harness_bin)
        .args(["--config", config.to_str().unwrap(), "run", &probe])
        .env("PROBE_CONFORM_IT_SKIP", "1")
        .env_remove("VARIANT")
        .output()
        .expect("Failed to run probe-conform");

    assert_eq!(output.status.code(), Some(77));
}

#[test]
fn test_config_file_sets_probe_and_count() {
    let ctx = TestContext::new();
    let config = ctx.write(
        "config.toml",
        &format!(
            "[probe]\npath = \"{}\"\ncount = 2\n",
            ctx.mock_probe.display()
        ),
    );
    let output = ctx.run_harness(
        &["--config", config.to_str().unwrap(), "run", "--only", "ipv6", "--json"],
        None,
    );

    assert_eq!(output.code, Some(0), "stderr: {}", output.stderr);
    let reports: Vec<Value> = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(reports[0]["records"]["echo_reply"], 2);
}

#[test]
fn test_invalid_config_is_error() {
    let ctx = TestContext::new();
    let config = ctx.write("config.toml", "[probe\n");
    let output = ctx.run_harness(&["--config", config.to_str().unwrap(), "variants"], None);

    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Invalid configuration file"));
}

#[test]
fn test_unknown_variant_is_error() {
    let ctx = TestContext::new();
    let output = ctx.run_mock(&["--only", "ipv5"], None);

    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Unknown variant 'ipv5'"));
}

#[test]
fn test_scenario_file() {
    let ctx = TestContext::new();
    let scenario = ctx.write(
        "scenario.yaml",
        &format!(
            r#"
name: loopback
probe: {}
variants:
  - name: five-v4
    count: 5
    targets: ["-4", "localhost"]
  - name: ver
    mode: version
    targets: ["-V"]
"#,
            ctx.mock_probe.display()
        ),
    );
    let output = ctx.run_harness(
        &["run", "--scenario", scenario.to_str().unwrap(), "--json"],
        None,
    );

    assert_eq!(output.code, Some(0), "stderr: {}", output.stderr);
    let reports: Vec<Value> = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(report_for(&reports, "five-v4")["records"]["echo_reply"], 5);
    assert_eq!(report_for(&reports, "ver")["verdict"], "pass");
}

#[test]
fn test_check_captured_file() {
    let ctx = TestContext::new();
    let captured = ctx.write(
        "gap.jsonl",
        concat!(
            "{\"bytes\": 64, \"seq\": 1}\n",
            "{\"bytes\": 64, \"seq\": 2}\n",
            "{\"bytes\": 64, \"seq\": 4}\n",
            "{\"transmitted\": 3, \"rtt\": {\"min\": \"0.1\", \"avg\": \"0.2\", \"max\": \"0.3\", \"mdev\": \"0.1\"}}\n",
        ),
    );
    let path = captured.to_str().unwrap();

    let first = ctx.run_harness(&["check", path, "--json"], None);
    let second = ctx.run_harness(&["check", path, "--json"], None);

    assert_eq!(first.code, Some(1));
    assert_eq!(first.stdout, second.stdout);
    let reports: Vec<Value> = serde_json::from_str(&first.stdout).unwrap();
    assert_eq!(violation_types(&reports[0]), ["sequence_violation"]);
}

#[test]
fn test_check_captured_version_output() {
    let ctx = TestContext::new();
    let captured = ctx.write("version.jsonl", "{\"version\": \"20240905\"}\n");
    let output = ctx.run_harness(
        &["check", captured.to_str().unwrap(), "--mode", "version"],
        None,
    );
    assert_eq!(output.code, Some(0), "stdout: {}", output.stdout);
}

#[test]
fn test_check_missing_file() {
    let ctx = TestContext::new();
    let missing = ctx.path("nope.jsonl");
    let output = ctx.run_harness(&["check", missing.to_str().unwrap()], None);

    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("Failed to read file"));
}

#[test]
fn test_variants_lists_templates() {
    let ctx = TestContext::new();
    let output = ctx.run_harness(&["variants", "builddir/ping/ping"], None);

    assert_eq!(output.code, Some(0));
    assert!(output.stdout.contains("builddir/ping/ping -jc 3 -4 localhost"));
    assert!(output.stdout.contains("builddir/ping/ping -jc 3 ::1"));
    assert!(output.stdout.contains("builddir/ping/ping -jc 3 -V"));
}

#[test]
fn test_invalid_utf8_output_fails() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "version"], Some("bad_utf8"));

    assert_eq!(code, Some(1));
    let version = report_for(&reports, "version");
    assert_eq!(version["verdict"], "fail");
    assert_eq!(violation_types(version), ["malformed_record", "incomplete_run"]);
    assert!(version["violations"][0]["raw"].as_str().unwrap().contains('\u{FFFD}'));
}

#[test]
fn test_check_captured_invalid_utf8() {
    let ctx = TestContext::new();
    let captured = ctx.path("bad.jsonl");
    fs::write(&captured, b"{\"version\": \"\xff\xfe\"}\n").unwrap();

    let output = ctx.run_harness(
        &["check", captured.to_str().unwrap(), "--mode", "version", "--json"],
        None,
    );

    assert_eq!(output.code, Some(1), "stderr: {}", output.stderr);
    assert!(!output.stderr.contains("IO error"));
    let reports: Vec<Value> = serde_json::from_str(&output.stdout).unwrap();
    assert_eq!(reports[0]["violations"][0]["kind"]["type"], "malformed_record");
}

#[test]
fn test_timeout_not_held_up_by_leftover_child() {
    let ctx = TestContext::new();
    let started = Instant::now();
    let (code, reports) =
        ctx.run_mock_json(&["--only", "ipv4", "--timeout", "1"], Some("hang_child"));
    let elapsed = started.elapsed();

    assert_eq!(code, Some(1));
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
    let ipv4 = report_for(&reports, "ipv4");
    assert!(ipv4["reason"].as_str().unwrap().contains("did not finish within 1 seconds"));
}

#[test]
fn test_unterminated_summary_line() {
    let ctx = TestContext::new();
    let (code, reports) = ctx.run_mock_json(&["--only", "ipv4"], Some("no_trailing_newline"));

    assert_eq!(code, Some(0));
    let ipv4 = report_for(&reports, "ipv4");
    assert_eq!(ipv4["records"]["summary_stats"], 1);
    assert_eq!(ipv4["received"], 3);
}

#[test]
fn test_skip_gate_wins_over_bad_scenario() {
    let ctx = TestContext::new();
    let missing = ctx.path("missing-scenario.yaml");
    let output = Command::new(&ctx.harness_bin)
        .args(["run", "--scenario", missing.to_str().unwrap(), "--only", "nope"])
        .env("PROBE_CONFORM_CONFIG", ctx.path("missing-config.toml"))
        .env("VARIANT", "cross-compile")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run probe-conform");

    assert_eq!(output.status.code(), Some(77));
}
