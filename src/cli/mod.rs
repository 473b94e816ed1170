//! Command dispatch
//!
//! Turns parsed commands into runs and maps the combined verdict onto the
//! process exit code.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::BufReader;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::probe::{builtin_variants, RunSpec, DEFAULT_FLAGS};
use crate::testing::{
    self, FailurePolicy, RunDefaults, RunOptions, RunReport, Scenario, Verdict, EXIT_SKIPPED,
};

/// Execute a command and return the process exit code
pub async fn dispatch(command: Commands, config: &Config, verbose: bool) -> Result<i32> {
    match command {
        Commands::Run {
            probe,
            count,
            payload_size,
            only,
            scenario,
            fail_fast,
            parallel,
            timeout,
            json,
        } => {
            let defaults = RunDefaults {
                probe: probe.unwrap_or_else(|| config.probe.path.clone()),
                count: count.unwrap_or(config.probe.count),
                payload_size: payload_size.unwrap_or(config.probe.payload_size),
            };
            let variants = load_variants(scenario.as_deref(), &defaults)
                .and_then(|specs| select_variants(specs, &only));

            if config.skip.is_active() {
                let reason = format!(
                    "skipped: {}={}",
                    config.skip.env_var, config.skip.value
                );
                tracing::info!("{}", reason);
                // A skipped invocation never fails, even on a bad scenario or `--only`
                if let Err(e) = &variants {
                    tracing::debug!("variants not loaded: {}", e);
                }
                let reports: Vec<RunReport> = variants
                    .unwrap_or_default()
                    .iter()
                    .map(|s| RunReport::skipped(s, &reason))
                    .collect();
                emit(&reports, json, verbose)?;
                return Ok(EXIT_SKIPPED);
            }

            let specs = variants?;

            let options = RunOptions {
                policy: policy(fail_fast),
                timeout: Duration::from_secs(timeout.unwrap_or(config.timeouts.run_secs)),
                stderr_tail_lines: config.report.stderr_tail_lines,
            };

            let reports = testing::run_all(&specs, &options, parallel).await;
            emit(&reports, json, verbose)
        }

        Commands::Check {
            path,
            mode,
            count,
            payload_size,
            fail_fast,
            json,
        } => {
            let spec = RunSpec {
                name: display_name(&path),
                binary: config.probe.path.clone(),
                flags: DEFAULT_FLAGS.to_vec(),
                count: count.unwrap_or(config.probe.count),
                target_args: Vec::new(),
                mode,
                payload_size: payload_size.unwrap_or(config.probe.payload_size),
            };

            let mut report = if path.as_os_str() == "-" {
                let stdin = BufReader::new(tokio::io::stdin());
                testing::check_captured(stdin, &spec, policy(fail_fast)).await?
            } else {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| Error::file_read(&path, e))?;
                testing::check_captured(BufReader::new(file), &spec, policy(fail_fast)).await?
            };

            report.command = format!("< {}", spec.name);
            emit(&[report], json, verbose)
        }

        Commands::Variants { probe } => {
            let probe = probe.unwrap_or_else(|| config.probe.path.clone());
            for spec in builtin_variants(&probe, config.probe.count, config.probe.payload_size) {
                println!("{:<8} {:<8} {}", spec.name, spec.mode, spec.command_line());
            }
            Ok(0)
        }
    }
}

fn policy(fail_fast: bool) -> FailurePolicy {
    if fail_fast {
        FailurePolicy::FailFast
    } else {
        FailurePolicy::Accumulate
    }
}

fn display_name(path: &Path) -> String {
    if path.as_os_str() == "-" {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

/// Built-in variants, or those of a scenario file
fn load_variants(scenario: Option<&Path>, defaults: &RunDefaults) -> Result<Vec<RunSpec>> {
    match scenario {
        Some(path) => {
            let loaded = Scenario::load(path)?;
            tracing::debug!(
                scenario = %loaded.name,
                description = loaded.description.as_deref().unwrap_or(""),
                variants = loaded.variants.len(),
                "loaded scenario"
            );
            let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
            loaded.run_specs(&base_dir, defaults)
        }
        None => Ok(builtin_variants(
            &defaults.probe,
            defaults.count,
            defaults.payload_size,
        )),
    }
}

/// Keep only the variants named in `only`, in their original order
fn select_variants(specs: Vec<RunSpec>, only: &[String]) -> Result<Vec<RunSpec>> {
    if only.is_empty() {
        return Ok(specs);
    }

    for name in only {
        if !specs.iter().any(|s| &s.name == name) {
            let known: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
            return Err(Error::Config(format!(
                "Unknown variant '{}'. Available: {}",
                name,
                known.join(", ")
            )));
        }
    }

    Ok(specs.into_iter().filter(|s| only.contains(&s.name)).collect())
}

/// Print reports and compute the exit code
fn emit(reports: &[RunReport], json: bool, verbose: bool) -> Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        for report in reports {
            testing::print_report(report, verbose);
        }
        testing::print_summary(reports);
    }
    Ok(Verdict::overall(reports).exit_code())
}
