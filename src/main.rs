//! probe-conform - conformance harness for ping-style probes
//!
//! Runs the probe in its IPv4, IPv6 and version modes and checks that every
//! line of its JSON output is a well-formed, consistent record.

use clap::Parser;
use probe_conform::commands::Commands;
use probe_conform::common::{config::Config, logging};
use probe_conform::{cli, Result};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "probe-conform", about = "Validate the JSON output of a network probe")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli::dispatch(cli.command, &config, cli.verbose).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
