//! callguard CLI.
//!
//! Provides the `callguard` binary, which loads a JSON call scenario into the
//! in-memory runtime and runs every call with argument checking enabled.
//!
//! Logging is controlled by `CALLGUARD_LOG` (an env filter, default `warn`).
//! The unsupported-contract policy comes from `CALLGUARD_UNSUPPORTED` unless
//! `--unsupported` is given.

mod scenario;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use callguard_check::{CheckerConfig, StatsSnapshot, TypeChecker, UnsupportedPolicy};
use callguard_core::ContextId;
use callguard_runtime::RuntimeConfig;

use scenario::{Loaded, Scenario};

/// Runtime argument contract checker.
#[derive(Parser)]
#[command(name = "callguard", about = "Runtime argument contract checker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every call in a scenario and print one JSON result per call.
    Run {
        /// Path to the scenario JSON file.
        scenario: PathBuf,

        /// Policy for contracts that cannot be checked: skip or reject.
        #[arg(long)]
        unsupported: Option<UnsupportedPolicy>,

        /// Run without installing the checker.
        #[arg(long)]
        no_check: bool,
    },
    /// Validate a scenario without running it.
    Check {
        /// Path to the scenario JSON file.
        scenario: PathBuf,
    },
}

#[derive(Serialize)]
struct Summary {
    calls: usize,
    rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<StatsSnapshot>,
}

fn main() {
    let filter =
        EnvFilter::try_from_env("CALLGUARD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Run {
            scenario,
            unsupported,
            no_check,
        } => run_scenario(&scenario, unsupported, no_check),
        Commands::Check { scenario } => check_scenario(&scenario),
    };
    process::exit(exit_code);
}

/// Execute the run subcommand.
///
/// Returns exit code: 0 = all calls ran (rejections included),
/// 1 = scenario or configuration error, 2 = checker could not be enabled.
fn run_scenario(path: &Path, unsupported: Option<UnsupportedPolicy>, no_check: bool) -> i32 {
    let mut config = match CheckerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Some(policy) = unsupported {
        config.unsupported = policy;
    }

    let loaded = match load(path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let checker = TypeChecker::new(config);
    if !no_check {
        if let Err(e) = checker.enable(&loaded.runtime) {
            eprintln!("Error: failed to enable type checking: {}", e);
            return 2;
        }
    }

    let reports = loaded.run(ContextId(0));
    for report in &reports {
        print_json(report);
    }

    print_json(&Summary {
        calls: reports.len(),
        rejected: reports.iter().filter(|r| r.error.is_some()).count(),
        stats: checker.stats(),
    });

    if checker.is_enabled() {
        if let Err(e) = checker.disable(&loaded.runtime) {
            tracing::warn!(error = %e, "failed to disable type checking");
        }
    }
    0
}

/// Execute the check subcommand. Returns 0 when the scenario loads, else 1.
fn check_scenario(path: &Path) -> i32 {
    match load(path) {
        Ok(loaded) => {
            println!(
                "ok: {} function(s), {} call(s)",
                loaded.function_count(),
                loaded.call_count()
            );
            0
        }
        Err(code) => code,
    }
}

fn load(path: &Path) -> Result<Loaded, i32> {
    let scenario = Scenario::from_path(path).map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })?;
    Loaded::build(&scenario, RuntimeConfig::default()).map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })
}

fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}
