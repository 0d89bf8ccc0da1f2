// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};

use bluerelay_config::{BridgeConfig, LineEndingMode, OverflowMode, Scenario};

mod report;
mod simulate;
mod transcript;

use report::{RunConfig, SimulationResult, Status};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about = "BlueRelay UART bridge simulator", long_about = None)]
struct Cli {
    /// Log every byte and relay event
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a scenario (YAML) through the bridge and check its assertions.
    Simulate(SimulateArgs),

    /// Validate a scenario without running it.
    Check(CheckArgs),
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Path to the scenario (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Directory to write artifacts (result.json, host.log, module.log)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Optional path to write a JUnit XML report for CI systems
    #[arg(long)]
    junit: Option<PathBuf>,

    /// Bridge config (YAML) used when the scenario has no `bridge` section
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the line buffer capacity in bytes
    #[arg(long)]
    capacity: Option<usize>,

    /// Override the overflow policy (flush_truncated, discard_until_terminator)
    #[arg(long)]
    overflow: Option<OverflowMode>,

    /// Override the forwarded line ending (crlf, lf)
    #[arg(long)]
    line_ending: Option<LineEndingMode>,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Path to the scenario (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Simulate(args) => run_simulate(args),
        Commands::Check(args) => run_check(args),
    }
}

fn run_check(args: CheckArgs) -> ExitCode {
    match Scenario::from_file(&args.script) {
        Ok(scenario) => {
            info!(
                "{:?} OK: '{}', {} steps, {} assertions",
                args.script,
                scenario.display_name(),
                scenario.steps.len(),
                scenario.assertions.len()
            );
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn load_scenario(args: &SimulateArgs) -> anyhow::Result<Scenario> {
    let mut scenario = Scenario::from_file(&args.script)?;
    if let Some(path) = &args.config {
        scenario.apply_base_bridge(BridgeConfig::from_file(path)?);
    }
    let bridge = scenario.bridge_mut();
    if let Some(capacity) = args.capacity {
        bridge.capacity = capacity;
    }
    if let Some(overflow) = args.overflow {
        bridge.overflow = overflow;
    }
    if let Some(line_ending) = args.line_ending {
        bridge.line_ending = line_ending;
    }
    scenario.validate()?;
    Ok(scenario)
}

fn emit(
    args: &SimulateArgs,
    result: &SimulationResult,
    outcome: Option<&simulate::Outcome>,
    started: Instant,
) {
    if let Some(output_dir) = &args.output_dir {
        if let Err(e) = report::write_outputs(output_dir, result, outcome) {
            error!("{:#}", e);
        }
    }
    if let Some(junit) = &args.junit {
        if let Err(e) = report::write_junit_xml(junit, result, started.elapsed()) {
            error!("{:#}", e);
        }
    }
}

fn run_simulate(args: SimulateArgs) -> ExitCode {
    let started = Instant::now();

    let scenario = match load_scenario(&args) {
        Ok(scenario) => scenario,
        Err(e) => {
            error!("{:#}", e);
            let name = args
                .script
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("scenario");
            let result = SimulationResult::error(name, format!("{:#}", e), None);
            emit(&args, &result, None, started);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let bridge = scenario.bridge();
    let config = RunConfig {
        script: args.script.clone(),
        capacity: bridge.capacity,
        overflow: bridge.overflow,
        line_ending: bridge.line_ending,
    };
    info!(
        "Running '{}' ({} steps, capacity {})",
        scenario.display_name(),
        scenario.steps.len(),
        config.capacity
    );

    let outcome = match simulate::run(&scenario) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{:#}", e);
            let result =
                SimulationResult::error(scenario.display_name(), format!("{:#}", e), Some(config));
            emit(&args, &result, None, started);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    let assertions: Vec<_> = scenario
        .assertions
        .iter()
        .map(|a| simulate::evaluate(a, &outcome))
        .collect();
    for (i, a) in assertions.iter().enumerate() {
        if a.passed {
            info!(
                "assertion {} passed: {}",
                i + 1,
                simulate::assertion_short_name(&a.assertion)
            );
        } else {
            error!(
                "assertion {} FAILED: {} (observed: {})",
                i + 1,
                simulate::assertion_short_name(&a.assertion),
                a.observed.as_deref().unwrap_or("")
            );
        }
    }

    let result =
        SimulationResult::completed(scenario.display_name(), &outcome, assertions, config);
    emit(&args, &result, Some(&outcome), started);

    match result.status {
        Status::Pass => {
            info!("'{}' passed", scenario.display_name());
            ExitCode::from(EXIT_PASS)
        }
        Status::Fail => ExitCode::from(EXIT_ASSERT_FAIL),
        Status::Error => ExitCode::from(EXIT_RUNTIME_ERROR),
    }
}
