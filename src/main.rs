//! hydrocal - command-line entry point

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

use hydrocal::cli::{Cli, Commands};
use hydrocal::config_file::ConfigStore;
use hydrocal::dates;
use hydrocal::engine::matlab::MatlabEngine;
use hydrocal::engine::recording::RecordingEngine;
use hydrocal::engine::value::as_matrix;
use hydrocal::engine::{Engine, EngineValue};
use hydrocal::logging;
use hydrocal::process_guard::{self, ProcessGuard};
use hydrocal::routines::ParameterRanges;
use hydrocal::runner::{
    CalibrationOptions, ModelRunner, STATUS_OK, SensitivityOptions, SimulationOptions,
};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);
    info!("hydrocal starting up");

    // Engine processes are also cleaned up by the guard's Drop if this fails.
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let guard = ProcessGuard::new();

    let status = run(&cli)?;
    if status != STATUS_OK {
        drop(guard);
        std::process::exit(status);
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Commands::Init => {
            ConfigStore::create_template(&cli.config)
                .with_context(|| format!("Failed to create {}", cli.config.display()))?;
            println!("✓ Wrote template settings to {}", cli.config.display());
            Ok(STATUS_OK)
        }
        Commands::Show { resolved, json } => {
            let store = open_store(&cli.config)?;
            if *resolved {
                print_resolved(store, *json)?;
            } else {
                print!("{}", store.settings().render());
            }
            Ok(STATUS_OK)
        }
        Commands::Check if cli.dry_run => {
            info!("[DRY RUN] Skipping engine check");
            Ok(STATUS_OK)
        }
        _ if cli.dry_run => {
            info!("[DRY RUN] Recording engine calls instead of launching MATLAB");
            run_with_engine(cli, RecordingEngine::dry_run())
        }
        _ => run_with_engine(cli, MatlabEngine::new(&cli.matlab)),
    }
}

fn open_store(path: &Path) -> Result<ConfigStore> {
    ConfigStore::open(path).with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn run_with_engine<E: Engine>(cli: &Cli, engine: E) -> Result<i32> {
    let store = open_store(&cli.config)?;
    let mut runner = ModelRunner::new(store, engine).context("Invalid settings")?;

    match &cli.command {
        Commands::Simulate {
            physiographic_path,
            params,
            output_vars,
            model_verbose,
            output,
        } => {
            let result = runner.run_simulation(SimulationOptions {
                physiographic_path: physiographic_path.clone(),
                params_name: params.clone(),
                output_vars: output_vars.clone(),
                verbose: *model_verbose,
            })?;
            emit_result("Simulation", result, output.as_deref())
        }
        Commands::Calibrate {
            physiographic_path,
            flow_file,
            params,
            model_verbose,
        } => {
            let status = runner.run_calibration_flow(CalibrationOptions {
                physiographic_path: physiographic_path.clone(),
                flow_file_path: flow_file.clone(),
                params_name: params.clone(),
                verbose: *model_verbose,
            })?;
            if status == STATUS_OK {
                println!(
                    "✓ Calibration complete, results in {}",
                    runner
                        .results_root()
                        .join(runner.objective_function())
                        .display()
                );
            } else {
                eprintln!("✗ Calibration failed (status {})", status);
            }
            Ok(status)
        }
        Commands::Sensitivity {
            ranges,
            physiographic_path,
            params,
            model_verbose,
            output,
        } => {
            let parameter_ranges = parse_ranges(ranges)?;
            let result = runner.run_sensitivity_analysis(SensitivityOptions {
                physiographic_path: physiographic_path.clone(),
                params_name: params.clone(),
                parameter_ranges: Some(parameter_ranges),
                verbose: *model_verbose,
            })?;
            emit_result("Sensitivity analysis", result, output.as_deref())
        }
        Commands::AddPath { name, path } => {
            runner.add_matlab_path(name, path)?;
            if !path.exists() {
                warn!("{} does not exist yet; it will be skipped until it does", path.display());
            }
            println!("✓ {} = {}", name, path.display());
            Ok(STATUS_OK)
        }
        Commands::SetDates { start, end } => {
            dates::parse_date(start).context("Invalid start date")?;
            dates::parse_date(end).context("Invalid end date")?;
            runner.set_date_range(start, end)?;
            println!("✓ Simulation period set to {} .. {}", start, end);
            Ok(STATUS_OK)
        }
        Commands::SetObjective { name } => {
            runner.set_objective_function(name)?;
            println!("✓ Objective function set to {}", name);
            Ok(STATUS_OK)
        }
        Commands::Check => {
            let value = runner
                .check_engine()
                .with_context(|| format!("Engine check failed for {}", cli.matlab.display()))?;
            println!("✓ Engine is working (2 + 2 = {})", value);
            Ok(STATUS_OK)
        }
        Commands::Init | Commands::Show { .. } => Ok(STATUS_OK),
    }
}

/// `@path` reads the JSON from a file, anything else is parsed inline.
fn parse_ranges(arg: &str) -> Result<ParameterRanges> {
    let text = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameter ranges from {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text)
        .context("Parameter ranges must be a JSON object mapping names to number arrays")
}

fn emit_result(what: &str, result: Option<EngineValue>, output: Option<&Path>) -> Result<i32> {
    let Some(value) = result else {
        error!("{} produced no result", what);
        eprintln!("✗ {} failed, see the log for the engine error", what);
        return Ok(1);
    };
    if let Some(matrix) = as_matrix(&value) {
        let columns = matrix.first().map_or(0, Vec::len);
        debug!("{} result is a {}x{} matrix", what, matrix.len(), columns);
    }

    let text = serde_json::to_string_pretty(&value)?;
    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            println!("✓ {} results written to {}", what, path.display());
        }
        None => println!("{}", text),
    }
    Ok(STATUS_OK)
}

fn print_resolved(store: ConfigStore, json: bool) -> Result<()> {
    let runner = ModelRunner::new(store, RecordingEngine::new()).context("Invalid settings")?;
    let resolved = runner.resolved_settings();
    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    println!("[PATHS]");
    for (name, path) in resolved.paths.iter() {
        let marker = if path.exists() { "" } else { "  (missing)" };
        println!("{} = {}{}", name, path.display(), marker);
    }
    println!("\n[DATES]");
    println!("start_date = {}", resolved.dates.start_date);
    println!("end_date = {}", resolved.dates.end_date);
    println!("\n[CALIBRATION]");
    println!("objective_function = {}", resolved.calibration.objective_function);
    println!("type = {}", resolved.calibration.calibration_type);
    println!("cp = {}", resolved.calibration.partition_count);
    println!("results = {}", resolved.results_dir.display());

    let simulation = &resolved.simulation;
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    println!("\n[SIMULATION]");
    println!("physiographic_path = {}", text(&simulation.physiographic_path));
    println!("params_file = {}", text(&simulation.params_file));
    println!("flow_file_path = {}", text(&simulation.flow_file_path));
    println!(
        "output_vars = {}",
        simulation.output_vars.as_deref().unwrap_or_default().join(",")
    );
    println!("verbose = {}", simulation.verbose);
    println!("thermie = {}", simulation.thermie.as_deref().unwrap_or("0"));
    Ok(())
}
