//! Engine session manager.
//!
//! [`ModelRunner`] turns configured settings into routine calls. Each public
//! operation drives one full session cycle:
//!
//! ```text
//! Idle ──start──▶ Active (paths registered, dates converted) ──call──▶ Idle
//! ```
//!
//! The session is torn down on every exit path, and never reused across
//! operations. Missing inputs are reported as validation errors before any
//! engine is started; everything that goes wrong after that is logged and
//! turned into an empty result (or status 1 for calibration).

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config_file::{CalibrationSettings, ConfigStore, SimulationSettings};
use crate::engine::value::as_scalar;
use crate::engine::{Engine, EngineArg, EngineSession, EngineValue};
use crate::error::{HydroCalError, Result};
use crate::routines::{
    self, CalibrationCall, ExecutionParams, ParameterRanges, SensitivityCall, SimulationCall,
};
use crate::types::{DateRange, SearchPaths, Section};

/// Where calibration results are written unless overridden.
pub const CALIBRATION_RESULTS_ROOT: &str = "results/calibration/CMAES";

/// Output variable used when neither the caller nor the settings name any.
pub const DEFAULT_OUTPUT_VAR: &str = "debit";

/// Status returned by a successful calibration.
pub const STATUS_OK: i32 = 0;
/// Status returned when the calibration failed inside the engine.
pub const STATUS_FAILED: i32 = 1;

/// Overrides for [`ModelRunner::run_simulation`]; `None` falls back to settings.
#[derive(Debug, Clone, Default)]
pub struct SimulationOptions {
    pub physiographic_path: Option<String>,
    pub params_name: Option<String>,
    pub output_vars: Option<Vec<String>>,
    pub verbose: Option<i64>,
}

/// Overrides for [`ModelRunner::run_calibration_flow`].
#[derive(Debug, Clone, Default)]
pub struct CalibrationOptions {
    pub physiographic_path: Option<String>,
    pub flow_file_path: Option<String>,
    pub params_name: Option<String>,
    pub verbose: Option<i64>,
}

/// Overrides for [`ModelRunner::run_sensitivity_analysis`]. Ranges have no
/// settings fallback.
#[derive(Debug, Clone, Default)]
pub struct SensitivityOptions {
    pub physiographic_path: Option<String>,
    pub params_name: Option<String>,
    pub parameter_ranges: Option<ParameterRanges>,
    pub verbose: Option<i64>,
}

/// Snapshot of the effective settings, as shown by `show --resolved`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSettings {
    pub paths: SearchPaths,
    pub dates: DateRange,
    pub calibration: CalibrationSettings,
    /// Calibration output directory for the current objective
    pub results_dir: PathBuf,
    pub simulation: SimulationSettings,
}

/// Runs model routines on an [`Engine`] according to a [`ConfigStore`].
pub struct ModelRunner<E: Engine> {
    store: ConfigStore,
    engine: E,
    search_paths: SearchPaths,
    date_range: DateRange,
    objective_function: String,
    calibration_type: String,
    partition_count: u32,
    results_root: PathBuf,
    session: Option<E::Session>,
}

impl<E: Engine> ModelRunner<E> {
    /// Read paths, dates and calibration settings from `store`.
    pub fn new(store: ConfigStore, engine: E) -> Result<Self> {
        let mut search_paths = store.matlab_paths();
        if search_paths.is_empty() {
            debug!("No [PATHS] configured, using default engine paths");
            search_paths = SearchPaths::defaults();
        }
        let date_range = store.date_range();
        let calibration = store.calibration_settings()?;

        Ok(Self {
            store,
            engine,
            search_paths,
            date_range,
            objective_function: calibration.objective_function,
            calibration_type: calibration.calibration_type,
            partition_count: calibration.partition_count,
            results_root: PathBuf::from(CALIBRATION_RESULTS_ROOT),
            session: None,
        })
    }

    /// Write calibration results under `root` instead of the default.
    pub fn with_results_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.results_root = root.into();
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn search_paths(&self) -> &SearchPaths {
        &self.search_paths
    }

    pub fn date_range(&self) -> &DateRange {
        &self.date_range
    }

    pub fn objective_function(&self) -> &str {
        &self.objective_function
    }

    pub fn calibration_type(&self) -> &str {
        &self.calibration_type
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    pub fn results_root(&self) -> &Path {
        &self.results_root
    }

    /// Everything a run would use, with defaults applied.
    pub fn resolved_settings(&self) -> ResolvedSettings {
        let mut simulation = self.store.simulation_settings();
        simulation.output_vars = Some(resolve_output_vars(None, &simulation));
        ResolvedSettings {
            paths: self.search_paths.clone(),
            dates: self.date_range.clone(),
            calibration: CalibrationSettings {
                objective_function: self.objective_function.clone(),
                calibration_type: self.calibration_type.clone(),
                partition_count: self.partition_count,
            },
            results_dir: self.results_root.join(&self.objective_function),
            simulation,
        }
    }

    /// Whether an engine session is currently open.
    pub fn has_active_session(&self) -> bool {
        self.session.is_some()
    }

    /// Run `main_simulation`. `Ok(None)` means the engine call failed (logged).
    pub fn run_simulation(&mut self, options: SimulationOptions) -> Result<Option<EngineValue>> {
        let settings = self.store.simulation_settings();
        let missing =
            || HydroCalError::validation("Physiographic path and parameters file must be provided");
        let call = SimulationCall {
            physiographic_path: resolve(options.physiographic_path, &settings.physiographic_path)
                .ok_or_else(missing)?,
            params_file: resolve(options.params_name, &settings.params_file).ok_or_else(missing)?,
            output_vars: resolve_output_vars(options.output_vars, &settings),
            verbose: options.verbose.unwrap_or(settings.verbose),
        };
        info!(
            "Running simulation for {} with {} (outputs: {})",
            call.physiographic_path,
            call.params_file,
            call.output_vars.join(",")
        );

        match self.in_session(|session, execution| routines::invoke(session, &call, execution)) {
            Ok(outputs) => Ok(outputs.into_iter().next()),
            Err(e) => {
                error!("Simulation error: {}", e);
                Ok(None)
            }
        }
    }

    /// Run `main_calibration_flow`. Returns [`STATUS_OK`] or [`STATUS_FAILED`].
    pub fn run_calibration_flow(&mut self, options: CalibrationOptions) -> Result<i32> {
        let settings = self.store.simulation_settings();
        let missing = || {
            HydroCalError::validation(
                "Physiographic path, flow file path, and parameters file must be provided",
            )
        };
        let physiographic_path =
            resolve(options.physiographic_path, &settings.physiographic_path).ok_or_else(missing)?;
        let flow_file_path =
            resolve(options.flow_file_path, &settings.flow_file_path).ok_or_else(missing)?;
        let params_file = resolve(options.params_name, &settings.params_file).ok_or_else(missing)?;
        let verbose = options.verbose.unwrap_or(settings.verbose);
        let thermie = parse_thermie(&settings)?;

        let output_dir = self.results_root.join(&self.objective_function);
        let call = CalibrationCall {
            physiographic_path,
            flow_file_path,
            params_file,
            output_prefix: output_dir.join(&self.objective_function).display().to_string(),
            partition_count: self.partition_count,
            thermie,
        };
        info!(
            "Running {} calibration ({}) on {}, CP={}, verbose={}",
            self.objective_function,
            self.calibration_type,
            call.flow_file_path,
            call.partition_count,
            verbose
        );

        let result = self.in_session(|session, execution| {
            if !output_dir.exists() {
                fs::create_dir_all(&output_dir)?;
                info!("Created calibration output directory {}", output_dir.display());
            }
            routines::invoke(session, &call, execution)
        });
        match result {
            Ok(_) => Ok(STATUS_OK),
            Err(e) => {
                error!("Calibration error: {}", e);
                Ok(STATUS_FAILED)
            }
        }
    }

    /// Run `main_sensitivity`. `Ok(None)` means the engine call failed (logged).
    pub fn run_sensitivity_analysis(
        &mut self,
        options: SensitivityOptions,
    ) -> Result<Option<EngineValue>> {
        let settings = self.store.simulation_settings();
        let missing =
            || HydroCalError::validation("Physiographic path and parameters file must be provided");
        let physiographic_path =
            resolve(options.physiographic_path, &settings.physiographic_path).ok_or_else(missing)?;
        let params_file = resolve(options.params_name, &settings.params_file).ok_or_else(missing)?;
        let parameter_ranges = options.parameter_ranges.ok_or_else(|| {
            HydroCalError::validation("Parameter ranges must be provided for sensitivity analysis")
        })?;

        let call = SensitivityCall {
            physiographic_path,
            params_file,
            parameter_ranges,
            verbose: options.verbose.unwrap_or(settings.verbose),
        };
        info!(
            "Running sensitivity analysis over {} parameter(s)",
            call.parameter_ranges.len()
        );

        match self.in_session(|session, execution| routines::invoke(session, &call, execution)) {
            Ok(outputs) => Ok(outputs.into_iter().next()),
            Err(e) => {
                error!("Sensitivity analysis error: {}", e);
                Ok(None)
            }
        }
    }

    /// Register a named search path, persist it under PATHS, and add it to
    /// the live session if there is one.
    pub fn add_matlab_path(&mut self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.search_paths.insert(name, path);
        self.store
            .update_section(Section::Paths.as_ref(), [(name, path)])?;
        info!("Registered engine path {} = {}", name, path.display());

        if let Some(session) = self.session.as_mut() {
            if path.exists() {
                session.add_path(path)?;
            }
        }
        Ok(())
    }

    /// Change the simulation period and persist it under DATES.
    pub fn set_date_range(&mut self, start_date: &str, end_date: &str) -> Result<()> {
        self.date_range = DateRange::new(start_date, end_date);
        self.store.update_section(
            Section::Dates.as_ref(),
            [("start_date", start_date), ("end_date", end_date)],
        )
    }

    /// Change the calibration objective and persist it under CALIBRATION.
    pub fn set_objective_function(&mut self, objective_function: &str) -> Result<()> {
        self.objective_function = objective_function.to_string();
        self.store.update_section(
            Section::Calibration.as_ref(),
            [("objective_function", objective_function)],
        )
    }

    /// Start an engine, evaluate `2 + 2` through the call path, and stop it.
    pub fn check_engine(&mut self) -> Result<f64> {
        let result = self.evaluate_check_expression();
        self.close_session();
        let value = result?;
        if value != 4.0 {
            return Err(HydroCalError::engine(format!(
                "engine evaluated 2 + 2 as {}",
                value
            )));
        }
        info!("Engine check passed (2 + 2 = {})", value);
        Ok(value)
    }

    fn evaluate_check_expression(&mut self) -> Result<f64> {
        let session = self.session.insert(self.engine.start()?);
        let outputs = session.call("eval", &[EngineArg::text("2 + 2")], 1)?;
        outputs
            .first()
            .and_then(as_scalar)
            .ok_or_else(|| HydroCalError::protocol("eval('2 + 2') did not return a number"))
    }

    /// One Idle → Active → Idle cycle around `f`.
    fn in_session<T>(
        &mut self,
        f: impl FnOnce(&mut E::Session, &ExecutionParams) -> Result<T>,
    ) -> Result<T> {
        let result = self.open_and_run(f);
        self.close_session();
        result
    }

    fn open_and_run<T>(
        &mut self,
        f: impl FnOnce(&mut E::Session, &ExecutionParams) -> Result<T>,
    ) -> Result<T> {
        let session = self.session.insert(self.engine.start()?);
        for path in self.search_paths.existing() {
            session.add_path(path)?;
        }
        let execution = ExecutionParams::compute(session, &self.date_range)?;
        debug!(
            "Execution dates: {} -> {}, {} -> {}",
            self.date_range.start_date,
            execution.date_debut,
            self.date_range.end_date,
            execution.date_fin
        );
        f(session, &execution)
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.quit() {
                warn!("Failed to stop engine session cleanly: {}", e);
            }
        }
    }
}

impl<E: Engine> Drop for ModelRunner<E> {
    fn drop(&mut self) {
        self.close_session();
    }
}

/// Caller value if non-empty, else the configured one.
fn resolve(explicit: Option<String>, configured: &Option<String>) -> Option<String> {
    explicit
        .filter(|v| !v.is_empty())
        .or_else(|| configured.clone())
}

fn resolve_output_vars(explicit: Option<Vec<String>>, settings: &SimulationSettings) -> Vec<String> {
    explicit
        .filter(|v| !v.is_empty())
        .or_else(|| settings.output_vars.clone().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| vec![DEFAULT_OUTPUT_VAR.to_string()])
}

fn parse_thermie(settings: &SimulationSettings) -> Result<i64> {
    match &settings.thermie {
        None => Ok(0),
        Some(raw) => raw.trim().parse().map_err(|_| {
            HydroCalError::validation(format!("[SIMULATION] thermie must be an integer, got '{}'", raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_non_empty_explicit_value() {
        let configured = Some("from-config".to_string());
        assert_eq!(
            resolve(Some("explicit".to_string()), &configured).as_deref(),
            Some("explicit")
        );
        assert_eq!(
            resolve(Some(String::new()), &configured).as_deref(),
            Some("from-config")
        );
        assert_eq!(resolve(None, &None), None);
    }

    #[test]
    fn test_resolve_output_vars_defaults_to_debit() {
        let settings = SimulationSettings::default();
        assert_eq!(resolve_output_vars(None, &settings), vec!["debit"]);
        assert_eq!(resolve_output_vars(Some(vec![]), &settings), vec!["debit"]);

        let settings = SimulationSettings {
            output_vars: Some(vec!["volume".to_string()]),
            ..Default::default()
        };
        assert_eq!(resolve_output_vars(None, &settings), vec!["volume"]);
        assert_eq!(
            resolve_output_vars(Some(vec!["debit".to_string()]), &settings),
            vec!["debit"]
        );
    }

    #[test]
    fn test_parse_thermie() {
        let mut settings = SimulationSettings::default();
        assert_eq!(parse_thermie(&settings).unwrap(), 0);

        settings.thermie = Some("1".to_string());
        assert_eq!(parse_thermie(&settings).unwrap(), 1);

        settings.thermie = Some("yes".to_string());
        assert!(parse_thermie(&settings).unwrap_err().is_validation());
    }
}
