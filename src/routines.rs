//! Type-safe contracts for the external model routines.
//!
//! Each routine the engine exposes gets a struct implementing [`RoutineCall`].
//! The struct is the single source of truth for the routine's positional
//! argument order and output count, so a reordered or missing argument is a
//! compile error rather than a confusing failure deep inside the engine.
//!
//! | Routine                 | Arguments                                                       | Outputs |
//! |-------------------------|-----------------------------------------------------------------|---------|
//! | `main_simulation`       | path, params, execution, output vars, verbose                   | 1       |
//! | `main_calibration_flow` | path, flow file, params, execution, prefix, CP, thermie         | 0       |
//! | `main_sensitivity`      | path, params, execution, parameter ranges, verbose              | 1       |

use std::collections::BTreeMap;
use tracing::info;

use crate::engine::value::as_scalar;
use crate::engine::{EngineArg, EngineSession, EngineValue};
use crate::error::{HydroCalError, Result};
use crate::types::DateRange;

/// Parameter name → values explored by the sensitivity analysis.
pub type ParameterRanges = BTreeMap<String, Vec<f64>>;

/// Engine-native encodings of the configured dates, recomputed per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionParams {
    pub date_debut: f64,
    pub date_fin: f64,
}

impl ExecutionParams {
    /// Ask the engine to convert the date range with `datenum`.
    pub fn compute<S: EngineSession>(session: &mut S, range: &DateRange) -> Result<Self> {
        Ok(Self {
            date_debut: engine_datenum(session, &range.start_date)?,
            date_fin: engine_datenum(session, &range.end_date)?,
        })
    }

    /// The `execution` struct argument (`dateDebut`, `dateFin`).
    pub fn to_engine_arg(&self) -> EngineArg {
        EngineArg::Struct(vec![
            ("dateDebut".to_string(), EngineArg::Float(self.date_debut)),
            ("dateFin".to_string(), EngineArg::Float(self.date_fin)),
        ])
    }
}

fn engine_datenum<S: EngineSession>(session: &mut S, date: &str) -> Result<f64> {
    let outputs = session.call("datenum", &[EngineArg::text(date)], 1)?;
    outputs.first().and_then(as_scalar).ok_or_else(|| {
        HydroCalError::protocol(format!("datenum('{}') did not return a number", date))
    })
}

/// Trait for typed routine arguments.
///
/// # Contract
///
/// - `routine_name()`: the engine function to call, resolved on the engine's
///   search path.
/// - `to_engine_args()`: positional arguments exactly as the routine expects
///   them; `execution` carries the per-call date codes.
/// - `nargout()`: number of outputs the routine must return.
pub trait RoutineCall {
    fn routine_name(&self) -> &'static str;

    fn to_engine_args(&self, execution: &ExecutionParams) -> Vec<EngineArg>;

    fn nargout(&self) -> usize;
}

/// Invoke a routine on a live session.
pub fn invoke<S, C>(session: &mut S, call: &C, execution: &ExecutionParams) -> Result<Vec<EngineValue>>
where
    S: EngineSession,
    C: RoutineCall,
{
    let args = call.to_engine_args(execution);
    info!(
        "invoke: {} ({} argument(s), nargout={})",
        call.routine_name(),
        args.len(),
        call.nargout()
    );
    session.call(call.routine_name(), &args, call.nargout())
}

// ============================================================================
// Simulation
// ============================================================================

/// Arguments for `main_simulation`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationCall {
    /// Directory holding the physiographic preprocessing results.
    pub physiographic_path: String,
    /// Parameter file name (JSON), resolved by the routine.
    pub params_file: String,
    /// Output variables to return, e.g. `debit`.
    pub output_vars: Vec<String>,
    pub verbose: i64,
}

impl RoutineCall for SimulationCall {
    fn routine_name(&self) -> &'static str {
        "main_simulation"
    }

    fn to_engine_args(&self, execution: &ExecutionParams) -> Vec<EngineArg> {
        vec![
            EngineArg::text(&self.physiographic_path),
            EngineArg::text(&self.params_file),
            execution.to_engine_arg(),
            EngineArg::text_list(&self.output_vars),
            EngineArg::Int(self.verbose),
        ]
    }

    fn nargout(&self) -> usize {
        1
    }
}

// ============================================================================
// Flow calibration
// ============================================================================

/// Arguments for `main_calibration_flow`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCall {
    pub physiographic_path: String,
    /// Observed flow series the objective function is computed against.
    pub flow_file_path: String,
    pub params_file: String,
    /// Path prefix for every file the calibration writes.
    pub output_prefix: String,
    /// Concurrency/partition count (`CP`), opaque to hydrocal.
    pub partition_count: u32,
    /// Thermal-mode flag, opaque to hydrocal.
    pub thermie: i64,
}

impl RoutineCall for CalibrationCall {
    fn routine_name(&self) -> &'static str {
        "main_calibration_flow"
    }

    fn to_engine_args(&self, execution: &ExecutionParams) -> Vec<EngineArg> {
        vec![
            EngineArg::text(&self.physiographic_path),
            EngineArg::text(&self.flow_file_path),
            EngineArg::text(&self.params_file),
            execution.to_engine_arg(),
            EngineArg::text(&self.output_prefix),
            EngineArg::Int(i64::from(self.partition_count)),
            EngineArg::Int(self.thermie),
        ]
    }

    fn nargout(&self) -> usize {
        0
    }
}

// ============================================================================
// Sensitivity analysis
// ============================================================================

/// Arguments for `main_sensitivity`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityCall {
    pub physiographic_path: String,
    pub params_file: String,
    pub parameter_ranges: ParameterRanges,
    pub verbose: i64,
}

impl SensitivityCall {
    /// Ranges become a struct with one cell array of doubles per parameter.
    fn ranges_arg(&self) -> EngineArg {
        EngineArg::Struct(
            self.parameter_ranges
                .iter()
                .map(|(name, values)| {
                    let cells = values.iter().copied().map(EngineArg::Float).collect();
                    (name.clone(), EngineArg::List(cells))
                })
                .collect(),
        )
    }
}

impl RoutineCall for SensitivityCall {
    fn routine_name(&self) -> &'static str {
        "main_sensitivity"
    }

    fn to_engine_args(&self, execution: &ExecutionParams) -> Vec<EngineArg> {
        vec![
            EngineArg::text(&self.physiographic_path),
            EngineArg::text(&self.params_file),
            execution.to_engine_arg(),
            self.ranges_arg(),
            EngineArg::Int(self.verbose),
        ]
    }

    fn nargout(&self) -> usize {
        1
    }
}
