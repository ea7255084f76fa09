//! hydrocal library
//!
//! Settings management and an engine session manager for running a MATLAB
//! hydrological model: simulations, flow calibrations and sensitivity
//! analyses.

pub mod cli;
pub mod config_file;
pub mod dates;
pub mod engine;
pub mod error;
pub mod logging;
pub mod process_guard;
pub mod routines;
pub mod runner;
pub mod types;

// Re-export main types for convenience
pub use config_file::{
    CalibrationSettings, ConfigStore, DEFAULT_CONFIG_FILE, SettingValue, Settings,
    SimulationSettings,
};
pub use engine::matlab::MatlabEngine;
pub use engine::recording::{EngineEvent, RecordingEngine};
pub use engine::{Engine, EngineArg, EngineSession, EngineValue};
pub use error::{HydroCalError, Result};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use routines::{
    CalibrationCall, ExecutionParams, ParameterRanges, RoutineCall, SensitivityCall,
    SimulationCall,
};
pub use runner::{
    CALIBRATION_RESULTS_ROOT, CalibrationOptions, ModelRunner, ResolvedSettings,
    SensitivityOptions, SimulationOptions,
};
pub use types::{DateRange, SearchPaths, Section};
