use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config_file::DEFAULT_CONFIG_FILE;

/// hydrocal - drive hydrological model simulations and calibrations
#[derive(Parser, Debug)]
#[command(name = "hydrocal")]
#[command(about = "Run hydrological model simulations, calibrations and sensitivity analyses")]
#[command(version)]
pub struct Cli {
    /// Settings file (INI-style, sections PATHS, DATES, CALIBRATION, SIMULATION)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Dry-run mode: record and log the engine calls instead of launching MATLAB.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Engine executable
    #[arg(long, global = true, default_value = "matlab")]
    pub matlab: PathBuf,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run main_simulation and print its result
    Simulate {
        /// Physiographic data directory (default: [SIMULATION] physiographic_path)
        #[arg(long)]
        physiographic_path: Option<String>,
        /// Parameter file name (default: [SIMULATION] params_file)
        #[arg(long)]
        params: Option<String>,
        /// Output variables, comma-separated (default: [SIMULATION] output_vars, then debit)
        #[arg(long, value_delimiter = ',')]
        output_vars: Option<Vec<String>>,
        /// Verbosity passed to the routine (default: [SIMULATION] verbose)
        #[arg(long)]
        model_verbose: Option<i64>,
        /// Write the result as JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run main_calibration_flow; exit status is the calibration status
    Calibrate {
        #[arg(long)]
        physiographic_path: Option<String>,
        /// Observed flow file (default: [SIMULATION] flow_file_path)
        #[arg(long)]
        flow_file: Option<String>,
        #[arg(long)]
        params: Option<String>,
        #[arg(long)]
        model_verbose: Option<i64>,
    },
    /// Run main_sensitivity over parameter ranges
    Sensitivity {
        /// Ranges as a JSON object ({"X1": [10, 2000]}), or @file to read it from a file
        #[arg(long)]
        ranges: String,
        #[arg(long)]
        physiographic_path: Option<String>,
        #[arg(long)]
        params: Option<String>,
        #[arg(long)]
        model_verbose: Option<i64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Register a named engine search path under [PATHS]
    AddPath {
        name: String,
        path: PathBuf,
    },
    /// Set the simulation period under [DATES]
    SetDates {
        /// Start date, e.g. 1979-1-1
        start: String,
        /// End date, e.g. 2000-12-31
        end: String,
    },
    /// Set the calibration objective function under [CALIBRATION]
    SetObjective {
        /// Objective name, e.g. KGE or NSE
        name: String,
    },
    /// Print the settings file
    Show {
        /// Print the values a run would use, defaults applied
        #[arg(long)]
        resolved: bool,
        /// Print the resolved values as JSON
        #[arg(long, requires = "resolved")]
        json: bool,
    },
    /// Write a template settings file
    Init,
    /// Check that the engine starts and evaluates expressions
    Check,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["hydrocal"]).is_err());
    }

    #[test]
    fn test_cli_global_defaults() {
        let cli = Cli::try_parse_from(["hydrocal", "check"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("simulations_setup.txt"));
        assert_eq!(cli.matlab, PathBuf::from("matlab"));
        assert!(!cli.dry_run);
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn test_cli_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hydrocal",
            "calibrate",
            "--dry-run",
            "--config",
            "setup.txt",
            "--flow-file",
            "data/flow.csv",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert_eq!(cli.config, PathBuf::from("setup.txt"));
        match cli.command {
            Commands::Calibrate {
                flow_file,
                physiographic_path,
                ..
            } => {
                assert_eq!(flow_file.as_deref(), Some("data/flow.csv"));
                assert!(physiographic_path.is_none());
            }
            other => panic!("Expected Calibrate command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_simulate_output_vars() {
        let cli = Cli::try_parse_from([
            "hydrocal",
            "simulate",
            "--output-vars",
            "debit,volume",
            "--model-verbose",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate {
                output_vars,
                model_verbose,
                ..
            } => {
                assert_eq!(
                    output_vars,
                    Some(vec!["debit".to_string(), "volume".to_string()])
                );
                assert_eq!(model_verbose, Some(2));
            }
            other => panic!("Expected Simulate command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_sensitivity_requires_ranges() {
        assert!(Cli::try_parse_from(["hydrocal", "sensitivity"]).is_err());
        assert!(Cli::try_parse_from(["hydrocal", "sensitivity", "--ranges", "@r.json"]).is_ok());
    }

    #[test]
    fn test_cli_positional_commands() {
        let cli = Cli::try_parse_from(["hydrocal", "set-dates", "1980-1-1", "1990-12-31"]).unwrap();
        match cli.command {
            Commands::SetDates { start, end } => {
                assert_eq!(start, "1980-1-1");
                assert_eq!(end, "1990-12-31");
            }
            other => panic!("Expected SetDates command, got {:?}", other),
        }

        assert!(Cli::try_parse_from(["hydrocal", "add-path", "tools"]).is_err());
        assert!(Cli::try_parse_from(["hydrocal", "add-path", "tools", "src/tools"]).is_ok());
        assert!(Cli::try_parse_from(["hydrocal", "set-objective", "NSE"]).is_ok());
        assert!(Cli::try_parse_from(["hydrocal", "show", "--resolved"]).is_ok());
        assert!(Cli::try_parse_from(["hydrocal", "show", "--resolved", "--json"]).is_ok());
        assert!(Cli::try_parse_from(["hydrocal", "show", "--json"]).is_err());
    }
}
