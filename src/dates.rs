//! Native computation of engine serial date numbers.
//!
//! The engine counts days from the proleptic year 0 (`0000-01-01` is day 1).
//! Real sessions ask the engine itself; this is used by the recording engine
//! and to sanity-check date strings.

use chrono::{Datelike, NaiveDate};

use crate::error::{HydroCalError, Result};

/// Days between the engine's epoch and chrono's day 1 (`0001-01-01`).
const EPOCH_OFFSET: i64 = 366;

/// Parse `Y-M-D` (or `Y/M/D`), with or without zero padding.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y/%m/%d"))
        .map_err(|e| HydroCalError::validation(format!("invalid date '{}': {}", text, e)))
}

/// Serial day number of `date`, as the engine's `datenum` reports it.
pub fn datenum(date: NaiveDate) -> f64 {
    (i64::from(date.num_days_from_ce()) + EPOCH_OFFSET) as f64
}

/// Parse and convert in one step.
pub fn datenum_str(text: &str) -> Result<f64> {
    parse_date(text).map(datenum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_date_numbers() {
        assert_eq!(datenum_str("2023-01-01").unwrap(), 738887.0);
        assert_eq!(datenum_str("0001-01-01").unwrap(), 367.0);
        assert_eq!(datenum_str("2000-01-01").unwrap(), 730486.0);
    }

    #[test]
    fn test_unpadded_and_slashed_dates() {
        assert_eq!(
            parse_date("1979-1-1").unwrap(),
            NaiveDate::from_ymd_opt(1979, 1, 1).unwrap()
        );
        assert_eq!(
            parse_date("2000/12/31").unwrap(),
            NaiveDate::from_ymd_opt(2000, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_consecutive_days_differ_by_one() {
        let a = datenum_str("2000-12-31").unwrap();
        let b = datenum_str("2001-1-1").unwrap();
        assert_eq!(b - a, 1.0);
    }

    #[test]
    fn test_invalid_dates() {
        assert!(parse_date("2001-02-30").is_err());
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("").is_err());
    }
}
