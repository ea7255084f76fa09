//! Shared configuration types for hydrocal
//!
//! Section names are modelled as an enum so accessors cannot misspell them;
//! values inside the sections stay strings until an accessor coerces them.

use serde::Serialize;
use std::path::{Path, PathBuf};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Default simulation start date when DATES does not provide one.
pub const DEFAULT_START_DATE: &str = "1979-1-1";
/// Default simulation end date when DATES does not provide one.
pub const DEFAULT_END_DATE: &str = "2000-12-31";

/// Known sections of the settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Section {
    /// Named engine search paths
    Paths,
    /// Simulation period
    Dates,
    /// Objective function, calibration mode and partition count
    Calibration,
    /// Inputs and outputs of the model routines
    Simulation,
}

/// Start/end date strings, passed to the engine verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

impl DateRange {
    pub fn new(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::new(DEFAULT_START_DATE, DEFAULT_END_DATE)
    }
}

/// Ordered name → directory mapping of engine search paths.
///
/// Order matters: the engine resolves routines along its path, so paths are
/// registered in the order they appear in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SearchPaths {
    entries: Vec<(String, PathBuf)>,
}

impl SearchPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths used when the settings file has no PATHS entries.
    pub fn defaults() -> Self {
        [
            ("main", "src"),
            ("functions", "src/matlab_functions"),
            ("calibration", "src/calibration"),
            ("sensitivity", "src/sensitivity_analysis"),
            ("results", "results"),
        ]
        .into_iter()
        .collect()
    }

    /// Insert or replace a named path. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        let name = name.into();
        let path = path.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = path,
            None => self.entries.push((name, path)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p.as_path()))
    }

    /// Paths that currently exist on disk, in registration order.
    pub fn existing(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .map(|(_, p)| p.as_path())
            .filter(|p| p.exists())
    }
}

impl<N: Into<String>, P: Into<PathBuf>> FromIterator<(N, P)> for SearchPaths {
    fn from_iter<I: IntoIterator<Item = (N, P)>>(iter: I) -> Self {
        let mut paths = Self::new();
        for (name, path) in iter {
            paths.insert(name, path);
        }
        paths
    }
}
