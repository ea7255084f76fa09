//! Settings file handling: parsing, saving and typed access.
//!
//! The file is a sectioned `key = value` text format:
//!
//! ```text
//! # comment
//! [SIMULATION]
//! physiographic_path = data/physio
//! output_vars = debit,volume   # inline comment
//! ```
//!
//! Keys are case-insensitive and kept lower-cased. Values are plain strings;
//! the typed accessors on [`ConfigStore`] do all coercion. Every mutation goes
//! straight back to disk.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{HydroCalError, Result};
use crate::types::{DEFAULT_END_DATE, DEFAULT_START_DATE, DateRange, SearchPaths, Section};

/// Default location of the settings file.
pub const DEFAULT_CONFIG_FILE: &str = "simulations_setup.txt";

/// One `[NAME]` block of the settings file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTable {
    name: String,
    entries: Vec<(String, String)>,
}

impl SectionTable {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = normalize_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a key, keeping its position if it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = normalize_key(key);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// In-memory image of the settings file, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    sections: Vec<SectionTable>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the text of a settings file.
    ///
    /// Blank lines and lines starting with `#` are skipped. A `#` preceded by
    /// whitespace starts an inline comment. Duplicate sections, duplicate keys
    /// and entries outside any section are errors.
    pub fn parse(text: &str) -> Result<Self> {
        let mut settings = Self::new();
        let mut current: Option<usize> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = strip_inline_comment(rest)
                    .trim_end()
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        HydroCalError::config(format!("line {}: malformed section header", line_no))
                    })?;
                if settings.section(name).is_some() {
                    return Err(HydroCalError::config(format!(
                        "line {}: duplicate section [{}]",
                        line_no, name
                    )));
                }
                settings.sections.push(SectionTable::new(name));
                current = Some(settings.sections.len() - 1);
                continue;
            }

            let Some(idx) = current else {
                return Err(HydroCalError::config(format!(
                    "line {}: entry appears before any [SECTION] header",
                    line_no
                )));
            };

            let delimiter = line.find(['=', ':']).ok_or_else(|| {
                HydroCalError::config(format!("line {}: expected `key = value`", line_no))
            })?;
            let key = line[..delimiter].trim();
            if key.is_empty() {
                return Err(HydroCalError::config(format!("line {}: empty key", line_no)));
            }
            let value = strip_inline_comment(line[delimiter + 1..].trim_start()).trim();

            let table = &mut settings.sections[idx];
            if table.contains_key(key) {
                return Err(HydroCalError::config(format!(
                    "line {}: duplicate key '{}' in [{}]",
                    line_no,
                    normalize_key(key),
                    table.name
                )));
            }
            table.set(key, value);
        }

        Ok(settings)
    }

    /// Render in the canonical on-disk form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in &self.sections {
            out.push('[');
            out.push_str(&table.name);
            out.push_str("]\n");
            for (key, value) in &table.entries {
                if value.is_empty() {
                    out.push_str(&format!("{} =\n", key));
                } else {
                    out.push_str(&format!("{} = {}\n", key, value));
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn section(&self, name: &str) -> Option<&SectionTable> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Mutable access to a section, creating an empty one at the end if absent.
    pub fn section_mut(&mut self, name: &str) -> &mut SectionTable {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(SectionTable::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionTable> {
        self.sections.iter()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn strip_inline_comment(value: &str) -> &str {
    let mut prev_whitespace = false;
    for (i, c) in value.char_indices() {
        if c == '#' && prev_whitespace {
            return &value[..i];
        }
        prev_whitespace = c.is_whitespace();
    }
    value
}

/// Section names must render as a single `[NAME]` header.
fn validate_section_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name != name.trim()
        || name.contains(['[', ']'])
        || name.chars().any(char::is_control)
        || strip_inline_comment(name).len() != name.len()
    {
        return Err(HydroCalError::config(format!(
            "'{}' is not a valid section name",
            name.escape_debug()
        )));
    }
    Ok(())
}

/// Keys must parse back as the same key: no delimiter, no line or section
/// syntax.
fn validate_key(section: &str, key: &str) -> Result<()> {
    let trimmed = key.trim();
    if trimmed.is_empty()
        || trimmed.contains(['=', ':'])
        || trimmed.starts_with(['[', '#'])
        || trimmed.chars().any(char::is_control)
    {
        return Err(HydroCalError::config(format!(
            "[{}] '{}' is not a valid key",
            section,
            key.escape_debug()
        )));
    }
    Ok(())
}

/// Values are stored trimmed, and must not contain line breaks (or other
/// control characters) or anything the parser would read as a comment.
fn validate_value(section: &str, key: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.chars().any(char::is_control) {
        return Err(HydroCalError::config(format!(
            "[{}] {}: value '{}' contains control characters",
            section,
            key,
            value.escape_debug()
        )));
    }
    if strip_inline_comment(value).len() != value.len() {
        return Err(HydroCalError::config(format!(
            "[{}] {}: value '{}' contains an inline comment marker",
            section, key, value
        )));
    }
    Ok(value.to_string())
}

/// A value accepted by [`ConfigStore::update_section`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Text(String),
    /// Persisted as a comma-joined string
    List(Vec<String>),
}

impl SettingValue {
    fn to_setting_string(&self) -> String {
        match self {
            SettingValue::Text(s) => s.clone(),
            SettingValue::List(items) => items.join(","),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Text(s)
    }
}

impl From<&Path> for SettingValue {
    fn from(p: &Path) -> Self {
        SettingValue::Text(p.display().to_string())
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Text(n.to_string())
    }
}

impl From<u32> for SettingValue {
    fn from(n: u32) -> Self {
        SettingValue::Text(n.to_string())
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(items: Vec<String>) -> Self {
        SettingValue::List(items)
    }
}

impl From<Vec<&str>> for SettingValue {
    fn from(items: Vec<&str>) -> Self {
        SettingValue::List(items.into_iter().map(String::from).collect())
    }
}

/// Resolved CALIBRATION section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalibrationSettings {
    pub objective_function: String,
    /// Calibration mode, e.g. `single_site`
    pub calibration_type: String,
    /// Concurrency/partition count handed to the calibration routine (`CP`)
    pub partition_count: u32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            objective_function: "KGE".to_string(),
            calibration_type: "single_site".to_string(),
            partition_count: 1,
        }
    }
}

/// Resolved SIMULATION section. Unset or empty entries are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulationSettings {
    pub physiographic_path: Option<String>,
    pub params_file: Option<String>,
    pub flow_file_path: Option<String>,
    pub output_vars: Option<Vec<String>>,
    pub verbose: i64,
    /// Thermal-mode flag, passed through to the calibration routine
    pub thermie: Option<String>,
}

/// Settings file bound to a path on disk
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    settings: Settings,
}

impl ConfigStore {
    /// Open and load an existing settings file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self {
            path: path.into(),
            settings: Settings::new(),
        };
        store.load()?;
        Ok(store)
    }

    /// Write a fresh settings file populated with the default values.
    ///
    /// Refuses to overwrite an existing file.
    pub fn create_template(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            return Err(HydroCalError::config(format!(
                "{} already exists; refusing to overwrite",
                path.display()
            )));
        }

        let mut settings = Settings::new();
        {
            let paths = settings.section_mut(Section::Paths.as_ref());
            for (name, dir) in SearchPaths::defaults().iter() {
                paths.set(name, dir.display().to_string());
            }
        }
        {
            let dates = settings.section_mut(Section::Dates.as_ref());
            dates.set("start_date", DEFAULT_START_DATE);
            dates.set("end_date", DEFAULT_END_DATE);
        }
        {
            let defaults = CalibrationSettings::default();
            let calibration = settings.section_mut(Section::Calibration.as_ref());
            calibration.set("objective_function", defaults.objective_function);
            calibration.set("type", defaults.calibration_type);
            calibration.set("CP", defaults.partition_count.to_string());
        }
        {
            let simulation = settings.section_mut(Section::Simulation.as_ref());
            simulation.set("physiographic_path", "");
            simulation.set("params_file", "");
            simulation.set("flow_file_path", "");
            simulation.set("output_vars", "debit");
            simulation.set("verbose", "0");
            simulation.set("thermie", "0");
        }

        let store = Self { path, settings };
        store.save()?;
        Ok(store)
    }

    /// Reload from disk, replacing the in-memory settings.
    pub fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Err(HydroCalError::ConfigNotFound(self.path.clone()));
        }
        let text = fs::read_to_string(&self.path)?;
        self.settings = Settings::parse(&text).map_err(|e| match e {
            HydroCalError::Config(msg) => {
                HydroCalError::config(format!("{}: {}", self.path.display(), msg))
            }
            other => other,
        })?;
        debug!("Loaded settings from {}", self.path.display());
        Ok(())
    }

    /// Overwrite the backing file with the current settings.
    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, self.settings.render())?;
        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// PATHS entries in file order. Empty when the section is missing.
    pub fn matlab_paths(&self) -> SearchPaths {
        self.settings
            .section(Section::Paths.as_ref())
            .map(|s| s.iter().collect())
            .unwrap_or_default()
    }

    pub fn date_range(&self) -> DateRange {
        let dates = Section::Dates.as_ref();
        DateRange::new(
            self.get_value(dates, "start_date", Some(DEFAULT_START_DATE))
                .unwrap_or_default(),
            self.get_value(dates, "end_date", Some(DEFAULT_END_DATE))
                .unwrap_or_default(),
        )
    }

    /// CALIBRATION entries with defaults applied.
    ///
    /// `CP` must be a positive integer when present.
    pub fn calibration_settings(&self) -> Result<CalibrationSettings> {
        let mut settings = CalibrationSettings::default();
        let Some(section) = self.settings.section(Section::Calibration.as_ref()) else {
            return Ok(settings);
        };

        if let Some(name) = section.get("objective_function") {
            settings.objective_function = name.to_string();
        }
        if let Some(kind) = section.get("type") {
            settings.calibration_type = kind.to_string();
        }
        if let Some(cp) = section.get("cp") {
            settings.partition_count = match cp.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(HydroCalError::config(format!(
                        "[CALIBRATION] CP must be a positive integer, got '{}'",
                        cp
                    )));
                }
            };
        }
        Ok(settings)
    }

    /// SIMULATION entries; `output_vars` split on commas, `verbose` coerced.
    pub fn simulation_settings(&self) -> SimulationSettings {
        let mut settings = SimulationSettings::default();
        let Some(section) = self.settings.section(Section::Simulation.as_ref()) else {
            return settings;
        };

        let non_empty = |key: &str| {
            section
                .get(key)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        settings.physiographic_path = non_empty("physiographic_path");
        settings.params_file = non_empty("params_file");
        settings.flow_file_path = non_empty("flow_file_path");
        settings.thermie = non_empty("thermie");
        settings.output_vars = section.get("output_vars").map(|vars| {
            vars.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        });
        if let Some(verbose) = section.get("verbose") {
            settings.verbose = verbose.trim().parse().unwrap_or_else(|_| {
                warn!("[SIMULATION] verbose '{}' is not an integer, using 0", verbose);
                0
            });
        }
        settings
    }

    /// Merge values into a section (created if missing) and persist.
    pub fn update_section<K, V, I>(&mut self, section: &str, values: I) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<SettingValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        validate_section_name(section)?;
        let mut entries = Vec::new();
        for (key, value) in values {
            let key = key.as_ref();
            validate_key(section, key)?;
            let value = value.into().to_setting_string();
            entries.push((key.to_string(), validate_value(section, key, &value)?));
        }

        let table = self.settings.section_mut(section);
        for (key, value) in entries {
            table.set(&key, value);
        }
        self.save()
    }

    /// Single-key lookup with fallback.
    pub fn get_value(&self, section: &str, key: &str, default: Option<&str>) -> Option<String> {
        self.settings
            .get(section, key)
            .or(default)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
# Hydrological model setup
[PATHS]
main = src
functions = src/matlab_functions

[DATES]
start_date = 1980-1-1
end_date=1990-12-31

[CALIBRATION]
objective_function = NSE
type = multi_site
CP = 4

[SIMULATION]
physiographic_path = data/physio   # generated upstream
params_file = params.json
output_vars = debit, volume
verbose = loud
";

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_sections_and_comments() {
        let settings = Settings::parse(SAMPLE).unwrap();
        let names: Vec<&str> = settings.sections().map(|s| s.name()).collect();
        assert_eq!(names, ["PATHS", "DATES", "CALIBRATION", "SIMULATION"]);
        assert_eq!(settings.get("DATES", "end_date"), Some("1990-12-31"));
        assert_eq!(
            settings.get("SIMULATION", "physiographic_path"),
            Some("data/physio")
        );
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let settings = Settings::parse(SAMPLE).unwrap();
        assert_eq!(settings.get("CALIBRATION", "cp"), Some("4"));
        assert_eq!(settings.get("CALIBRATION", "CP"), Some("4"));
    }

    #[test]
    fn test_colon_delimiter_and_empty_value() {
        let settings = Settings::parse("[A]\nkey: value\nempty =\n").unwrap();
        assert_eq!(settings.get("A", "key"), Some("value"));
        assert_eq!(settings.get("A", "empty"), Some(""));
    }

    #[test]
    fn test_hash_without_leading_whitespace_is_kept() {
        let settings = Settings::parse("[A]\ncolor = #ff0000\ntag = a#b\n").unwrap();
        assert_eq!(settings.get("A", "color"), Some("#ff0000"));
        assert_eq!(settings.get("A", "tag"), Some("a#b"));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(Settings::parse("key = value\n").is_err());
        assert!(Settings::parse("[A]\njust text\n").is_err());
        assert!(Settings::parse("[A]\nk = 1\nK = 2\n").is_err());
        assert!(Settings::parse("[A]\n[A]\n").is_err());
        assert!(Settings::parse("[A\n").is_err());
    }

    #[test]
    fn test_render_is_canonical() {
        let settings = Settings::parse("[DATES]\nstart_date=1979-1-1\n# note\nend_date :2000-12-31\n").unwrap();
        assert_eq!(
            settings.render(),
            "[DATES]\nstart_date = 1979-1-1\nend_date = 2000-12-31\n\n"
        );
    }

    #[test]
    fn test_render_parse_round_trip() {
        let settings = Settings::parse(SAMPLE).unwrap();
        let reparsed = Settings::parse(&settings.render()).unwrap();
        assert_eq!(settings, reparsed);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigStore::open(dir.path().join("missing.txt"));
        assert!(matches!(result, Err(HydroCalError::ConfigNotFound(_))));
    }

    #[test]
    fn test_typed_accessors() {
        let file = write_temp(SAMPLE);
        let store = ConfigStore::open(file.path()).unwrap();

        let paths = store.matlab_paths();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths.get("functions"), Some(Path::new("src/matlab_functions")));

        assert_eq!(store.date_range(), DateRange::new("1980-1-1", "1990-12-31"));

        let calibration = store.calibration_settings().unwrap();
        assert_eq!(calibration.objective_function, "NSE");
        assert_eq!(calibration.calibration_type, "multi_site");
        assert_eq!(calibration.partition_count, 4);

        let simulation = store.simulation_settings();
        assert_eq!(simulation.physiographic_path.as_deref(), Some("data/physio"));
        assert_eq!(simulation.params_file.as_deref(), Some("params.json"));
        assert_eq!(
            simulation.output_vars,
            Some(vec!["debit".to_string(), "volume".to_string()])
        );
        // "loud" is not an integer
        assert_eq!(simulation.verbose, 0);
        assert_eq!(simulation.flow_file_path, None);
    }

    #[test]
    fn test_defaults_for_missing_sections() {
        let file = write_temp("[OTHER]\nx = 1\n");
        let store = ConfigStore::open(file.path()).unwrap();

        assert!(store.matlab_paths().is_empty());
        assert_eq!(store.date_range(), DateRange::default());
        assert_eq!(
            store.calibration_settings().unwrap(),
            CalibrationSettings::default()
        );
        assert_eq!(store.simulation_settings(), SimulationSettings::default());
    }

    #[test]
    fn test_invalid_partition_count() {
        for bad in ["zero", "0", "-2", "1.5"] {
            let file = write_temp(&format!("[CALIBRATION]\nCP = {}\n", bad));
            let store = ConfigStore::open(file.path()).unwrap();
            assert!(
                matches!(store.calibration_settings(), Err(HydroCalError::Config(_))),
                "CP = {} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_update_section_persists_immediately() {
        let file = write_temp(SAMPLE);
        let mut store = ConfigStore::open(file.path()).unwrap();

        store
            .update_section("DATES", [("start_date", "1990-1-1")])
            .unwrap();
        store
            .update_section("NEW", [("answer", SettingValue::from(42i64))])
            .unwrap();

        let on_disk = fs::read_to_string(file.path()).unwrap();
        assert!(on_disk.contains("start_date = 1990-1-1"));
        assert!(on_disk.contains("[NEW]\nanswer = 42\n"));
        assert!(!on_disk.contains("# Hydrological model setup"));
    }

    #[test]
    fn test_update_section_rejects_values_that_break_the_file() {
        let file = write_temp(SAMPLE);
        let mut store = ConfigStore::open(file.path()).unwrap();
        let before = fs::read_to_string(file.path()).unwrap();

        for bad in ["a\nb", "x\n[DATES]\nstart_date = 1", "tab\there", "src # scripts"] {
            let result = store.update_section("PATHS", [("extra", bad)]);
            assert!(
                matches!(result, Err(HydroCalError::Config(_))),
                "{:?} should be rejected",
                bad
            );
        }

        // Nothing reached memory or disk.
        assert_eq!(store.settings().get("PATHS", "extra"), None);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), before);
        assert!(ConfigStore::open(file.path()).is_ok());
    }

    #[test]
    fn test_update_section_rejects_keys_that_reparse_differently() {
        let file = write_temp(SAMPLE);
        let mut store = ConfigStore::open(file.path()).unwrap();

        for bad in ["c:tools", "a=b", "[x", "#x", "", "  "] {
            let result = store.update_section("PATHS", [(bad, "x")]);
            assert!(
                matches!(result, Err(HydroCalError::Config(_))),
                "key {:?} should be rejected",
                bad
            );
        }
        for bad in ["A]", "[A", "", " A", "A #note"] {
            let result = store.update_section(bad, [("k", "v")]);
            assert!(
                matches!(result, Err(HydroCalError::Config(_))),
                "section {:?} should be rejected",
                bad
            );
        }
        // A rejected entry leaves earlier ones in the same batch unwritten too.
        assert!(
            store
                .update_section("PATHS", [("good", "ok"), ("c:bad", "x")])
                .is_err()
        );
        assert_eq!(store.settings().get("PATHS", "good"), None);
    }

    #[test]
    fn test_update_section_reloads_identically() {
        let file = write_temp(SAMPLE);
        let mut store = ConfigStore::open(file.path()).unwrap();

        store
            .update_section(
                "PATHS",
                [("tools", "  ./extra scripts  "), ("Colour", "#ff0000"), ("empty", "")],
            )
            .unwrap();

        let reloaded = ConfigStore::open(file.path()).unwrap();
        assert_eq!(reloaded.settings(), store.settings());
        assert_eq!(reloaded.settings().get("PATHS", "tools"), Some("./extra scripts"));
        assert_eq!(reloaded.settings().get("PATHS", "colour"), Some("#ff0000"));
    }

    #[test]
    fn test_section_header_with_inline_comment() {
        let settings = Settings::parse("[PATHS]   # engine paths\nmain = src\n").unwrap();
        assert_eq!(settings.get("PATHS", "main"), Some("src"));
        assert!(Settings::parse("[PATHS  # unterminated\n").is_err());
    }

    #[test]
    fn test_get_value_fallback() {
        let file = write_temp(SAMPLE);
        let store = ConfigStore::open(file.path()).unwrap();

        assert_eq!(
            store.get_value("CALIBRATION", "type", None).as_deref(),
            Some("multi_site")
        );
        assert_eq!(
            store.get_value("CALIBRATION", "missing", Some("fallback")).as_deref(),
            Some("fallback")
        );
        assert_eq!(store.get_value("NOPE", "missing", None), None);
    }

    #[test]
    fn test_create_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.txt");

        let store = ConfigStore::create_template(&path).unwrap();
        assert_eq!(store.matlab_paths(), SearchPaths::defaults());

        let reopened = ConfigStore::open(&path).unwrap();
        assert_eq!(reopened.date_range(), DateRange::default());
        assert_eq!(reopened.calibration_settings().unwrap().partition_count, 1);
        assert_eq!(reopened.simulation_settings().physiographic_path, None);

        assert!(ConfigStore::create_template(&path).is_err());
    }
}
