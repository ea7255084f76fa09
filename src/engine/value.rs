//! Values crossing the engine boundary.
//!
//! Arguments are typed ([`EngineArg`]) and rendered as MATLAB expressions.
//! Results come back JSON-encoded, so they are plain [`serde_json::Value`]s;
//! [`as_scalar`] and [`as_matrix`] pull numeric data back out of them.

use std::collections::HashSet;

use crate::error::{HydroCalError, Result};

/// A value returned by the engine.
pub type EngineValue = serde_json::Value;

/// Longest identifier the engine accepts as a struct field name.
const MAX_FIELD_NAME_LEN: usize = 63;

/// A positional argument for an engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineArg {
    /// Character vector
    Text(String),
    /// 64-bit integer scalar
    Int(i64),
    /// Double scalar
    Float(f64),
    /// Logical scalar
    Bool(bool),
    /// Numeric row vector
    Vector(Vec<f64>),
    /// Cell array
    List(Vec<EngineArg>),
    /// Scalar struct with ordered fields
    Struct(Vec<(String, EngineArg)>),
}

impl EngineArg {
    pub fn text(s: impl Into<String>) -> Self {
        EngineArg::Text(s.into())
    }

    /// Cell array of character vectors.
    pub fn text_list<S: AsRef<str>>(items: &[S]) -> Self {
        EngineArg::List(items.iter().map(|s| EngineArg::text(s.as_ref())).collect())
    }

    /// Render as a single-line MATLAB expression.
    pub fn to_matlab(&self) -> Result<String> {
        match self {
            EngineArg::Text(s) => Ok(matlab_string(s)),
            EngineArg::Int(n) => Ok(format!("int64({})", n)),
            EngineArg::Float(x) => Ok(matlab_double(*x)),
            EngineArg::Bool(b) => Ok(String::from(if *b { "true" } else { "false" })),
            EngineArg::Vector(xs) if xs.is_empty() => Ok("zeros(1,0)".to_string()),
            EngineArg::Vector(xs) => {
                let items: Vec<String> = xs.iter().map(|x| matlab_double(*x)).collect();
                Ok(format!("[{}]", items.join(" ")))
            }
            EngineArg::List(items) => {
                let items = items
                    .iter()
                    .map(EngineArg::to_matlab)
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{{{}}}", items.join(", ")))
            }
            EngineArg::Struct(fields) if fields.is_empty() => Ok("struct()".to_string()),
            EngineArg::Struct(fields) => {
                let mut seen = HashSet::new();
                let mut parts = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    validate_field_name(name)?;
                    if !seen.insert(name.as_str()) {
                        return Err(HydroCalError::validation(format!(
                            "duplicate struct field '{}'",
                            name
                        )));
                    }
                    // Wrapping in a cell keeps struct() from building a struct array.
                    parts.push(format!("'{}', {{{}}}", name, value.to_matlab()?));
                }
                Ok(format!("struct({})", parts.join(", ")))
            }
        }
    }
}

impl From<&str> for EngineArg {
    fn from(s: &str) -> Self {
        EngineArg::Text(s.to_string())
    }
}

impl From<String> for EngineArg {
    fn from(s: String) -> Self {
        EngineArg::Text(s)
    }
}

impl From<i64> for EngineArg {
    fn from(n: i64) -> Self {
        EngineArg::Int(n)
    }
}

impl From<f64> for EngineArg {
    fn from(x: f64) -> Self {
        EngineArg::Float(x)
    }
}

impl From<bool> for EngineArg {
    fn from(b: bool) -> Self {
        EngineArg::Bool(b)
    }
}

fn matlab_double(x: f64) -> String {
    if x.is_nan() {
        "NaN".to_string()
    } else if x == f64::INFINITY {
        "Inf".to_string()
    } else if x == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{:?}", x)
    }
}

/// Quote text as a character vector. Control characters cannot appear inside
/// a quoted literal on a single line, so they are spliced in with `char(n)`.
fn matlab_string(s: &str) -> String {
    let mut pieces: Vec<String> = Vec::new();
    let mut literal = String::new();
    for c in s.chars() {
        if c.is_control() {
            if !literal.is_empty() {
                pieces.push(format!("'{}'", literal));
                literal.clear();
            }
            pieces.push(format!("char({})", c as u32));
        } else if c == '\'' {
            literal.push_str("''");
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() || pieces.is_empty() {
        pieces.push(format!("'{}'", literal));
    }

    if pieces.len() == 1 {
        pieces.remove(0)
    } else {
        format!("[{}]", pieces.join(" "))
    }
}

fn validate_field_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= MAX_FIELD_NAME_LEN;
    if valid {
        Ok(())
    } else {
        Err(HydroCalError::validation(format!(
            "'{}' is not a valid struct field name",
            name
        )))
    }
}

/// Numeric scalar from a result value: a number, or a one-element array.
pub fn as_scalar(value: &EngineValue) -> Option<f64> {
    match value {
        EngineValue::Number(n) => n.as_f64(),
        EngineValue::Array(items) if items.len() == 1 => as_scalar(&items[0]),
        _ => None,
    }
}

/// Rectangular numeric matrix from a result value.
///
/// Scalars become 1×1, flat arrays a single row, arrays of arrays one row per
/// inner array. `null` entries (how NaN is encoded) decode as `NaN`.
pub fn as_matrix(value: &EngineValue) -> Option<Vec<Vec<f64>>> {
    fn cell(v: &EngineValue) -> Option<f64> {
        match v {
            EngineValue::Number(n) => n.as_f64(),
            EngineValue::Null => Some(f64::NAN),
            _ => None,
        }
    }

    match value {
        EngineValue::Number(_) => cell(value).map(|x| vec![vec![x]]),
        EngineValue::Array(items) if items.is_empty() => Some(Vec::new()),
        EngineValue::Array(items) if items.iter().all(EngineValue::is_array) => {
            let rows = items
                .iter()
                .map(|row| row.as_array()?.iter().map(cell).collect::<Option<Vec<f64>>>())
                .collect::<Option<Vec<Vec<f64>>>>()?;
            let width = rows[0].len();
            rows.iter().all(|r| r.len() == width).then_some(rows)
        }
        EngineValue::Array(items) => items
            .iter()
            .map(cell)
            .collect::<Option<Vec<f64>>>()
            .map(|row| vec![row]),
        _ => None,
    }
}
