//! Process-backed MATLAB engine
//!
//! A session is one MATLAB process started without a desktop, fed statements
//! on stdin. Each call is sent as a single line wrapped in `try/catch`; the
//! engine answers with one framed line on stdout:
//!
//! ```text
//! @@HYDROCAL_OK@@[<jsonencode of the outputs cell>]
//! @@HYDROCAL_ERR@@"<jsonencode of the error message>"
//! ```
//!
//! Anything else the engine prints (banner, routine progress output) is
//! forwarded to the log.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

use super::value::{EngineArg, EngineValue};
use super::{Engine, EngineSession};
use crate::error::{HydroCalError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};

/// Prefix of a successful answer frame.
pub const OK_TAG: &str = "@@HYDROCAL_OK@@";
/// Prefix of a failed answer frame.
pub const ERR_TAG: &str = "@@HYDROCAL_ERR@@";

const OUTPUTS_VAR: &str = "hydrocal_out__";
const ERROR_VAR: &str = "hydrocal_err__";

/// Launches MATLAB processes
#[derive(Debug, Clone)]
pub struct MatlabEngine {
    executable: PathBuf,
    args: Vec<String>,
}

impl MatlabEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: ["-nodisplay", "-nosplash", "-nodesktop"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Replace the startup arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Default for MatlabEngine {
    fn default() -> Self {
        Self::new("matlab")
    }
}

impl Engine for MatlabEngine {
    type Session = MatlabSession;

    fn start(&self) -> Result<MatlabSession> {
        info!(
            "Starting engine: {} {}",
            self.executable.display(),
            self.args.join(" ")
        );

        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .in_new_process_group()
            .spawn()
            .map_err(|e| {
                HydroCalError::engine(format!(
                    "failed to start {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;
        let pid = child.id();
        ChildRegistry::track(pid);

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            ChildRegistry::untrack(pid);
            return Err(HydroCalError::engine("engine pipes were not captured"));
        };

        let mut session = MatlabSession {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            pid,
            closed: false,
        };
        // The first frame only arrives once startup has finished.
        session.execute(&format!("fprintf(1, '%s[]\\n', '{}');", OK_TAG), 0)?;
        info!("Engine ready (PID {})", pid);
        Ok(session)
    }
}

/// A running MATLAB process
#[derive(Debug)]
pub struct MatlabSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    pid: u32,
    closed: bool,
}

impl MatlabSession {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Send one statement and wait for its answer frame.
    fn execute(&mut self, statement: &str, nargout: usize) -> Result<Vec<EngineValue>> {
        if self.closed {
            return Err(HydroCalError::engine("engine session is closed"));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| HydroCalError::engine("engine input is closed"))?;

        debug!("engine <- {}", statement);
        writeln!(stdin, "{}", statement)
            .and_then(|()| stdin.flush())
            .map_err(|e| HydroCalError::engine(format!("failed to write to engine: {}", e)))?;

        // Routine output is not guaranteed to be UTF-8 (Latin-1 station names).
        let mut raw = Vec::new();
        loop {
            raw.clear();
            let read = self.stdout.read_until(b'\n', &mut raw)?;
            if read == 0 {
                return Err(HydroCalError::engine(
                    "engine exited before answering the call",
                ));
            }
            let line = String::from_utf8_lossy(&raw);
            match parse_frame(&line) {
                Some(Frame::Ok(payload)) => {
                    debug!("engine -> {}", payload);
                    return decode_outputs(payload, nargout);
                }
                Some(Frame::Err(payload)) => {
                    let message = serde_json::from_str::<String>(payload)
                        .unwrap_or_else(|_| payload.to_string());
                    return Err(HydroCalError::engine(message));
                }
                None => {
                    let text = line.trim_end();
                    if !text.is_empty() {
                        info!(target: "hydrocal::engine_output", "{}", text);
                    }
                }
            }
        }
    }
}

impl EngineSession for MatlabSession {
    fn add_path(&mut self, path: &Path) -> Result<()> {
        debug!("Adding engine path {}", path.display());
        self.call("addpath", &[EngineArg::text(path.display().to_string())], 0)
            .map(|_| ())
    }

    fn call(
        &mut self,
        routine: &str,
        args: &[EngineArg],
        nargout: usize,
    ) -> Result<Vec<EngineValue>> {
        let statement = call_statement(routine, args, nargout)?;
        self.execute(&statement, nargout)
    }

    fn quit(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut stdin) = self.stdin.take() {
            // The engine may already be gone; waiting below still reaps it.
            let _ = writeln!(stdin, "exit").and_then(|()| stdin.flush());
        }
        let status = self.child.wait();
        ChildRegistry::untrack(self.pid);

        let status =
            status.map_err(|e| HydroCalError::engine(format!("failed to stop engine: {}", e)))?;
        if status.success() {
            info!("Engine (PID {}) stopped", self.pid);
        } else {
            warn!("Engine (PID {}) exited with {}", self.pid, status);
        }
        Ok(())
    }
}

impl Drop for MatlabSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Engine session (PID {}) dropped without quit, killing it", self.pid);
            let _ = self.child.kill();
            let _ = self.child.wait();
            ChildRegistry::untrack(self.pid);
        }
    }
}

enum Frame<'a> {
    Ok(&'a str),
    Err(&'a str),
}

/// Frames may be preceded by a `>>` prompt, so look for the tag anywhere.
fn parse_frame(line: &str) -> Option<Frame<'_>> {
    if let Some(idx) = line.find(OK_TAG) {
        return Some(Frame::Ok(line[idx + OK_TAG.len()..].trim()));
    }
    line.find(ERR_TAG)
        .map(|idx| Frame::Err(line[idx + ERR_TAG.len()..].trim()))
}

fn decode_outputs(payload: &str, nargout: usize) -> Result<Vec<EngineValue>> {
    let value: EngineValue = serde_json::from_str(payload)
        .map_err(|e| HydroCalError::protocol(format!("undecodable answer '{}': {}", payload, e)))?;
    let outputs = match value {
        EngineValue::Array(items) => items,
        // A single output is sometimes encoded without the enclosing array.
        other if nargout == 1 => vec![other],
        other => {
            return Err(HydroCalError::protocol(format!(
                "expected a list of {} output(s), got {}",
                nargout, other
            )));
        }
    };
    if outputs.len() != nargout {
        return Err(HydroCalError::protocol(format!(
            "expected {} output(s), got {}",
            nargout,
            outputs.len()
        )));
    }
    Ok(outputs)
}

fn validate_routine_name(routine: &str) -> Result<()> {
    let mut chars = routine.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(HydroCalError::validation(format!(
            "'{}' is not a valid routine name",
            routine
        )))
    }
}

/// Build the single-line statement for a routine call.
pub fn call_statement(routine: &str, args: &[EngineArg], nargout: usize) -> Result<String> {
    validate_routine_name(routine)?;
    let rendered = args
        .iter()
        .map(EngineArg::to_matlab)
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let (invoke, report) = if nargout == 0 {
        (
            format!("{}({});", routine, rendered),
            format!("fprintf(1, '%s[]\\n', '{}');", OK_TAG),
        )
    } else {
        (
            format!(
                "{out} = cell(1, {n}); [{out}{{:}}] = {routine}({rendered});",
                out = OUTPUTS_VAR,
                n = nargout,
                routine = routine,
                rendered = rendered
            ),
            format!(
                "fprintf(1, '%s%s\\n', '{}', jsonencode({}));",
                OK_TAG, OUTPUTS_VAR
            ),
        )
    };

    Ok(format!(
        "try, {invoke} {report} catch {err}, fprintf(1, '%s%s\\n', '{tag}', jsonencode({err}.message)); end",
        invoke = invoke,
        report = report,
        err = ERROR_VAR,
        tag = ERR_TAG
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_statement_without_outputs() {
        let statement = call_statement("addpath", &[EngineArg::text("src")], 0).unwrap();
        assert_eq!(
            statement,
            "try, addpath('src'); fprintf(1, '%s[]\\n', '@@HYDROCAL_OK@@'); \
             catch hydrocal_err__, fprintf(1, '%s%s\\n', '@@HYDROCAL_ERR@@', \
             jsonencode(hydrocal_err__.message)); end"
        );
    }

    #[test]
    fn test_statement_with_one_output() {
        let statement = call_statement("datenum", &[EngineArg::text("1979-1-1")], 1).unwrap();
        assert!(statement.starts_with(
            "try, hydrocal_out__ = cell(1, 1); [hydrocal_out__{:}] = datenum('1979-1-1');"
        ));
        assert!(statement.contains("jsonencode(hydrocal_out__)"));
        assert!(!statement.contains('\n'));
    }

    #[test]
    fn test_statement_rejects_bad_routine_names() {
        assert!(call_statement("system('rm -rf /')", &[], 0).is_err());
        assert!(call_statement("", &[], 0).is_err());
        assert!(call_statement("pkg.routine_2", &[], 0).is_ok());
    }

    #[test]
    fn test_parse_frame() {
        assert!(matches!(
            parse_frame(">> @@HYDROCAL_OK@@[1]\n"),
            Some(Frame::Ok("[1]"))
        ));
        assert!(matches!(
            parse_frame("@@HYDROCAL_ERR@@\"boom\""),
            Some(Frame::Err("\"boom\""))
        ));
        assert!(parse_frame("Iteration 3: KGE = 0.71").is_none());
    }

    #[test]
    fn test_decode_outputs() {
        assert_eq!(decode_outputs("[]", 0).unwrap(), Vec::<EngineValue>::new());
        assert_eq!(decode_outputs("[738887]", 1).unwrap(), vec![json!(738887)]);
        assert_eq!(decode_outputs("4", 1).unwrap(), vec![json!(4)]);
        assert!(matches!(
            decode_outputs("[1, 2]", 1),
            Err(HydroCalError::Protocol(_))
        ));
        assert!(matches!(
            decode_outputs("not json", 1),
            Err(HydroCalError::Protocol(_))
        ));
    }
}
