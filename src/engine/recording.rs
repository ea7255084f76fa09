//! Recording engine — a stand-in that never launches anything.
//!
//! Every session operation is appended to a shared [`Journal`]; routine calls
//! are answered from canned responses. `datenum` is answered natively so date
//! handling behaves like the real engine. Used by tests and by `--dry-run`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::info;

use super::value::{EngineArg, EngineValue};
use super::{Engine, EngineSession};
use crate::dates;
use crate::error::{HydroCalError, Result};

/// One thing that happened to a recording session
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started,
    PathAdded(PathBuf),
    Called {
        routine: String,
        args: Vec<EngineArg>,
        nargout: usize,
    },
    Quit,
}

#[derive(Debug, Clone)]
enum Response {
    Values(Vec<EngineValue>),
    Failure(String),
}

/// Shared log of events plus the canned behavior
#[derive(Debug, Default)]
pub struct Journal {
    events: Vec<EngineEvent>,
    responses: HashMap<String, Response>,
    start_failure: Option<String>,
    live_sessions: usize,
}

impl Journal {
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Routine calls in order, excluding path registration.
    pub fn calls(&self) -> Vec<(&str, &[EngineArg], usize)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Called {
                    routine,
                    args,
                    nargout,
                } => Some((routine.as_str(), args.as_slice(), *nargout)),
                _ => None,
            })
            .collect()
    }

    pub fn paths_added(&self) -> Vec<&Path> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::PathAdded(p) => Some(p.as_path()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &EngineEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    /// Sessions started and not yet quit (or dropped).
    pub fn live_sessions(&self) -> usize {
        self.live_sessions
    }
}

/// Engine double that records instead of executing.
///
/// Clones share the same journal, so a test can keep one handle and give the
/// other to the runner.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    journal: Rc<RefCell<Journal>>,
    log_calls: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dry-run flavor: also logs each call at info level.
    pub fn dry_run() -> Self {
        Self {
            log_calls: true,
            ..Self::default()
        }
    }

    /// Answer `routine` with `values` (one per expected output).
    pub fn respond(&self, routine: &str, values: Vec<EngineValue>) -> &Self {
        self.journal
            .borrow_mut()
            .responses
            .insert(routine.to_string(), Response::Values(values));
        self
    }

    /// Make calls to `routine` fail with `message`.
    pub fn fail(&self, routine: &str, message: &str) -> &Self {
        self.journal
            .borrow_mut()
            .responses
            .insert(routine.to_string(), Response::Failure(message.to_string()));
        self
    }

    /// Make every `start` fail with `message`.
    pub fn fail_start(&self, message: &str) -> &Self {
        self.journal.borrow_mut().start_failure = Some(message.to_string());
        self
    }

    pub fn journal(&self) -> std::cell::Ref<'_, Journal> {
        self.journal.borrow()
    }
}

impl Engine for RecordingEngine {
    type Session = RecordingSession;

    fn start(&self) -> Result<RecordingSession> {
        let mut journal = self.journal.borrow_mut();
        if let Some(message) = &journal.start_failure {
            return Err(HydroCalError::engine(message.clone()));
        }
        journal.events.push(EngineEvent::Started);
        journal.live_sessions += 1;
        if self.log_calls {
            info!("[DRY RUN] engine session started");
        }
        Ok(RecordingSession {
            journal: Rc::clone(&self.journal),
            log_calls: self.log_calls,
            closed: false,
        })
    }
}

/// Session handed out by [`RecordingEngine`]
#[derive(Debug)]
pub struct RecordingSession {
    journal: Rc<RefCell<Journal>>,
    log_calls: bool,
    closed: bool,
}

impl RecordingSession {
    fn default_response(
        routine: &str,
        args: &[EngineArg],
        nargout: usize,
    ) -> Result<Vec<EngineValue>> {
        if routine == "datenum" {
            let Some(EngineArg::Text(date)) = args.first() else {
                return Err(HydroCalError::engine("datenum expects a date string"));
            };
            let code = dates::datenum_str(date)
                .map_err(|e| HydroCalError::engine(e.to_string()))?;
            return Ok(vec![EngineValue::from(code)]);
        }
        Ok(vec![EngineValue::Null; nargout])
    }
}

impl EngineSession for RecordingSession {
    fn add_path(&mut self, path: &Path) -> Result<()> {
        if self.log_calls {
            info!("[DRY RUN] addpath {}", path.display());
        }
        self.journal
            .borrow_mut()
            .events
            .push(EngineEvent::PathAdded(path.to_path_buf()));
        Ok(())
    }

    fn call(
        &mut self,
        routine: &str,
        args: &[EngineArg],
        nargout: usize,
    ) -> Result<Vec<EngineValue>> {
        if self.closed {
            return Err(HydroCalError::engine("engine session is closed"));
        }
        if self.log_calls {
            let rendered: Vec<String> = args
                .iter()
                .map(|a| a.to_matlab().unwrap_or_else(|e| format!("<{}>", e)))
                .collect();
            info!("[DRY RUN] {}({}) nargout={}", routine, rendered.join(", "), nargout);
        }

        let mut journal = self.journal.borrow_mut();
        journal.events.push(EngineEvent::Called {
            routine: routine.to_string(),
            args: args.to_vec(),
            nargout,
        });
        let response = journal.responses.get(routine).cloned();
        drop(journal);

        let values = match response {
            Some(Response::Values(values)) => values,
            Some(Response::Failure(message)) => return Err(HydroCalError::engine(message)),
            None => Self::default_response(routine, args, nargout)?,
        };
        if values.len() != nargout {
            return Err(HydroCalError::protocol(format!(
                "expected {} output(s), got {}",
                nargout,
                values.len()
            )));
        }
        Ok(values)
    }

    fn quit(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut journal = self.journal.borrow_mut();
        journal.events.push(EngineEvent::Quit);
        journal.live_sessions -= 1;
        if self.log_calls {
            info!("[DRY RUN] engine session stopped");
        }
        Ok(())
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Ok(mut journal) = self.journal.try_borrow_mut() {
                journal.live_sessions -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::as_scalar;
    use serde_json::json;

    #[test]
    fn test_records_session_lifecycle() {
        let engine = RecordingEngine::new();
        let mut session = engine.start().unwrap();
        session.add_path(Path::new("src")).unwrap();
        session.call("main_simulation", &[EngineArg::text("x")], 1).unwrap();
        assert_eq!(engine.journal().live_sessions(), 1);
        session.quit().unwrap();
        session.quit().unwrap();

        let journal = engine.journal();
        assert_eq!(journal.events().first(), Some(&EngineEvent::Started));
        assert_eq!(journal.paths_added(), vec![Path::new("src")]);
        assert_eq!(journal.calls().len(), 1);
        assert_eq!(journal.count(&EngineEvent::Quit), 1);
        assert_eq!(journal.live_sessions(), 0);
    }

    #[test]
    fn test_canned_responses_and_failures() {
        let engine = RecordingEngine::new();
        engine
            .respond("main_sensitivity", vec![json!({"X1": 0.4})])
            .fail("main_calibration_flow", "CMAES diverged");

        let mut session = engine.start().unwrap();
        assert_eq!(
            session.call("main_sensitivity", &[], 1).unwrap(),
            vec![json!({"X1": 0.4})]
        );
        let err = session.call("main_calibration_flow", &[], 0).unwrap_err();
        assert_eq!(err.to_string(), "Engine error: CMAES diverged");
        // Canned value count must match nargout.
        assert!(session.call("main_sensitivity", &[], 0).is_err());
    }

    #[test]
    fn test_datenum_is_answered_natively() {
        let engine = RecordingEngine::new();
        let mut session = engine.start().unwrap();
        let out = session
            .call("datenum", &[EngineArg::text("2023-01-01")], 1)
            .unwrap();
        assert_eq!(as_scalar(&out[0]), Some(738887.0));
        assert!(session.call("datenum", &[EngineArg::text("soon")], 1).is_err());
    }

    #[test]
    fn test_start_failure() {
        let engine = RecordingEngine::new();
        engine.fail_start("no license available");
        assert!(engine.start().is_err());
        assert!(engine.journal().events().is_empty());
    }

    #[test]
    fn test_drop_releases_live_session() {
        let engine = RecordingEngine::new();
        {
            let _session = engine.start().unwrap();
            assert_eq!(engine.journal().live_sessions(), 1);
        }
        assert_eq!(engine.journal().live_sessions(), 0);
        assert_eq!(engine.journal().count(&EngineEvent::Quit), 0);
    }
}
