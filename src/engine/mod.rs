//! Engine boundary — the narrow interface to the external numerical engine.
//!
//! Everything hydrocal knows about the engine goes through two traits:
//!
//! - [`Engine`] starts sessions.
//! - [`EngineSession`] registers search paths, calls routines by name with
//!   positional arguments and a declared output count, and quits.
//!
//! The real implementation drives a MATLAB process ([`matlab::MatlabEngine`]);
//! [`recording::RecordingEngine`] records calls and answers with canned values
//! for tests and dry runs.

pub mod matlab;
pub mod recording;
pub mod value;

use std::path::Path;

use crate::error::Result;
pub use value::{EngineArg, EngineValue};

/// Starts engine sessions.
pub trait Engine {
    type Session: EngineSession;

    /// Launch a fresh engine and return a handle to it.
    fn start(&self) -> Result<Self::Session>;
}

/// A started engine.
///
/// Implementations must release the underlying engine on drop if
/// [`quit`](EngineSession::quit) was never called.
pub trait EngineSession {
    /// Add a directory to the engine's routine search path.
    fn add_path(&mut self, path: &Path) -> Result<()>;

    /// Call `routine` with positional `args`, expecting exactly `nargout` outputs.
    fn call(&mut self, routine: &str, args: &[EngineArg], nargout: usize)
    -> Result<Vec<EngineValue>>;

    /// Shut the engine down. Calling it twice is a no-op.
    fn quit(&mut self) -> Result<()>;
}
