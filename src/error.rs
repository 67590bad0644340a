//! Failure of an external step.
//!
//! Every external invocation that exits non-zero aborts the run, and the
//! process exits with the failing step's status (not a generic 1). The
//! typed error keeps the child's `ExitStatus` so `main` can recover it
//! from the `anyhow` chain.

use std::process::ExitStatus;
use thiserror::Error;

/// An external tool invocation exited non-zero.
///
/// `detail` holds the tool's captured output, pre-formatted with a
/// leading newline (or empty when the tool printed nothing useful).
#[derive(Debug, Error)]
#[error("command `{name}` failed with {status}{detail}")]
pub struct StepFailed {
    /// Program name, for diagnostics only.
    pub name: String,
    /// Exit status of the failing child process.
    pub status: ExitStatus,
    /// Captured output worth relaying to the user.
    pub detail: String,
}

impl StepFailed {
    /// Exit code to propagate. Termination by signal has no code and
    /// maps to 1.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(1)
    }
}

/// Map an error chain to the process exit code: the failing step's
/// status when the failure was an external step, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<StepFailed>().map_or(1, StepFailed::code)
}
