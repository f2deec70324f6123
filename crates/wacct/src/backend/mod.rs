//! Execution backends.
//!
//! Both backends take a source file and report a single termination code:
//! - `native`: the compiler binary compiles and runs the program on the host.
//! - `simulated`: a compile-and-execute service targets the potato CPU.

pub mod native;
pub mod simulated;

use std::fmt;
use std::path::Path;

use crate::{CancelToken, Result};

/// Termination code of a program run on one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionResult(pub i64);

impl ExecutionResult {
    /// Reduce to the low 8 bits, as a process exit status would.
    #[must_use]
    pub const fn truncated(self) -> Self {
        Self(self.0 & 0xff)
    }

    /// Whether two backends agree, optionally comparing modulo 256.
    #[must_use]
    pub const fn agrees_with(self, other: Self, truncate: bool) -> bool {
        if truncate {
            self.truncated().0 == other.truncated().0
        } else {
            self.0 == other.0
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which backend produced a result or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Native,
    Simulated,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Simulated => "simulated",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of a backend invocation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Compile,
    Execute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compile => "compile",
            Self::Execute => "execute",
        })
    }
}

/// A backend that can compile and run one source file.
pub trait Backend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Compile and run `source`, returning its termination code.
    ///
    /// A non-zero termination code is a result, not an error.
    ///
    /// # Errors
    ///
    /// Returns an adapter error if the backend could not run the program,
    /// or [`crate::HarnessError::RunAborted`] if `cancel` tripped.
    fn execute(&self, source: &Path, cancel: &CancelToken) -> Result<ExecutionResult>;
}
