//! Native backend: the compiler binary run directly on a source file.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{Backend, BackendKind, ExecutionResult, Stage};
use crate::process::{ProcessError, program_name, run_captured};
use crate::{CancelToken, HarnessError, Result};

/// Runs `<binary> <source>` and reports the process exit code.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl NativeBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Backend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn execute(&self, source: &Path, cancel: &CancelToken) -> Result<ExecutionResult> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(source);

        let start = Instant::now();
        let output = run_captured(&mut cmd, cancel, self.timeout).map_err(|e| match e {
            ProcessError::Launch(err) => HarnessError::AdapterLaunch {
                backend: BackendKind::Native,
                program: program_name(&cmd),
                source: err,
            },
            ProcessError::Cancelled => HarnessError::RunAborted,
            other => execution_error(source, other.to_string()),
        })?;
        crate::metrics::record_backend(BackendKind::Native, start.elapsed());

        debug!(stdout = %output.stdout, stderr = %output.stderr, "native output");

        // A program killed by a signal has no exit code to compare
        let code = output
            .code
            .ok_or_else(|| execution_error(source, "terminated by signal".to_string()))?;
        Ok(ExecutionResult(i64::from(code)))
    }
}

fn execution_error(source: &Path, message: String) -> HarnessError {
    HarnessError::AdapterExecution {
        backend: BackendKind::Native,
        stage: Stage::Execute,
        path: source.to_path_buf(),
        message,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;

    use super::*;

    /// Write a "source file" that `sh` runs in place of a compiled program.
    fn source(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("prog.c");
        fs::write(&path, format!("{body}\n")).unwrap();
        path
    }

    #[test]
    fn test_exit_code_is_result() {
        let temp = tempfile::tempdir().unwrap();
        let backend = NativeBackend::new("sh");
        let result = backend
            .execute(&source(temp.path(), "exit 2"), &CancelToken::new())
            .unwrap();
        assert_eq!(result, ExecutionResult(2));
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let backend = NativeBackend::new("sh");
        let result = backend
            .execute(&source(temp.path(), "echo noise >&2; exit 255"), &CancelToken::new())
            .unwrap();
        assert_eq!(result, ExecutionResult(255));
    }

    #[test]
    fn test_missing_binary_is_launch_failure() {
        let backend = NativeBackend::new("/nonexistent/ca-compiler");
        let err = backend
            .execute(Path::new("a.c"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::AdapterLaunch {
                backend: BackendKind::Native,
                ..
            }
        ));
    }

    #[test]
    fn test_timeout_is_execution_failure() {
        let temp = tempfile::tempdir().unwrap();
        let backend = NativeBackend::new("sh").with_timeout(Some(Duration::from_millis(50)));
        let err = backend
            .execute(&source(temp.path(), "sleep 5"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::AdapterExecution {
                backend: BackendKind::Native,
                stage: Stage::Execute,
                ..
            }
        ));
    }

    #[test]
    fn test_interrupt_aborts() {
        let temp = tempfile::tempdir().unwrap();
        let backend = NativeBackend::new("sh");
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = backend
            .execute(&source(temp.path(), "sleep 5"), &cancel)
            .unwrap_err();
        assert!(matches!(err, HarnessError::RunAborted));
    }
}
