//! Simulated backend: compile for the potato CPU, then run on its simulator.
//!
//! The compile-and-execute service is opaque to the harness. It is reached
//! through [`SimulatorService`], so the real command-driven service and
//! in-memory fakes are interchangeable.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use super::{Backend, BackendKind, ExecutionResult, Stage};
use crate::config::CommandLine;
use crate::error::describe_code;
use crate::process::{ProcessError, ProcessOutput, run_captured};
use crate::{CancelToken, HarnessError};

/// Failure reported by the compile-and-execute service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("interrupted")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

impl From<ProcessError> for ServiceError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::Cancelled => Self::Cancelled,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// The external compile-and-execute capability.
pub trait SimulatorService: Send + Sync {
    /// Compiled program ready to run on the simulator.
    type Image;

    /// Compile a source file for the simulated target.
    ///
    /// # Errors
    ///
    /// Returns the service's diagnostic if compilation fails.
    fn compile(&self, source: &Path, cancel: &CancelToken) -> Result<Self::Image, ServiceError>;

    /// Run a compiled image and return its termination code.
    ///
    /// # Errors
    ///
    /// Returns the service's diagnostic if execution fails.
    fn execute(&self, image: &Self::Image, cancel: &CancelToken) -> Result<i64, ServiceError>;
}

/// Adapter that drives a [`SimulatorService`] through both stages.
#[derive(Debug, Clone)]
pub struct SimulatedBackend<S> {
    service: S,
}

impl<S: SimulatorService> SimulatedBackend<S> {
    pub const fn new(service: S) -> Self {
        Self { service }
    }

    pub const fn service(&self) -> &S {
        &self.service
    }
}

impl<S: SimulatorService> Backend for SimulatedBackend<S> {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn execute(&self, source: &Path, cancel: &CancelToken) -> crate::Result<ExecutionResult> {
        let start = Instant::now();
        let image = self
            .service
            .compile(source, cancel)
            .map_err(|e| stage_error(source, Stage::Compile, e))?;
        let code = self
            .service
            .execute(&image, cancel)
            .map_err(|e| stage_error(source, Stage::Execute, e))?;
        crate::metrics::record_backend(BackendKind::Simulated, start.elapsed());
        Ok(ExecutionResult(code))
    }
}

fn stage_error(source: &Path, stage: Stage, err: ServiceError) -> HarnessError {
    match err {
        ServiceError::Cancelled => HarnessError::RunAborted,
        ServiceError::Failed(message) => HarnessError::AdapterExecution {
            backend: BackendKind::Simulated,
            stage,
            path: source.to_path_buf(),
            message,
        },
    }
}

/// How the simulator reports the program's termination code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultChannel {
    /// The simulator process exits with the program's code.
    #[default]
    ExitCode,
    /// The simulator prints the code as the last line of stdout and exits 0.
    Stdout,
}

/// Image produced by [`CommandSimulator::compile`]; removed on drop.
#[derive(Debug)]
pub struct ImageFile {
    path: PathBuf,
    _dir: TempDir,
}

impl ImageFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Compile-and-execute service reached through two external commands.
///
/// - compile: `<compile...> <source> -o <image>`
/// - execute: `<execute...> <image>`
#[derive(Debug, Clone)]
pub struct CommandSimulator {
    compile: CommandLine,
    execute: CommandLine,
    channel: ResultChannel,
    timeout: Option<Duration>,
}

impl CommandSimulator {
    #[must_use]
    pub fn new(compile: CommandLine, execute: CommandLine) -> Self {
        Self {
            compile,
            execute,
            channel: ResultChannel::default(),
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_result_channel(mut self, channel: ResultChannel) -> Self {
        self.channel = channel;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SimulatorService for CommandSimulator {
    type Image = ImageFile;

    fn compile(&self, source: &Path, cancel: &CancelToken) -> Result<ImageFile, ServiceError> {
        let dir = tempfile::tempdir()
            .map_err(|e| ServiceError::Failed(format!("temp dir failed: {e}")))?;
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("program");
        let path = dir.path().join(format!("{stem}.potato"));

        let mut cmd = self.compile.command();
        cmd.arg(source).arg("-o").arg(&path);
        let output = run_captured(&mut cmd, cancel, self.timeout)?;
        debug!(stdout = %output.stdout, stderr = %output.stderr, "simulator compile output");

        if !output.success() {
            return Err(failure("compiler", &output));
        }
        if !path.is_file() {
            return Err(ServiceError::Failed(format!(
                "compiler produced no image at {}",
                path.display()
            )));
        }
        Ok(ImageFile { path, _dir: dir })
    }

    fn execute(&self, image: &ImageFile, cancel: &CancelToken) -> Result<i64, ServiceError> {
        let mut cmd = self.execute.command();
        cmd.arg(image.path());
        let output = run_captured(&mut cmd, cancel, self.timeout)?;
        debug!(stdout = %output.stdout, stderr = %output.stderr, "simulator output");

        match self.channel {
            ResultChannel::ExitCode => output
                .code
                .map(i64::from)
                .ok_or_else(|| failure("simulator", &output)),
            ResultChannel::Stdout => {
                if !output.success() {
                    return Err(failure("simulator", &output));
                }
                parse_last_line(&output.stdout)
            }
        }
    }
}

fn failure(what: &str, output: &ProcessOutput) -> ServiceError {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        ServiceError::Failed(format!("{what} failed ({})", describe_code(output.code)))
    } else {
        ServiceError::Failed(format!(
            "{what} failed ({}): {stderr}",
            describe_code(output.code)
        ))
    }
}

fn parse_last_line(stdout: &str) -> Result<i64, ServiceError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| ServiceError::Failed("simulator printed no result".to_string()))?;
    line.parse()
        .map_err(|_| ServiceError::Failed(format!("unparseable simulator result '{line}'")))
}
