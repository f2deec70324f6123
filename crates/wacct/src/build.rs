//! Building the compiler under test.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::{CommandLine, HarnessConfig};
use crate::process::{ProcessError, ProcessOutput, run_captured};
use crate::{CancelToken, HarnessError, Result};

/// Something that can build the compiler binary.
pub trait BuildSystem {
    /// Short description for logs (e.g. the command line).
    fn describe(&self) -> String;

    /// Run one build to completion and return its captured output.
    ///
    /// A failing build is reported through [`ProcessOutput::code`]; `Err` is
    /// reserved for builds that could not be run at all.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::BuildLaunch`] if the build could not start.
    fn build(&self, cancel: &CancelToken) -> Result<ProcessOutput>;
}

/// Build system driven by an external command (default `cargo build --release`).
#[derive(Debug, Clone)]
pub struct CommandBuildSystem {
    command: CommandLine,
    dir: PathBuf,
}

impl CommandBuildSystem {
    pub fn new(command: CommandLine, dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            dir: dir.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.build_command.clone(), &config.compiler_dir)
    }
}

impl BuildSystem for CommandBuildSystem {
    fn describe(&self) -> String {
        self.command.to_string()
    }

    fn build(&self, cancel: &CancelToken) -> Result<ProcessOutput> {
        let mut cmd = self.command.command();
        cmd.current_dir(&self.dir);
        run_captured(&mut cmd, cancel, None).map_err(|e| match e {
            ProcessError::Launch(source) | ProcessError::Wait(source) => {
                HarnessError::BuildLaunch {
                    program: self.command.program.clone(),
                    source,
                }
            }
            ProcessError::Cancelled | ProcessError::TimedOut(_) => HarnessError::RunAborted,
        })
    }
}

/// What [`Builder::ensure_built`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// A build ran and succeeded.
    Built,
    /// The compiler was already built in this run.
    AlreadyBuilt,
}

/// Owns the "compiler has been built" state for one run.
pub struct Builder<B> {
    system: B,
    built: bool,
}

impl<B: BuildSystem> Builder<B> {
    pub const fn new(system: B) -> Self {
        Self {
            system,
            built: false,
        }
    }

    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.built
    }

    pub const fn system(&self) -> &B {
        &self.system
    }

    /// Treat the compiler as already built (e.g. the operator skipped the build).
    pub fn assume_built(&mut self) {
        info!("skipping compiler build");
        self.built = true;
    }

    /// Build the compiler unless it was already built in this run.
    ///
    /// `force_rebuild` always runs the build.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::BuildFailure`] with the captured output if the
    /// build exits unsuccessfully.
    pub fn ensure_built(&mut self, force_rebuild: bool, cancel: &CancelToken) -> Result<BuildOutcome> {
        if self.built && !force_rebuild {
            return Ok(BuildOutcome::AlreadyBuilt);
        }
        self.built = false;

        info!(command = %self.system.describe(), force_rebuild, "building compiler");
        let start = Instant::now();
        let output = self.system.build(cancel)?;
        let elapsed = start.elapsed();

        debug!(stdout = %output.stdout, "build stdout");
        debug!(stderr = %output.stderr, "build stderr");

        if !output.success() {
            return Err(HarnessError::BuildFailure {
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        crate::metrics::record_build(elapsed);
        info!(elapsed_ms = elapsed.as_millis(), "compiler built");
        self.built = true;
        Ok(BuildOutcome::Built)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FakeBuild {
        calls: Cell<usize>,
        code: i32,
    }

    impl FakeBuild {
        fn exiting(code: i32) -> Self {
            Self {
                calls: Cell::new(0),
                code,
            }
        }
    }

    impl BuildSystem for FakeBuild {
        fn describe(&self) -> String {
            "fake build".to_string()
        }

        fn build(&self, _cancel: &CancelToken) -> Result<ProcessOutput> {
            self.calls.set(self.calls.get() + 1);
            Ok(ProcessOutput {
                code: Some(self.code),
                stdout: "Compiling ca-compiler".to_string(),
                stderr: if self.code == 0 {
                    String::new()
                } else {
                    "error[E0425]: cannot find value".to_string()
                },
            })
        }
    }

    #[test]
    fn test_builds_once() {
        let mut builder = Builder::new(FakeBuild::exiting(0));
        let cancel = CancelToken::new();
        assert!(!builder.is_built());

        assert_eq!(builder.ensure_built(false, &cancel).unwrap(), BuildOutcome::Built);
        assert_eq!(
            builder.ensure_built(false, &cancel).unwrap(),
            BuildOutcome::AlreadyBuilt
        );
        assert_eq!(builder.system().calls.get(), 1);
        assert!(builder.is_built());
    }

    #[test]
    fn test_force_rebuild_always_builds() {
        let mut builder = Builder::new(FakeBuild::exiting(0));
        let cancel = CancelToken::new();
        builder.ensure_built(false, &cancel).unwrap();
        builder.ensure_built(true, &cancel).unwrap();
        builder.ensure_built(true, &cancel).unwrap();
        assert_eq!(builder.system().calls.get(), 3);
    }

    #[test]
    fn test_failure_keeps_streams() {
        let mut builder = Builder::new(FakeBuild::exiting(101));
        let err = builder.ensure_built(false, &CancelToken::new()).unwrap_err();
        match err {
            HarnessError::BuildFailure {
                code,
                stdout,
                stderr,
            } => {
                assert_eq!(code, Some(101));
                assert!(stdout.contains("Compiling"));
                assert!(stderr.contains("E0425"));
            }
            other => panic!("expected build failure, got {other:?}"),
        }
        assert!(!builder.is_built());

        // A failed build is retried on the next request
        builder.ensure_built(false, &CancelToken::new()).unwrap_err();
        assert_eq!(builder.system().calls.get(), 2);
    }

    #[test]
    fn test_assume_built_skips_build() {
        let mut builder = Builder::new(FakeBuild::exiting(1));
        builder.assume_built();
        assert_eq!(
            builder.ensure_built(false, &CancelToken::new()).unwrap(),
            BuildOutcome::AlreadyBuilt
        );
        assert_eq!(builder.system().calls.get(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_build_system() {
        let temp = tempfile::tempdir().unwrap();
        let system = CommandBuildSystem::new(
            CommandLine::new("sh").with_arg("-c").with_arg("pwd; exit 0"),
            temp.path(),
        );
        let output = system.build(&CancelToken::new()).unwrap();
        assert!(output.success());
        let dir_name = temp.path().file_name().unwrap().to_str().unwrap();
        assert!(output.stdout.contains(dir_name));

        let missing = CommandBuildSystem::new(CommandLine::new("/nonexistent/cargo"), temp.path());
        assert!(matches!(
            missing.build(&CancelToken::new()),
            Err(HarnessError::BuildLaunch { .. })
        ));
    }
}
