//! Harness configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use wacct_corpus::Corpus;

use crate::backend::native::NativeBackend;
use crate::backend::simulated::{CommandSimulator, ResultChannel, SimulatedBackend};

/// Default corpus checkout, relative to the working directory.
pub const DEFAULT_CORPUS_DIR: &str = "writing-a-c-compiler-tests";

/// Compiler binary produced by the default build, relative to the compiler project.
pub const DEFAULT_BINARY: &str = "target/release/ca-compiler";

/// Default simulator launcher; receives the image path.
pub const DEFAULT_SIM_EXEC: &str = "potato-vm";

/// A program plus its leading arguments, split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build a [`Command`] with the program and leading arguments.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl FromStr for CommandLine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let program = parts.next().ok_or_else(|| "empty command".to_string())?;
        Ok(Self {
            program: program.to_string(),
            args: parts.map(String::from).collect(),
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Where the harness finds its corpus and external tools.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Corpus root (contains `tests/`).
    pub corpus_root: PathBuf,
    /// Compiler project directory; the build runs here.
    pub compiler_dir: PathBuf,
    /// Compiler binary (default: `<compiler_dir>/target/release/ca-compiler`).
    pub binary: Option<PathBuf>,
    /// Build command.
    pub build_command: CommandLine,
    /// Simulator compile command (default: `<binary> --target potato`).
    pub sim_compile: Option<CommandLine>,
    /// Simulator execute command.
    pub sim_execute: CommandLine,
    /// How the simulator reports its termination code.
    pub result_channel: ResultChannel,
    /// Per-invocation timeout for backend processes.
    pub timeout: Option<Duration>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            corpus_root: PathBuf::from(DEFAULT_CORPUS_DIR),
            compiler_dir: PathBuf::from("."),
            binary: None,
            build_command: CommandLine::new("cargo")
                .with_arg("build")
                .with_arg("--release"),
            sim_compile: None,
            sim_execute: CommandLine::new(DEFAULT_SIM_EXEC),
            result_channel: ResultChannel::default(),
            timeout: None,
        }
    }
}

impl HarnessConfig {
    #[must_use]
    pub fn with_corpus_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.corpus_root = root.into();
        self
    }

    #[must_use]
    pub fn with_compiler_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.compiler_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    #[must_use]
    pub fn with_build_command(mut self, command: CommandLine) -> Self {
        self.build_command = command;
        self
    }

    #[must_use]
    pub fn with_sim_compile(mut self, command: CommandLine) -> Self {
        self.sim_compile = Some(command);
        self
    }

    #[must_use]
    pub fn with_sim_execute(mut self, command: CommandLine) -> Self {
        self.sim_execute = command;
        self
    }

    #[must_use]
    pub const fn with_result_channel(mut self, channel: ResultChannel) -> Self {
        self.result_channel = channel;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolved compiler binary path.
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        self.binary
            .clone()
            .unwrap_or_else(|| self.compiler_dir.join(DEFAULT_BINARY))
    }

    /// Resolved simulator compile command.
    #[must_use]
    pub fn sim_compile_command(&self) -> CommandLine {
        self.sim_compile.clone().unwrap_or_else(|| {
            CommandLine::new(path_str(&self.binary_path()))
                .with_arg("--target")
                .with_arg("potato")
        })
    }

    #[must_use]
    pub fn corpus(&self) -> Corpus {
        Corpus::new(&self.corpus_root)
    }

    #[must_use]
    pub fn native_backend(&self) -> NativeBackend {
        NativeBackend::new(self.binary_path()).with_timeout(self.timeout)
    }

    #[must_use]
    pub fn simulated_backend(&self) -> SimulatedBackend<CommandSimulator> {
        let service = CommandSimulator::new(self.sim_compile_command(), self.sim_execute.clone())
            .with_result_channel(self.result_channel)
            .with_timeout(self.timeout);
        SimulatedBackend::new(service)
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
