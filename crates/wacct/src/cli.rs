//! CLI definitions and argument types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use regex::Regex;
use wacct::backend::simulated::ResultChannel;
use wacct::{ChapterId, CommandLine, HarnessConfig, RunOptions, ValidityClass};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "wacct")]
#[command(about = "Differential tester - checks that native and potato CPU backends agree")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(flatten)]
    pub harness: HarnessArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run valid tests on both backends and compare termination codes
    Diff {
        /// Chapters to test (default: 1)
        #[arg(value_name = "CHAPTER", conflicts_with = "all")]
        chapters: Vec<ChapterId>,

        /// Test every chapter present in the corpus
        #[arg(long)]
        all: bool,

        /// Skip building the compiler before testing
        #[arg(long, conflicts_with = "force_rebuild")]
        no_build: bool,

        /// Rebuild the compiler even if already built
        #[arg(long)]
        force_rebuild: bool,

        /// Report every divergence instead of stopping at the first
        #[arg(long)]
        keep_going: bool,

        /// Number of tests to run in parallel (0 = auto)
        #[arg(short = 'j', long, default_value = "1")]
        jobs: usize,

        /// Only run tests whose file name matches this regex
        #[arg(long, value_name = "REGEX")]
        filter: Option<Regex>,

        /// Compare termination codes modulo 256
        #[arg(long)]
        truncate_exit_codes: bool,
    },
    /// List the tests of a chapter
    List {
        /// Chapters to list (default: every chapter in the corpus)
        #[arg(value_name = "CHAPTER")]
        chapters: Vec<ChapterId>,

        /// Validity class to list
        #[arg(long, value_enum, default_value = "valid")]
        class: ClassArg,
    },
    /// Run one source file on both backends and print both results
    Run {
        /// C source file
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Compare termination codes modulo 256
        #[arg(long)]
        truncate_exit_codes: bool,
    },
    /// Build the compiler
    Build,
}

/// Where the corpus and external tools live.
#[derive(Args, Clone, Debug)]
pub struct HarnessArgs {
    /// Corpus root (contains tests/chapter_N)
    #[arg(long, global = true, default_value = wacct::DEFAULT_CORPUS_DIR)]
    pub corpus: PathBuf,

    /// Compiler project directory (the build runs here)
    #[arg(long, global = true, default_value = ".")]
    pub compiler_dir: PathBuf,

    /// Compiler binary (default: <compiler-dir>/target/release/ca-compiler)
    #[arg(long, global = true)]
    pub binary: Option<PathBuf>,

    /// Build command
    #[arg(long, global = true, default_value = "cargo build --release")]
    pub build_cmd: CommandLine,

    /// Potato CPU compile command, invoked as `<cmd> <source> -o <image>`
    /// (default: <binary> --target potato)
    #[arg(long, global = true)]
    pub sim_compile_cmd: Option<CommandLine>,

    /// Potato CPU simulator command, invoked as `<cmd> <image>`
    #[arg(long, global = true, default_value = "potato-vm")]
    pub sim_exec_cmd: CommandLine,

    /// How the simulator reports the program's result
    #[arg(long, global = true, value_enum, default_value = "exit-code")]
    pub sim_result: ResultChannelArg,

    /// Per-process timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl HarnessArgs {
    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::default()
            .with_corpus_root(&self.corpus)
            .with_compiler_dir(&self.compiler_dir)
            .with_build_command(self.build_cmd.clone())
            .with_sim_execute(self.sim_exec_cmd.clone())
            .with_result_channel(self.sim_result.into())
            .with_timeout(self.timeout.map(Duration::from_secs));
        if let Some(binary) = &self.binary {
            config = config.with_binary(binary);
        }
        if let Some(compile) = &self.sim_compile_cmd {
            config = config.with_sim_compile(compile.clone());
        }
        config
    }
}

/// Options of the `diff` command that shape the run.
#[allow(clippy::struct_excessive_bools)]
pub struct DiffArgs<'a> {
    pub no_build: bool,
    pub force_rebuild: bool,
    pub keep_going: bool,
    pub jobs: usize,
    pub filter: Option<&'a Regex>,
    pub truncate_exit_codes: bool,
}

impl DiffArgs<'_> {
    pub fn run_options(&self) -> RunOptions {
        let options = RunOptions::default()
            .with_skip_build(self.no_build)
            .with_force_rebuild(self.force_rebuild)
            .with_keep_going(self.keep_going)
            .with_jobs(self.jobs)
            .with_truncate_exit_codes(self.truncate_exit_codes);
        match self.filter {
            Some(filter) => options.with_filter(filter.clone()),
            None => options,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ResultChannelArg {
    /// Simulator exit code
    ExitCode,
    /// Last line of simulator stdout
    Stdout,
}

impl From<ResultChannelArg> for ResultChannel {
    fn from(arg: ResultChannelArg) -> Self {
        match arg {
            ResultChannelArg::ExitCode => Self::ExitCode,
            ResultChannelArg::Stdout => Self::Stdout,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ClassArg {
    InvalidLex,
    InvalidParse,
    Valid,
}

impl From<ClassArg> for ValidityClass {
    fn from(arg: ClassArg) -> Self {
        match arg {
            ClassArg::InvalidLex => Self::InvalidLex,
            ClassArg::InvalidParse => Self::InvalidParse,
            ClassArg::Valid => Self::Valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_defaults() {
        let cli = Cli::try_parse_from(["wacct", "diff"]).unwrap();
        let Commands::Diff {
            chapters,
            all,
            no_build,
            jobs,
            ..
        } = cli.command
        else {
            panic!("expected diff");
        };
        assert!(chapters.is_empty());
        assert!(!all && !no_build);
        assert_eq!(jobs, 1);

        let config = cli.harness.config();
        assert_eq!(config.build_command.to_string(), "cargo build --release");
        assert_eq!(config.corpus_root, PathBuf::from(wacct::DEFAULT_CORPUS_DIR));
    }

    #[test]
    fn test_diff_chapters_and_flags() {
        let cli = Cli::try_parse_from([
            "wacct",
            "diff",
            "1",
            "3",
            "--no-build",
            "--filter",
            "^return",
            "--corpus",
            "/tmp/corpus",
        ])
        .unwrap();
        let Commands::Diff {
            chapters,
            no_build,
            filter,
            ..
        } = cli.command
        else {
            panic!("expected diff");
        };
        let chapters: Vec<u32> = chapters.iter().map(|c| c.get()).collect();
        assert_eq!(chapters, [1, 3]);
        assert!(no_build);
        assert!(filter.unwrap().is_match("return_2.c"));
        assert_eq!(cli.harness.corpus, PathBuf::from("/tmp/corpus"));
    }

    #[test]
    fn test_rejects_chapter_zero() {
        assert!(Cli::try_parse_from(["wacct", "diff", "0"]).is_err());
        assert!(Cli::try_parse_from(["wacct", "diff", "--no-build", "--force-rebuild"]).is_err());
    }
}
