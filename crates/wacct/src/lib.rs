//! wacct - differential test harness for the C compiler.
//!
//! Builds the compiler, runs every valid program of the requested test
//! chapters through the native backend (the compiler binary itself) and
//! the simulated backend (a compile-and-execute service for the potato
//! CPU), and fails as soon as the two disagree on a termination code.
//!
//! # Example
//!
//! ```ignore
//! use wacct::{Builder, CancelToken, CommandBuildSystem, DiffRunner, HarnessConfig, RunOptions};
//!
//! let config = HarnessConfig::default();
//! let mut builder = Builder::new(CommandBuildSystem::from_config(&config));
//! let native = config.native_backend();
//! let simulated = config.simulated_backend();
//! let mut runner = DiffRunner::new(&config.corpus(), &native, &simulated, &wacct::NoProgress, CancelToken::new());
//! let report = runner.run(&mut builder, &chapters, &RunOptions::default())?;
//! ```

pub mod backend;
mod build;
mod cancel;
mod config;
mod error;
pub mod metrics;
pub mod process;
mod progress;
mod runner;

pub use backend::{Backend, BackendKind, ExecutionResult, Stage};
pub use build::{BuildOutcome, BuildSystem, Builder, CommandBuildSystem};
pub use cancel::CancelToken;
pub use config::{CommandLine, HarnessConfig, DEFAULT_BINARY, DEFAULT_CORPUS_DIR};
pub use error::{HarnessError, Result};
pub use progress::{NoProgress, ProgressSink};
pub use runner::{DiffRunner, Divergence, RunOptions, RunPhase, RunReport};

pub use wacct_corpus::{ChapterId, Corpus, CorpusError, TestCase, ValidityClass};
