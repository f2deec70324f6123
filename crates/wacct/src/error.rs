use std::path::PathBuf;

use thiserror::Error;
use wacct_corpus::CorpusError;

use crate::backend::{BackendKind, Stage};
use crate::runner::Divergence;

/// Harness errors.
///
/// None of these are recovered from inside a run; every one aborts it.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("failed to launch build command '{program}': {source}")]
    BuildLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build the compiler ({})", describe_code(*.code))]
    BuildFailure {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{backend} backend could not be launched ({program}): {source}")]
    AdapterLaunch {
        backend: BackendKind,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend} backend failed during {stage} of {}: {message}", .path.display())]
    AdapterExecution {
        backend: BackendKind,
        stage: Stage,
        path: PathBuf,
        message: String,
    },

    #[error("{0}")]
    Divergence(Divergence),

    #[error("{} tests diverged", .0.len())]
    Divergences(Vec<Divergence>),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("run aborted")]
    RunAborted,
}

impl HarnessError {
    /// Whether this error reports a missing corpus directory.
    #[must_use]
    pub const fn is_corpus_not_found(&self) -> bool {
        matches!(self, Self::Corpus(CorpusError::NotFound { .. }))
    }
}

/// Render a process exit code, `None` meaning killed by a signal.
pub(crate) fn describe_code(code: Option<i32>) -> String {
    code.map_or_else(
        || "terminated by signal".to_string(),
        |c| format!("exit code {c}"),
    )
}

pub type Result<T> = std::result::Result<T, HarnessError>;
