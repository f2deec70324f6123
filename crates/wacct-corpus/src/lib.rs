//! Test corpus layout for the C compiler tests.
//!
//! The corpus is a fixed directory tree:
//!
//! ```text
//! <root>/tests/chapter_<N>/<valid|invalid_lex|invalid_parse>/<name>.c
//! ```
//!
//! This crate maps `(chapter, class)` pairs onto that tree and lists the
//! source files found there.

mod case;
mod class;
mod corpus;

pub use case::{ChapterId, TestCase};
pub use class::ValidityClass;
pub use corpus::{Corpus, SOURCE_EXTENSION, TESTS_DIR};

use std::path::PathBuf;

use thiserror::Error;

/// Corpus lookup errors.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("corpus directory not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid chapter '{0}': expected a positive integer")]
    InvalidChapter(String),
    #[error("unknown validity class '{0}', expected one of: invalid_lex, invalid_parse, valid")]
    UnknownClass(String),
}

pub type Result<T> = std::result::Result<T, CorpusError>;
