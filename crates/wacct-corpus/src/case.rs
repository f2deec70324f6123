use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use crate::{CorpusError, ValidityClass};

/// A chapter number. Chapters start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChapterId(NonZeroU32);

impl ChapterId {
    /// Create a chapter id, returning `None` for zero.
    #[must_use]
    pub const fn new(n: u32) -> Option<Self> {
        match NonZeroU32::new(n) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Directory name of this chapter (e.g. `chapter_3`).
    #[must_use]
    pub fn dir_name(self) -> String {
        format!("chapter_{}", self.0)
    }

    /// Parse a chapter directory name back into an id.
    ///
    /// Only canonical names are accepted: `chapter_01` would not be found
    /// again by [`ChapterId::dir_name`].
    #[must_use]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let chapter: Self = name.strip_prefix("chapter_")?.parse().ok()?;
        (chapter.dir_name() == name).then_some(chapter)
    }
}

impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChapterId {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<NonZeroU32>()
            .map(Self)
            .map_err(|_| CorpusError::InvalidChapter(s.to_string()))
    }
}

/// One source file in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestCase {
    pub chapter: ChapterId,
    pub class: ValidityClass,
    /// File name including the `.c` extension.
    pub file_name: String,
}

impl TestCase {
    pub fn new(chapter: ChapterId, class: ValidityClass, file_name: impl Into<String>) -> Self {
        Self {
            chapter,
            class,
            file_name: file_name.into(),
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.chapter, self.file_name)
    }
}
