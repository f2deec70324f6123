use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{ChapterId, CorpusError, Result, TestCase, ValidityClass};

/// Directory under the corpus root holding the chapters.
pub const TESTS_DIR: &str = "tests";

/// Extension of test source files.
pub const SOURCE_EXTENSION: &str = "c";

/// A test corpus rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
}

impl Corpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one chapter's tests of the given class.
    #[must_use]
    pub fn dir(&self, chapter: ChapterId, class: ValidityClass) -> PathBuf {
        self.root
            .join(TESTS_DIR)
            .join(chapter.dir_name())
            .join(class.as_str())
    }

    /// On-disk path of a test case.
    #[must_use]
    pub fn path(&self, case: &TestCase) -> PathBuf {
        self.dir(case.chapter, case.class).join(&case.file_name)
    }

    /// List the source files of one chapter and class, sorted by name.
    ///
    /// Directories and files without the source extension are skipped.
    /// An empty directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError::NotFound`] if the directory does not exist.
    pub fn list(&self, chapter: ChapterId, class: ValidityClass) -> Result<Vec<TestCase>> {
        let dir = self.dir(chapter, class);
        let entries = fs::read_dir(&dir).map_err(|e| io_error(&dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|s| s.to_str()) != Some(SOURCE_EXTENSION) {
                continue;
            }
            // Non-UTF-8 names cannot be passed through to the backends
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            names.push(name.to_string());
        }
        names.sort();

        debug!(chapter = %chapter, class = %class, count = names.len(), "listed tests");
        Ok(names
            .into_iter()
            .map(|name| TestCase::new(chapter, class, name))
            .collect())
    }

    /// List the tests of several chapters, keeping the caller's chapter order.
    ///
    /// # Errors
    ///
    /// Fails on the first chapter whose directory is missing.
    pub fn list_chapters(
        &self,
        chapters: &[ChapterId],
        class: ValidityClass,
    ) -> Result<Vec<TestCase>> {
        let mut cases = Vec::new();
        for &chapter in chapters {
            cases.extend(self.list(chapter, class)?);
        }
        Ok(cases)
    }

    /// Find all `chapter_<N>` directories in the corpus, in numeric order.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError::NotFound`] if the corpus has no `tests` directory.
    pub fn discover_chapters(&self) -> Result<Vec<ChapterId>> {
        let dir = self.root.join(TESTS_DIR);
        let entries = fs::read_dir(&dir).map_err(|e| io_error(&dir, e))?;

        let mut chapters: Vec<ChapterId> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().and_then(ChapterId::from_dir_name))
            .collect();
        chapters.sort();
        Ok(chapters)
    }
}

fn io_error(path: &Path, source: io::Error) -> CorpusError {
    if source.kind() == io::ErrorKind::NotFound {
        CorpusError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        CorpusError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
