//! Differential runner.
//!
//! Runs every valid test of the requested chapters through the native and the
//! simulated backend and compares their termination codes. The first
//! disagreement ends the run unless `keep_going` is set.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, info, warn};
use wacct_corpus::{ChapterId, Corpus, TestCase, ValidityClass};

use crate::{
    Backend, BuildSystem, Builder, CancelToken, ExecutionResult, HarnessError, ProgressSink,
    Result,
};

/// Policy for one run.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunOptions {
    /// Rebuild even if the compiler was already built in this run.
    pub force_rebuild: bool,
    /// Do not build at all; the binary is assumed to exist.
    pub skip_build: bool,
    /// Collect every divergence instead of stopping at the first.
    pub keep_going: bool,
    /// Worker threads (1 = sequential, 0 = one per CPU).
    pub jobs: usize,
    /// Compare termination codes modulo 256.
    pub truncate_exit_codes: bool,
    /// Only run tests whose file name matches.
    pub filter: Option<Regex>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force_rebuild: false,
            skip_build: false,
            keep_going: false,
            jobs: 1,
            truncate_exit_codes: false,
            filter: None,
        }
    }
}

impl RunOptions {
    #[must_use]
    pub const fn with_force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    #[must_use]
    pub const fn with_skip_build(mut self, skip: bool) -> Self {
        self.skip_build = skip;
        self
    }

    #[must_use]
    pub const fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    #[must_use]
    pub const fn with_truncate_exit_codes(mut self, truncate: bool) -> Self {
        self.truncate_exit_codes = truncate;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Number of worker threads to use.
    #[must_use]
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

/// A test on which the backends disagreed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub case: TestCase,
    pub native: ExecutionResult,
    pub simulated: ExecutionResult,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FAILED {} (native: {}, simulated: {})",
            self.case, self.native, self.simulated
        )
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Tests enumerated across all requested chapters.
    pub total: usize,
    /// Tests on which both backends agreed.
    pub passed: usize,
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotBuilt,
    Building,
    Built,
    Running,
    Succeeded,
    DivergedAborted,
    BuildFailed,
    /// An adapter or corpus error ended the run.
    Failed,
    /// Interrupted.
    Aborted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Compares two backends over a corpus.
pub struct DiffRunner<'a> {
    corpus: &'a Corpus,
    native: &'a dyn Backend,
    simulated: &'a dyn Backend,
    progress: &'a dyn ProgressSink,
    cancel: CancelToken,
    phase: RunPhase,
}

impl<'a> DiffRunner<'a> {
    pub fn new(
        corpus: &'a Corpus,
        native: &'a dyn Backend,
        simulated: &'a dyn Backend,
        progress: &'a dyn ProgressSink,
        cancel: CancelToken,
    ) -> Self {
        Self {
            corpus,
            native,
            simulated,
            progress,
            cancel,
            phase: RunPhase::NotBuilt,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: RunPhase) {
        debug!(from = %self.phase, to = %phase, "run phase");
        self.phase = phase;
    }

    /// List the valid tests of `chapters`, in chapter order then name order.
    ///
    /// # Errors
    ///
    /// Fails if any chapter's `valid` directory is missing.
    pub fn enumerate(
        &self,
        chapters: &[ChapterId],
        filter: Option<&Regex>,
    ) -> Result<Vec<TestCase>> {
        let mut cases = self.corpus.list_chapters(chapters, ValidityClass::Valid)?;
        if let Some(filter) = filter {
            cases.retain(|case| filter.is_match(&case.file_name));
        }
        Ok(cases)
    }

    /// Build the compiler, then compare both backends on every valid test.
    ///
    /// # Errors
    ///
    /// Returns the first error of the run: a missing corpus directory, a
    /// build failure, an adapter failure, an interrupt, or the first
    /// [`HarnessError::Divergence`] (all of them as
    /// [`HarnessError::Divergences`] with `keep_going`).
    pub fn run<B: BuildSystem>(
        &mut self,
        builder: &mut Builder<B>,
        chapters: &[ChapterId],
        options: &RunOptions,
    ) -> Result<RunReport> {
        let cases = match self.enumerate(chapters, options.filter.as_ref()) {
            Ok(cases) => cases,
            Err(e) => {
                self.set_phase(RunPhase::Failed);
                return Err(e);
            }
        };
        if cases.is_empty() {
            warn!(chapters = ?chapters, "no valid tests found in the requested chapters");
        }

        if options.skip_build {
            builder.assume_built();
        } else {
            self.set_phase(RunPhase::Building);
            let rebuilding = options.force_rebuild || !builder.is_built();
            if rebuilding {
                self.progress.build_started(&builder.system().describe());
            }
            let built = builder.ensure_built(options.force_rebuild, &self.cancel);
            if rebuilding {
                self.progress.build_finished(built.is_ok());
            }
            if let Err(e) = built {
                self.set_phase(match e {
                    HarnessError::RunAborted => RunPhase::Aborted,
                    _ => RunPhase::BuildFailed,
                });
                return Err(e);
            }
        }
        self.set_phase(RunPhase::Built);

        let jobs = options.effective_jobs();
        info!(tests = cases.len(), chapters = chapters.len(), jobs, "running tests");
        self.set_phase(RunPhase::Running);
        self.progress
            .start(u64::try_from(cases.len()).unwrap_or(u64::MAX));

        let result = if jobs > 1 && cases.len() > 1 {
            self.run_parallel(&cases, options, jobs)
        } else {
            self.run_sequential(&cases, options)
        };
        self.progress.finish();

        self.set_phase(match &result {
            Ok(_) => RunPhase::Succeeded,
            Err(HarnessError::Divergence(_) | HarnessError::Divergences(_)) => {
                RunPhase::DivergedAborted
            }
            Err(HarnessError::RunAborted) => RunPhase::Aborted,
            Err(_) => RunPhase::Failed,
        });
        if let Ok(report) = &result {
            info!(passed = report.passed, "all tests agree");
        }
        result
    }

    fn run_sequential(&self, cases: &[TestCase], options: &RunOptions) -> Result<RunReport> {
        let mut passed = 0;
        let mut divergences = Vec::new();

        for case in cases {
            self.cancel.check()?;
            self.progress.begin(case);
            match self.check_case(case, options.truncate_exit_codes, &self.cancel)? {
                None => passed += 1,
                Some(divergence) if options.keep_going => divergences.push(divergence),
                Some(divergence) => return Err(HarnessError::Divergence(divergence)),
            }
            self.progress.advance();
        }

        finish(cases.len(), passed, divergences)
    }

    /// Run cases on a worker pool.
    ///
    /// The first failure cancels in-flight siblings; of the failures seen,
    /// the one with the lowest corpus index is reported.
    fn run_parallel(
        &self,
        cases: &[TestCase],
        options: &RunOptions,
        jobs: usize,
    ) -> Result<RunReport> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        let cancel = self.cancel.child();
        let failure: Mutex<Option<(usize, HarnessError)>> = Mutex::new(None);
        let divergences: Mutex<Vec<(usize, Divergence)>> = Mutex::new(Vec::new());
        let passed = AtomicUsize::new(0);

        pool.install(|| {
            cases.par_iter().enumerate().for_each(|(index, case)| {
                if cancel.is_cancelled() {
                    return;
                }
                self.progress.begin(case);
                let err = match self.check_case(case, options.truncate_exit_codes, &cancel) {
                    Ok(None) => {
                        passed.fetch_add(1, Ordering::Relaxed);
                        self.progress.advance();
                        return;
                    }
                    Ok(Some(divergence)) if options.keep_going => {
                        divergences.lock().push((index, divergence));
                        self.progress.advance();
                        return;
                    }
                    Ok(Some(divergence)) => HarnessError::Divergence(divergence),
                    // Cancelled by a sibling's failure, which is reported instead
                    Err(HarnessError::RunAborted) if !self.cancel.is_cancelled() => return,
                    Err(e) => e,
                };

                let mut slot = failure.lock();
                if slot.as_ref().is_none_or(|(first, _)| index < *first) {
                    *slot = Some((index, err));
                }
                cancel.cancel();
            });
        });

        if let Some((_, err)) = failure.into_inner() {
            return Err(err);
        }
        self.cancel.check()?;

        let mut divergences = divergences.into_inner();
        let passed = passed.into_inner();
        // A case skipped without a recorded failure was interrupted
        if passed + divergences.len() < cases.len() {
            return Err(HarnessError::RunAborted);
        }
        divergences.sort_by_key(|(index, _)| *index);
        finish(
            cases.len(),
            passed,
            divergences.into_iter().map(|(_, d)| d).collect(),
        )
    }

    /// Run one case on both backends, native first.
    fn check_case(
        &self,
        case: &TestCase,
        truncate: bool,
        cancel: &CancelToken,
    ) -> Result<Option<Divergence>> {
        let path = self.corpus.path(case);
        let native = self.native.execute(&path, cancel)?;
        let simulated = self.simulated.execute(&path, cancel)?;

        let agreed = native.agrees_with(simulated, truncate);
        crate::metrics::record_test(case, agreed);
        debug!(case = %case, %native, %simulated, agreed, "compared");

        if agreed {
            Ok(None)
        } else {
            warn!(case = %case, %native, %simulated, "backends diverged");
            Ok(Some(Divergence {
                case: case.clone(),
                native,
                simulated,
            }))
        }
    }
}

fn finish(total: usize, passed: usize, divergences: Vec<Divergence>) -> Result<RunReport> {
    if divergences.is_empty() {
        Ok(RunReport { total, passed })
    } else {
        Err(HarnessError::Divergences(divergences))
    }
}
