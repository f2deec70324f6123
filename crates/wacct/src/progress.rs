//! Progress reporting hooks for the differential runner.

use wacct_corpus::TestCase;

/// Receives progress updates during a run.
///
/// Methods cannot fail, so a reporter can never change a run's outcome.
pub trait ProgressSink: Send + Sync {
    /// The compiler build described by `command` is starting.
    fn build_started(&self, _command: &str) {}

    /// The compiler build ended; `ok` is false if it failed or was aborted.
    fn build_finished(&self, _ok: bool) {}

    /// The run is about to execute `total` tests.
    fn start(&self, total: u64);

    /// `case` is now executing.
    fn begin(&self, case: &TestCase);

    /// One test finished on both backends.
    fn advance(&self);

    /// The run ended, successfully or not.
    fn finish(&self);
}

/// Reporter that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _total: u64) {}
    fn begin(&self, _case: &TestCase) {}
    fn advance(&self) {}
    fn finish(&self) {}
}
