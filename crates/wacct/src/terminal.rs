//! Terminal UI utilities for progress indication and styled output.
//!
//! Provides spinners, progress bars, and styled output helpers for CLI commands.

use std::borrow::Cow;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use wacct::{ProgressSink, TestCase};

/// Spinner for indeterminate progress.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Create a new spinner with a message.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.cyan} {msg}")
        {
            bar.set_style(spinner_style);
        }
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    /// Finish the spinner with a success message.
    pub fn finish_with_success(&self, message: &str) {
        self.bar.finish_and_clear();
        success(message);
    }

    /// Finish the spinner with a failure message.
    pub fn finish_with_failure(&self, message: &str) {
        self.bar.finish_and_clear();
        error(message);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Progress bar over the tests of a run.
///
/// Shows a spinner while the compiler builds, then the in-flight test as
/// the bar message.
pub struct BarProgress {
    bar: ProgressBar,
    build: Mutex<Option<Spinner>>,
    quiet: bool,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::no_length();
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{pos}/{len} [{bar:30.cyan/dim}] {elapsed_precise} {msg}")
        {
            bar.set_style(bar_style.progress_chars("━╸━"));
        }
        Self {
            bar,
            build: Mutex::new(None),
            quiet: false,
        }
    }

    /// A bar that never draws (for `--silent`).
    pub fn hidden() -> Self {
        let mut progress = Self::new();
        progress.bar.set_draw_target(ProgressDrawTarget::hidden());
        progress.quiet = true;
        progress
    }
}

impl ProgressSink for BarProgress {
    fn build_started(&self, command: &str) {
        if !self.quiet {
            *self.build.lock() = Some(Spinner::new(format!("Building compiler ({command})")));
        }
    }

    fn build_finished(&self, ok: bool) {
        if let Some(spinner) = self.build.lock().take() {
            if ok {
                spinner.finish_with_success("Compiler built");
            } else {
                spinner.finish_with_failure("Compiler build failed");
            }
        }
    }

    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn begin(&self, case: &TestCase) {
        self.bar
            .set_message(format!("Executing test [{}]: {} ...", case.chapter, case.file_name));
    }

    fn advance(&self) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

// ============================================================================
// Styled output helpers
// ============================================================================

/// Print an info message to stderr.
pub fn info(message: &str) {
    eprintln!("{} {}", style("→").cyan(), message);
}

/// Print a success message to stderr.
pub fn success(message: &str) {
    eprintln!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message to stderr.
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

/// Print a header/section title.
pub fn header(message: &str) {
    eprintln!("\n{}", style(message).bold());
}

/// Print a block of captured output, dimmed and indented.
pub fn captured(label: &str, text: &str) {
    let text = text.trim_end();
    if text.is_empty() {
        return;
    }
    eprintln!("  {}", style(label).dim().bold());
    for line in text.lines() {
        eprintln!("    {}", style(line).dim());
    }
}
