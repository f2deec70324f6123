//! Differential test command.

use wacct::{Builder, CancelToken, ChapterId, CommandBuildSystem, DiffRunner, HarnessConfig};

use super::report_error;
use crate::cli::{DiffArgs, EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, BarProgress};

/// Build the compiler and compare both backends on the chosen chapters.
pub fn cmd_diff(
    config: &HarnessConfig,
    chapters: &[ChapterId],
    all: bool,
    args: &DiffArgs<'_>,
    silent: bool,
    cancel: &CancelToken,
) -> i32 {
    let corpus = config.corpus();
    let chapters = if all {
        match corpus.discover_chapters() {
            Ok(found) => found,
            Err(e) => {
                terminal::error(&e.to_string());
                return EXIT_FAILURE;
            }
        }
    } else if chapters.is_empty() {
        ChapterId::new(1).into_iter().collect()
    } else {
        chapters.to_vec()
    };
    let options = args.run_options();

    let native = config.native_backend();
    let simulated = config.simulated_backend();
    let progress = if silent {
        BarProgress::hidden()
    } else {
        BarProgress::new()
    };
    let mut builder = Builder::new(CommandBuildSystem::from_config(config));
    let mut runner = DiffRunner::new(&corpus, &native, &simulated, &progress, cancel.clone());

    if !silent {
        terminal::header(&format!(
            "Running potato CPU tests for chapter(s) {}",
            join_chapters(&chapters)
        ));
    }

    match runner.run(&mut builder, &chapters, &options) {
        Ok(report) if report.total == 0 => {
            terminal::warning(&format!(
                "No valid tests found in chapter(s) {}",
                join_chapters(&chapters)
            ));
            EXIT_SUCCESS
        }
        Ok(report) => {
            if !silent {
                terminal::success(&format!(
                    "{}/{} tests agree between native and potato CPU",
                    report.passed, report.total
                ));
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            report_error(&e);
            EXIT_FAILURE
        }
    }
}

fn join_chapters(chapters: &[ChapterId]) -> String {
    chapters
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
