//! Single-file comparison command.

use std::path::Path;

use wacct::{Backend, CancelToken, HarnessConfig};

use super::report_error;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Run one source file on both backends and print both termination codes.
///
/// Does not build; the compiler binary must already exist. `truncate`
/// compares modulo 256, as `diff --truncate-exit-codes` does.
pub fn cmd_run(config: &HarnessConfig, source: &Path, truncate: bool, cancel: &CancelToken) -> i32 {
    let native = config.native_backend();
    let simulated = config.simulated_backend();

    let native_result = match native.execute(source, cancel) {
        Ok(result) => result,
        Err(e) => {
            report_error(&e);
            return EXIT_FAILURE;
        }
    };
    println!("native:    {native_result}");

    let simulated_result = match simulated.execute(source, cancel) {
        Ok(result) => result,
        Err(e) => {
            report_error(&e);
            return EXIT_FAILURE;
        }
    };
    println!("simulated: {simulated_result}");

    if native_result.agrees_with(simulated_result, truncate) {
        terminal::success("Backends agree");
        EXIT_SUCCESS
    } else {
        terminal::error(&format!(
            "Backends disagree on {} (native: {native_result}, simulated: {simulated_result})",
            source.display()
        ));
        EXIT_FAILURE
    }
}
