//! Compiler build command.

use wacct::{Builder, CancelToken, CommandBuildSystem, HarnessConfig};

use super::report_error;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::Spinner;

/// Run the configured build command once.
pub fn cmd_build(config: &HarnessConfig, cancel: &CancelToken) -> i32 {
    let mut builder = Builder::new(CommandBuildSystem::from_config(config));
    let spinner = Spinner::new(format!("Building compiler ({})", config.build_command));

    match builder.ensure_built(false, cancel) {
        Ok(_) => {
            spinner.finish_with_success("Compiler built");
            EXIT_SUCCESS
        }
        Err(e) => {
            spinner.finish_with_failure("Compiler build failed");
            report_error(&e);
            EXIT_FAILURE
        }
    }
}
