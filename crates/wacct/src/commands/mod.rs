//! Command implementations.
//!
//! Each submodule handles a specific CLI command.

mod build;
mod diff;
mod list;
mod run;

use wacct::{CancelToken, HarnessError};

use crate::cli::{Cli, Commands, DiffArgs};
use crate::terminal;

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli, cancel: &CancelToken) -> i32 {
    match &cli.command {
        Commands::Diff { .. } => handle_diff(cli, cancel),
        Commands::List { .. } => handle_list(cli),
        Commands::Run {
            source,
            truncate_exit_codes,
        } => run::cmd_run(&cli.harness.config(), source, *truncate_exit_codes, cancel),
        Commands::Build => build::cmd_build(&cli.harness.config(), cancel),
    }
}

fn handle_diff(cli: &Cli, cancel: &CancelToken) -> i32 {
    let Commands::Diff {
        chapters,
        all,
        no_build,
        force_rebuild,
        keep_going,
        jobs,
        filter,
        truncate_exit_codes,
    } = &cli.command
    else {
        unreachable!("diff command variant mismatch");
    };

    let args = DiffArgs {
        no_build: *no_build,
        force_rebuild: *force_rebuild,
        keep_going: *keep_going,
        jobs: *jobs,
        filter: filter.as_ref(),
        truncate_exit_codes: *truncate_exit_codes,
    };
    diff::cmd_diff(
        &cli.harness.config(),
        chapters,
        *all,
        &args,
        cli.silent,
        cancel,
    )
}

fn handle_list(cli: &Cli) -> i32 {
    let Commands::List { chapters, class } = &cli.command else {
        unreachable!("list command variant mismatch");
    };
    list::cmd_list(&cli.harness.config(), chapters, (*class).into())
}

/// Print a harness error, with captured output where there is some.
fn report_error(err: &HarnessError) {
    match err {
        HarnessError::BuildFailure { stdout, stderr, .. } => {
            terminal::error(&err.to_string());
            terminal::captured("stdout", stdout);
            terminal::captured("stderr", stderr);
        }
        HarnessError::Divergences(divergences) => {
            for divergence in divergences {
                terminal::error(&divergence.to_string());
            }
            terminal::error(&err.to_string());
        }
        HarnessError::RunAborted => terminal::warning("Interrupted"),
        _ => terminal::error(&err.to_string()),
    }
}
