//! wacct CLI - differential tester for the C compiler

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use wacct::CancelToken;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Initialize metrics recorder if enabled
    let metrics_handle = if cli.metrics {
        wacct::metrics::CliRecorder::new().install()
    } else {
        None
    };
    wacct::metrics::init();

    // Progress bars carry per-test output during runs, so keep logs quiet there
    let default_level = if cli.verbose {
        "wacct=debug"
    } else if cli.silent {
        "wacct=error"
    } else {
        match &cli.command {
            Commands::Diff { .. } => "wacct=warn",
            _ => "wacct=info",
        }
    };
    let directive = default_level
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("failed to install interrupt handler: {e}");
    }

    let exit_code = commands::run_command(&cli, &cancel);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}
