use chromemate::cli::commands;
use chromemate::cli::{Cli, Commands};
use chromemate::config;
use chromemate::logging::init_logging;
use chromemate::{ChromemateError, StructuredError};
use clap::Parser;
use std::io::{self, IsTerminal};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let overrides = build_cli_overrides(&cli);

    let result = match &cli.command {
        Commands::Merge(args) => commands::merge::execute(args, cli.json, cli.quiet, &overrides),
        Commands::Preview(args) => {
            commands::preview::execute(args, cli.json, cli.quiet, &overrides)
        }
    };

    if let Err(e) = result {
        handle_error(&e, cli.json);
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &ChromemateError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}

fn build_cli_overrides(cli: &Cli) -> config::CliOverrides {
    config::CliOverrides {
        config: cli.config.clone(),
        store_file: cli.store_file.clone(),
        lock_timeout: cli.lock_timeout,
        work_dir: cli.work_dir.clone(),
        no_integrity_check: Some(cli.no_integrity_check),
    }
}
