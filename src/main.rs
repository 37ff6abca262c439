//! procbridge - cross-process helper CLI
//!
//! Exposes the library from a terminal:
//! - platform, pid and executable queries
//! - fire-and-forget, blocking, buffered and streamed command execution
//! - `--restricted` to route process operations through a privileged endpoint

mod cli;

use clap::Parser;
use cli::process::{exit_code_for, Session};
use cli::{exit_codes, Cli};
use procbridge::bridge::ExecutionContext;
use procbridge::logging::{self, LogFormat};
use procbridge::settings::Settings;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONFIG_ERROR;
        }
    };

    // Initialize logging
    let directives = logging::directives(
        cli.verbose || settings.verbose,
        std::env::var("RUST_LOG").ok(),
        settings.log_filter.as_deref(),
    );
    if let Err(e) = logging::init(LogFormat::from_json_flag(cli.json_output), &directives) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    // Create tokio runtime for async commands
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    let context = if cli.restricted {
        ExecutionContext::Restricted
    } else {
        settings.context
    };
    tracing::debug!("Running in {:?} context", context);

    let session = Session {
        runner: settings.command_runner(),
        context,
        json: cli.json_output,
    };

    rt.block_on(async {
        match cli::process::run(cli.command, &session).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                exit_code_for(&e)
            }
        }
    })
}
