//! # Colugo Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! This file serves as the main entry point for the Colugo CLI application.
//! It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to the appropriate command handler
//! - Translating the outcome into a process exit code
//!
//! ## Architecture
//!
//! - Each top-level command (`run`, `config`) is a variant in the `Commands` enum
//! - Commands are mapped to handler functions in their respective modules
//! - All errors are propagated to this level for consistent reporting
//!
//! ## Examples
//!
//! ```bash
//! # Get help
//! colugo --help
//!
//! # Run a command with a deadline and increased verbosity
//! colugo -vv run -t 5 -- make test
//! ```
//!
//! Exit codes: the program's own exit code for `run`, `128 + signal` when it
//! was killed by a signal, `124` when it missed its deadline, `127` when it
//! could not be launched, and `1` for any other error.
//!
use clap::{Parser, Subcommand};
use colugo::common::text::textwrap;
use colugo::SubprocessError;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::run::{EXIT_LAUNCH_FAILED, EXIT_TIMEOUT};

/// Width used when wrapping error messages for the terminal.
const ERROR_WRAP_WIDTH: usize = 100;

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "colugo",
    about = "Colugo: run programs with captured output, deadlines and kill policy",
    long_about = "Launches child processes from an explicit argument vector, drains stdout and \
                  stderr without deadlocking, and enforces optional deadlines.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Enum defining all available top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    #[command(alias = "r")]
    Run(commands::run::RunArgs),
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Run(args) => commands::run::handle_run(args).await,
        Commands::Config(args) => commands::config::handle_config(args).await.map(|()| 0),
    };

    let code = match command_result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Command execution failed: {:?}", e);
            let message = format!("Error: {:#}", e);
            eprintln!("{}", textwrap(&message, ERROR_WRAP_WIDTH, 0, 7));
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

/// Exit code for a failed command, based on the underlying subprocess error.
fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SubprocessError>() {
        Some(SubprocessError::Launch { .. }) => EXIT_LAUNCH_FAILED,
        Some(SubprocessError::Timeout { .. }) => EXIT_TIMEOUT,
        _ => 1,
    }
}
