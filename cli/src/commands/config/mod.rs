//! # Colugo Config Command Group
//!
//! File: cli/src/commands/config/mod.rs
//!
//! ## Overview
//!
//! Router for `colugo config`. Configuration is read-only from the CLI's
//! point of view: users edit `.colugo.toml` or the user `config.toml` by
//! hand, and `colugo config show` prints what Colugo will actually use.
//!
//! ## Usage
//!
//! ```bash
//! colugo config show
//! ```
//!
use colugo::core::error::Result;
use clap::{Parser, Subcommand};

/// Implements `colugo config show`.
mod show;

/// Arguments for the `colugo config` command group.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective (merged and validated) configuration as TOML.
    Show(show::ShowArgs),
}

pub async fn handle_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show(args) => show::handle_show(args).await?,
    }
    Ok(())
}
