//! # Colugo Config Show Handler
//!
//! File: cli/src/commands/config/show.rs
//!
//! ## Overview
//!
//! Implements `colugo config show`: loads the layered configuration (project
//! `.colugo.toml`, user `config.toml`, defaults), and prints the merged result
//! as TOML on stdout. The sources that were found are listed in comments above
//! the TOML so the output stays valid configuration.
//!
use colugo::core::config;
use colugo::core::error::Result;
use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(about = "Print the effective configuration as TOML")]
pub struct ShowArgs {}

pub async fn handle_show(args: ShowArgs) -> Result<()> {
    info!("Handling config show command...");
    debug!("Show args: {:?}", args);

    let cfg = config::load_config().context("Failed to load Colugo configuration")?;
    let rendered = toml::to_string_pretty(&cfg).context("Failed to render configuration as TOML")?;

    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    match config::find_project_config_path(&current_dir) {
        Some(path) => println!("# project config: {}", path.display()),
        None => println!("# project config: (none)"),
    }
    match config::user_config_path().filter(|path| path.exists()) {
        Some(path) => println!("# user config: {}", path.display()),
        None => println!("# user config: (none)"),
    }
    print!("{}", rendered);
    Ok(())
}
