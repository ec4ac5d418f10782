//! # Colugo Configuration System
//!
//! File: lib/src/core/config.rs
//!
//! ## Overview
//!
//! This module implements the configuration system for Colugo, handling
//! loading, merging, validation, and access to configuration data. It combines
//! built-in defaults, user settings, and project-specific overrides into the
//! default wait policy and launch options used when running a command.
//!
//! ## Architecture
//!
//! The configuration system follows these principles:
//! - Configuration is loaded from multiple sources in order of precedence
//! - Files are layered as raw TOML tables, so any key a file sets wins over
//!   lower layers, even when it sets the default value
//! - Paths are expanded (`~` to the home directory) before validation
//! - Configuration is validated for correctness before use
//! - Unknown keys are rejected so typos do not go unnoticed
//!
//! Configuration sources (in order of precedence):
//! 1. Project-specific `.colugo.toml` in the current directory or an ancestor
//!    (the search stops at a directory containing `.git`)
//! 2. User-specific `config.toml` in the platform config directory
//!    (`~/.config/colugo/config.toml` on Linux)
//! 3. Default values defined in the code
//!
//! ## Examples
//!
//! ```no_run
//! use colugo::core::config;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cfg = config::load_config()?;
//! let wait = cfg.wait_options();
//! let launch = cfg.launch_options();
//! # Ok(())
//! # }
//! ```
//!
use crate::common::process::{
    timeout_from_secs, LaunchOptions, StreamConfig, WaitOptions, DEFAULT_KILL_GRACE,
};
use crate::core::error::{ColugoError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};
use toml::{Table, Value};
use tracing::{debug, info, warn};

/// Name of the per-project configuration file.
pub const PROJECT_CONFIG_FILENAME: &str = ".colugo.toml";

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub subprocess: SubprocessConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
}

/// Wait policy and launch environment applied to every command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubprocessConfig {
    /// Deadline in seconds; 0 means unbounded.
    #[serde(default)]
    pub timeout_secs: f64,
    #[serde(default = "default_true")]
    pub kill_on_timeout: bool,
    #[serde(default)]
    pub raise_on_timeout: bool,
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    /// Working directory for the child (can use ~). Will be expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Extra environment variables for the child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 0.0,
            kill_on_timeout: default_true(),
            raise_on_timeout: false,
            kill_grace_ms: default_kill_grace_ms(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// Which standard streams of the child are piped to Colugo.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StreamsConfig {
    #[serde(default = "default_true")]
    pub stdin: bool,
    #[serde(default = "default_true")]
    pub stdout: bool,
    #[serde(default = "default_true")]
    pub stderr: bool,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            stdin: true,
            stdout: true,
            stderr: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_kill_grace_ms() -> u64 {
    DEFAULT_KILL_GRACE.as_millis() as u64
}

impl Config {
    /// Default wait policy for `wait`/`communicate`.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: timeout_from_secs(self.subprocess.timeout_secs),
            kill_on_timeout: self.subprocess.kill_on_timeout,
            raise_on_timeout: self.subprocess.raise_on_timeout,
            kill_grace: Duration::from_millis(self.subprocess.kill_grace_ms),
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::new(self.streams.stdin, self.streams.stdout, self.streams.stderr)
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            streams: self.stream_config(),
            working_dir: self.subprocess.working_dir.as_ref().map(PathBuf::from),
            env: self.subprocess.env.clone(),
        }
    }
}

/// Loads, merges, expands and validates the configuration for the current
/// directory.
pub fn load_config() -> Result<Config> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    load_config_from(&current_dir, user_config_path().as_deref())
}

/// Same as `load_config`, with the project search starting at `start_dir` and
/// the user configuration read from `user_config` (when given).
pub fn load_config_from(start_dir: &Path, user_config: Option<&Path>) -> Result<Config> {
    let user_layer = load_user_config(user_config)?;
    let project_layer = load_project_config(start_dir)?;
    let mut merged_config = merge_layers(user_layer.unwrap_or_default(), project_layer)?;
    expand_config_paths(&mut merged_config).context("Failed to expand paths in configuration")?;
    validate_config(&merged_config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", merged_config);
    Ok(merged_config)
}

/// Location of the user configuration file, if the platform has a config
/// directory.
pub fn user_config_path() -> Option<PathBuf> {
    match ProjectDirs::from("", "", "colugo") {
        Some(proj_dirs) => Some(proj_dirs.config_dir().join("config.toml")),
        None => {
            warn!("Could not determine user config directory.");
            None
        }
    }
}

fn load_user_config(config_path: Option<&Path>) -> Result<Option<Table>> {
    let Some(config_path) = config_path else {
        return Ok(None);
    };
    if config_path.exists() {
        info!("Loading user configuration from: {}", config_path.display());
        load_layer_from_path(config_path).map(Some)
    } else {
        debug!(
            "User configuration file not found at {}",
            config_path.display()
        );
        Ok(None)
    }
}

fn load_project_config(start_dir: &Path) -> Result<Option<Table>> {
    if let Some(project_config_path) = find_project_config_path(start_dir) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_layer_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file ({}) found in current directory or ancestors.", PROJECT_CONFIG_FILENAME);
        Ok(None)
    }
}

/// Walks up from `start_dir` looking for `.colugo.toml`, stopping at the
/// repository root (a directory containing `.git`).
pub fn find_project_config_path(start_dir: &Path) -> Option<PathBuf> {
    let mut path = start_dir;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

/// Reads one configuration file as a raw TOML table. The file is also
/// checked against the schema so errors name the file they came from.
fn load_layer_from_path(path: &Path) -> Result<Table> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str::<Config>(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))?;
    toml::from_str::<Table>(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Keys set in the project file win over the user file, even when the project
/// sets a key back to its default. Tables (`[subprocess]`, `env`) are merged
/// key by key; unset keys fall back to the built-in defaults.
fn merge_layers(user: Table, project: Option<Table>) -> Result<Config> {
    let mut merged = user;
    if let Some(project) = project {
        overlay_table(&mut merged, project);
    }
    Value::Table(merged)
        .try_into()
        .context("Failed to build configuration from merged files")
}

fn overlay_table(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match value {
            Value::Table(nested) => match base.get_mut(&key) {
                Some(Value::Table(existing)) => overlay_table(existing, nested),
                _ => {
                    base.insert(key, Value::Table(nested));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    debug!("Expanding paths in configuration...");
    if let Some(dir) = &mut config.subprocess.working_dir {
        *dir = shellexpand::tilde(dir.as_str()).into_owned();
        debug!("Expanded working directory: {}", dir);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    debug!("Validating final configuration...");
    let timeout = config.subprocess.timeout_secs;
    if !timeout.is_finite() || timeout < 0.0 {
        return Err(anyhow!(ColugoError::Config(format!(
            "timeout_secs must be a finite, non-negative number of seconds (got {}).",
            timeout
        ))));
    }
    if let Some(dir) = &config.subprocess.working_dir {
        let dir = PathBuf::from(dir);
        if !dir.exists() {
            return Err(anyhow!(ColugoError::Config(format!(
                "Configured working directory '{}' does not exist.",
                dir.display()
            ))));
        } else if !dir.is_dir() {
            return Err(anyhow!(ColugoError::Config(format!(
                "Configured working directory '{}' exists but is not a directory.",
                dir.display()
            ))));
        }
    }
    for key in config.subprocess.env.keys() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(anyhow!(ColugoError::Config(format!(
                "Invalid environment variable name: '{}'.",
                key
            ))));
        }
    }
    debug!("Configuration validation successful.");
    Ok(())
}
