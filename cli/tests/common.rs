//! # Colugo CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! ## Overview
//!
//! Shared helpers for the integration tests in `cli/tests/`. Each test file
//! declares `mod common;` and gets a `colugo_cmd()` that runs the compiled
//! binary inside an isolated sandbox: a temporary project directory (with a
//! `.git` marker so the project config search stops there) and a temporary
//! user config directory.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary project and user-config directories for one test.
pub struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("Failed to create sandbox directory");
        fs::create_dir_all(root.path().join("project").join(".git"))
            .expect("Failed to create sandbox project");
        fs::create_dir_all(root.path().join("config").join("colugo"))
            .expect("Failed to create sandbox config dir");
        Self { root }
    }

    pub fn project_dir(&self) -> PathBuf {
        self.root.path().join("project")
    }

    pub fn home_dir(&self) -> &Path {
        self.root.path()
    }

    /// Writes `.colugo.toml` into the project directory.
    pub fn write_project_config(&self, content: &str) {
        fs::write(self.project_dir().join(".colugo.toml"), content)
            .expect("Failed to write project config");
    }

    /// Writes the user `config.toml`.
    pub fn write_user_config(&self, content: &str) {
        fs::write(
            self.root.path().join("config").join("colugo").join("config.toml"),
            content,
        )
        .expect("Failed to write user config");
    }

    /// `colugo` command running in the project directory with the sandboxed
    /// user config.
    pub fn cmd(&self) -> Command {
        let mut cmd = colugo_cmd();
        cmd.current_dir(self.project_dir())
            .env("HOME", self.home_dir())
            .env("XDG_CONFIG_HOME", self.root.path().join("config"))
            .env_remove("RUST_LOG");
        cmd
    }
}

/// # Get Colugo Command (`colugo_cmd`)
///
/// An `assert_cmd::Command` pointing at the `colugo` binary built for this
/// test run.
///
/// ## Panics
/// Panics if the binary cannot be found via `Command::cargo_bin`.
pub fn colugo_cmd() -> Command {
    Command::cargo_bin("colugo").expect("Failed to find colugo binary for testing")
}
