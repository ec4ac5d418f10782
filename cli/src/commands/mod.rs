//! # Colugo Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the top-level commands of the Colugo CLI so that
//! `main.rs` can route to them.
//!
//! ## Command Groups
//!
//! - `run`: launch a program, capture its output, enforce a deadline.
//! - `config`: inspect the effective configuration.
//!
//! Each command defines its own arguments structure and handler function.
//!

/// Implements `colugo run` (execute a program with captured output and a deadline).
pub mod run;
/// Command group for configuration inspection. Includes `show`.
pub mod config;
