//! # Colugo Common Utilities (`common`)
//!
//! File: lib/src/common/mod.rs
//!
//! ## Overview
//!
//! This module is the organizational entry point for the shared utility
//! modules: the subprocess core and the text helpers used to post-process what
//! a child process writes.
//!
//! ## Architecture
//!
//! - **`process`**: Launching child processes, draining stdout/stderr without
//!   deadlock, deadlines and kill policy, exposed through the `Subprocess` façade.
//! - **`text`**: Trimming, splitting and wrapping of captured text.
//!
//! ## Usage
//!
//! ```rust
//! use colugo::common::{process, text};
//!
//! let tokens = text::split("a, b, c", ",", text::SplitOptions::default());
//! assert_eq!(tokens, vec!["a", "b", "c"]);
//! let streams = process::StreamConfig::default();
//! assert!(streams.stdin && streams.stdout && streams.stderr);
//! ```
//!

/// Child-process execution: launcher, pipe drainer, wait coordinator and the `Subprocess` façade.
pub mod process;
/// Text utilities for post-processing captured output (split, trim, wrap).
pub mod text;
