//! # Colugo Error Types
//!
//! File: lib/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error types used throughout Colugo.
//!
//! ## Architecture
//!
//! The error system consists of three components:
//! - `SubprocessError`: the typed taxonomy returned by the subprocess core
//!   (launch failures, timeouts, pipe I/O failures). Callers match on it.
//! - `ColugoError`: configuration and argument errors raised by the
//!   application-level code.
//! - `Result<T>`: a type alias for `anyhow::Result<T>` for flexible
//!   application-level error handling.
//!
//! ## Examples
//!
//! ```rust
//! use colugo::core::error::SubprocessError;
//!
//! fn exit_code_for(err: &anyhow::Error) -> i32 {
//!     match err.downcast_ref::<SubprocessError>() {
//!         Some(SubprocessError::Launch { .. }) => 127,
//!         Some(SubprocessError::Timeout { .. }) => 124,
//!         _ => 1,
//!     }
//! }
//! ```
//!
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the subprocess core.
///
/// Every variant is reported to the immediate caller of the `Subprocess`
/// façade; nothing is retried automatically.
#[derive(Error, Debug)]
pub enum SubprocessError {
    /// An argument vector must contain at least the program name.
    #[error("Command is empty: at least a program name is required")]
    EmptyCommand,

    /// The child process image could not be created.
    #[error("Failed to launch child process `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The deadline elapsed before the child exited and the caller asked for
    /// an error instead of partial results. Output captured so far is kept.
    #[error("Command `{command}` timed out after {:.3}s", .timeout.as_secs_f64())]
    Timeout {
        command: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    /// A pipe read or write failed for a reason other than end-of-file.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Standard input of the child process is not connected")]
    StdinNotConnected,

    #[error("Subprocess has already been closed")]
    Closed,

    /// A token of captured output could not be converted to the requested type.
    #[error("Failed to parse output token '{token}': {reason}")]
    Parse { token: String, reason: String },
}

impl SubprocessError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        SubprocessError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Application-level error type for configuration and argument handling.
#[derive(Error, Debug)]
pub enum ColugoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Argument parsing error: {0}")]
    ArgumentParsing(String),
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;
