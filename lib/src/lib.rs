//! # Colugo Library Root
//!
//! File: lib/src/lib.rs
//!
//! ## Overview
//!
//! Colugo runs external programs reliably: it launches a child process from an
//! explicit argument vector, feeds it optional input, drains stdout and stderr
//! independently (so a chatty child can never deadlock against a full pipe),
//! enforces an optional deadline, and reports captured output together with a
//! well-defined exit status.
//!
//! ## Architecture
//!
//! - `common::process`: the subprocess core (`Subprocess`, launcher, drainer,
//!   wait coordinator).
//! - `common::text`: string splitting, trimming and wrapping used to
//!   post-process captured output.
//! - `core::config`: layered TOML configuration (project, user, defaults).
//! - `core::error`: the error taxonomy and the `Result` alias.
//!
//! ## Usage
//!
//! ```no_run
//! use colugo::{Argv, Subprocess, WaitOptions};
//!
//! # async fn example() -> Result<(), colugo::SubprocessError> {
//! let mut child = Subprocess::spawn(Argv::new(["cat"])?, Default::default())?;
//! let result = child
//!     .communicate(Some("the quick brown fox"), &WaitOptions::default())
//!     .await?;
//! assert_eq!(result.stdout, "the quick brown fox");
//! # Ok(())
//! # }
//! ```
//!
pub mod common;
pub mod core;

pub use crate::common::process::{
    Argv, Communication, ExitStatus, LaunchOptions, ProcessState, StreamConfig, Subprocess,
    WaitOptions, RETURNCODE_UNDETERMINED,
};
pub use crate::core::error::{ColugoError, SubprocessError};
