//! # Colugo Core Infrastructure
//!
//! File: lib/src/core/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the core infrastructure components shared by the
//! library and the command-line front end.
//!
//! ## Architecture
//!
//! - `config`: Configuration loading, merging, and validation
//! - `error`: Error types and the `Result` alias
//!
//! ```rust
//! use colugo::core::config; // For loading configuration
//! use colugo::core::error::{ColugoError, Result}; // For error handling
//! ```
//!
pub mod config;
pub mod error;
