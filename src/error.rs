//! # Error Handling
//!
//! This module provides comprehensive error handling for subsweep operations
//! with custom error types that cover various failure scenarios. It uses the
//! `thiserror` crate for clean error definitions and improved error messages.
//!
//! Two failure classes deliberately do NOT appear here: per-candidate probe
//! failures (timeouts, refused connections, proxy faults) are ordinary data
//! carried by [`crate::probe::ProbeOutcome`], and cancellation is a state
//! transition, not an error. Only input validation, configuration, and
//! run-level pipeline/persistence faults are errors.
//!
//! ## Example
//!
//! ```rust
//! use subsweep::error::{SubsweepError, Result};
//!
//! fn validate_concurrency(workers: usize) -> Result<()> {
//!     if workers == 0 {
//!         return Err(SubsweepError::invalid_input("concurrency cannot be 0"));
//!     }
//!     Ok(())
//! }
//!
//! match validate_concurrency(0) {
//!     Ok(_) => println!("Concurrency is valid"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

use std::io;

/// Custom error types for subsweep operations
///
/// This enum represents all possible error conditions that can occur during
/// enumeration runs, providing specific error types for different scenarios
/// like invalid input, configuration problems, and pipeline-level faults.
#[derive(Debug, thiserror::Error)]
pub enum SubsweepError {
    /// Malformed domain or empty/unreadable wordlist; surfaced synchronously
    /// before a run is created.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Run-level fault in the generator/aggregator path. Transitions the
    /// affected run to `failed`; never caused by individual probe failures.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Timeout error: operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

impl SubsweepError {
    /// Create a new invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new pipeline error
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    /// Create a new persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }
}

/// Result type alias for subsweep operations
pub type Result<T> = std::result::Result<T, SubsweepError>;
