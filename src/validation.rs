//! # Input Validation Module
//!
//! This module provides input validation functions for subsweep, ensuring
//! that user-supplied domains and tuning knobs are sanitized before being
//! handed to the enumeration pipeline.

use crate::constants;
use crate::error::{Result, SubsweepError};

/// Validates and normalizes a root domain.
///
/// The domain is trimmed and lower-cased; the returned string is the form
/// every candidate hostname is derived from.
pub fn validate_domain(domain: &str) -> Result<String> {
    let normalized = domain.trim().to_ascii_lowercase();

    if normalized.is_empty() {
        return Err(SubsweepError::invalid_input("Domain cannot be empty"));
    }

    if normalized.len() > constants::validation::MAX_DOMAIN_LENGTH {
        return Err(SubsweepError::invalid_input("Domain too long"));
    }

    if normalized.contains(char::is_whitespace) || normalized.contains("://") {
        return Err(SubsweepError::invalid_input(format!(
            "Domain contains invalid characters: {}",
            normalized
        )));
    }

    if normalized.starts_with('.') || normalized.ends_with('.') || normalized.contains("..") {
        return Err(SubsweepError::invalid_input(format!(
            "Malformed domain: {}",
            normalized
        )));
    }

    for label in normalized.split('.') {
        if label.len() > constants::validation::MAX_LABEL_LENGTH {
            return Err(SubsweepError::invalid_input(format!(
                "Domain label too long: {}",
                label
            )));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SubsweepError::invalid_input(format!(
                "Domain label contains invalid characters: {}",
                label
            )));
        }
    }

    Ok(normalized)
}

/// Validates the worker pool size
pub fn validate_concurrency(concurrency: usize) -> Result<usize> {
    if concurrency == 0 {
        return Err(SubsweepError::config("Concurrency must be greater than 0"));
    }

    if concurrency > constants::MAX_CONCURRENCY {
        return Err(SubsweepError::config(format!(
            "Concurrency exceeds maximum of {}",
            constants::MAX_CONCURRENCY
        )));
    }

    Ok(concurrency)
}

/// Validates a configurable timeout in milliseconds
pub fn validate_timeout_ms(timeout_ms: u64) -> Result<u64> {
    if timeout_ms < constants::validation::MIN_TIMEOUT_MS {
        return Err(SubsweepError::config(format!(
            "Timeout must be at least {}ms",
            constants::validation::MIN_TIMEOUT_MS
        )));
    }

    if timeout_ms > constants::validation::MAX_TIMEOUT_MS {
        return Err(SubsweepError::config(format!(
            "Timeout cannot exceed {}ms",
            constants::validation::MAX_TIMEOUT_MS
        )));
    }

    Ok(timeout_ms)
}
