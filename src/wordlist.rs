//! # Wordlist Provider
//!
//! Loads the wordlist a run consumes. The core treats wordlists as given:
//! no mutation, no permutation, no format validation beyond line
//! normalization. Blank lines and `#` comment lines are skipped.

use std::fs;
use std::path::Path;

use crate::error::{Result, SubsweepError};

/// Source of wordlist lines for enumeration runs
pub trait WordlistProvider: Send + Sync {
    /// Load the wordlist identified by `reference` as an ordered sequence
    /// of non-empty, trimmed lines.
    fn load(&self, reference: &str) -> Result<Vec<String>>;
}

/// Provider reading wordlists from files on disk
///
/// The reference is a filesystem path. Content is decoded as UTF-8 with
/// invalid sequences replaced, matching how wordlists collected from mixed
/// sources tend to arrive.
#[derive(Debug, Default, Clone)]
pub struct FileWordlistProvider;

impl FileWordlistProvider {
    pub fn new() -> Self {
        Self
    }
}

impl WordlistProvider for FileWordlistProvider {
    fn load(&self, reference: &str) -> Result<Vec<String>> {
        let path = Path::new(reference);
        let raw = fs::read(path).map_err(|e| {
            SubsweepError::invalid_input(format!("Cannot read wordlist {}: {}", reference, e))
        })?;
        let content = String::from_utf8_lossy(&raw);

        let lines: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        if lines.is_empty() {
            return Err(SubsweepError::invalid_input(format!(
                "Wordlist {} is empty",
                reference
            )));
        }

        Ok(lines)
    }
}
