//! # Candidate Generation
//!
//! Turns a root domain and a wordlist into the deduplicated, ordered
//! sequence of candidate hostnames a run will probe. Pure transformation:
//! no network access, no side effects.

use std::collections::HashSet;

use crate::error::{Result, SubsweepError};

/// Synthesize candidate hostnames from a domain and wordlist.
///
/// Each usable word yields `<word>.<domain>`. Words are trimmed, blank
/// lines are skipped, and duplicates are dropped with the first occurrence
/// winning, so the output preserves wordlist order.
///
/// Fails with `InvalidInput` when the domain is empty or the wordlist
/// yields no usable line.
///
/// # Example
///
/// ```rust
/// use subsweep::candidates::generate;
///
/// let words = ["www", "api", "www", "  ", "mail"].map(String::from);
/// let candidates = generate("example.com", &words).unwrap();
/// assert_eq!(
///     candidates,
///     vec!["www.example.com", "api.example.com", "mail.example.com"]
/// );
/// ```
pub fn generate(domain: &str, words: &[String]) -> Result<Vec<String>> {
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(SubsweepError::invalid_input("Domain cannot be empty"));
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(words.len());
    let mut candidates = Vec::with_capacity(words.len());

    for word in words {
        let word = word.trim();
        if word.is_empty() {
            continue;
        }
        if seen.insert(word) {
            candidates.push(format!("{}.{}", word, domain));
        }
    }

    if candidates.is_empty() {
        return Err(SubsweepError::invalid_input(
            "Wordlist yields no usable candidates",
        ));
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_generates_in_dedup_order() {
        let candidates = generate("example.com", &words(&["www", "api", "www", "  ", "mail"]))
            .unwrap();
        assert_eq!(
            candidates,
            vec!["www.example.com", "api.example.com", "mail.example.com"]
        );
    }

    #[test]
    fn test_trims_words() {
        let candidates = generate("corp.test", &words(&[" api ", "api", "vpn"])).unwrap();
        assert_eq!(candidates, vec!["api.corp.test", "vpn.corp.test"]);
    }

    #[test]
    fn test_count_matches_dedup() {
        let input = words(&["a", "b", "a", "c", "b", "a"]);
        let candidates = generate("d.test", &input).unwrap();
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_empty_domain_rejected() {
        assert!(generate("", &words(&["www"])).is_err());
        assert!(generate("   ", &words(&["www"])).is_err());
    }

    #[test]
    fn test_unusable_wordlist_rejected() {
        assert!(generate("example.com", &[]).is_err());
        assert!(generate("example.com", &words(&["", "  ", "\t"])).is_err());
    }
}
