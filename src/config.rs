//! # Configuration Management
//!
//! This module handles command-line argument parsing and configuration
//! management for enumeration runs. Defaults come from [`crate::constants`],
//! environment variables (`SUBSWEEP_*`) overlay them, and command-line
//! flags take final precedence.
//!
//! ## Example
//!
//! ```rust
//! use subsweep::config::Config;
//!
//! let config = Config::from_args(&[
//!     "subsweep".to_string(),
//!     "example.com".to_string(),
//!     "--wordlist".to_string(),
//!     "words.txt".to_string(),
//!     "--concurrency".to_string(),
//!     "50".to_string(),
//!     "--json".to_string(),
//! ])?;
//!
//! assert_eq!(config.domain, "example.com");
//! assert_eq!(config.enumeration.concurrency, 50);
//! assert!(config.json_mode);
//! # Ok::<(), subsweep::error::SubsweepError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::error::{Result, SubsweepError};
use crate::logging::LogConfig;
use crate::rate_limit::RateLimitPolicy;
use crate::validation;

/// Tuning knobs of the enumeration engine itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// Size of the probe worker pool
    pub concurrency: usize,
    /// Timeout for one header-only probe attempt
    pub attempt_timeout: Duration,
    /// Timeout for the size-bounded GET attempt
    pub get_timeout: Duration,
    /// Timeout for the DNS pre-check
    pub dns_timeout: Duration,
    /// Maximum response-body bytes read by the GET fallback
    pub max_response_size: usize,
    /// Maximum redirects followed by the GET fallback
    pub max_redirects: usize,
    /// Verify TLS certificates (permissive by default to maximize discovery)
    pub verify_ssl: bool,
    /// Enable the size-bounded GET fallback and enrichment
    pub get_fallback: bool,
    /// Resolve candidates before spending HTTP attempts on them
    pub dns_precheck: bool,
    /// User-Agent header sent with every probe
    pub user_agent: String,
    /// Buffered rows that trigger a persistence flush
    pub batch_size: usize,
    /// Maximum time buffered rows may wait before a flush
    pub flush_interval: Duration,
    /// Grace period granted to in-flight probes after cancellation
    pub cancel_grace: Duration,
    /// Capacity of the per-run log ring buffer, in lines
    pub log_capacity: usize,
    /// Throttle probes beyond the worker pool cap
    pub enable_rate_limiting: bool,
    /// Probe rate limit applied when rate limiting is enabled
    pub probe_rate_limit: RateLimitPolicy,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            concurrency: constants::DEFAULT_CONCURRENCY,
            attempt_timeout: Duration::from_millis(constants::DEFAULT_ATTEMPT_TIMEOUT_MS),
            get_timeout: Duration::from_millis(constants::DEFAULT_GET_TIMEOUT_MS),
            dns_timeout: Duration::from_millis(constants::DEFAULT_DNS_TIMEOUT_MS),
            max_response_size: constants::probe::MAX_RESPONSE_SIZE,
            max_redirects: constants::probe::MAX_REDIRECTS,
            verify_ssl: false,
            get_fallback: true,
            dns_precheck: true,
            user_agent: constants::probe::DEFAULT_USER_AGENT.to_string(),
            batch_size: constants::aggregate::DEFAULT_BATCH_SIZE,
            flush_interval: constants::aggregate::DEFAULT_FLUSH_INTERVAL,
            cancel_grace: constants::run::DEFAULT_CANCEL_GRACE,
            log_capacity: constants::run::DEFAULT_LOG_CAPACITY,
            enable_rate_limiting: false,
            probe_rate_limit: RateLimitPolicy::per_second(
                constants::rate_limit::DEFAULT_PROBES_PER_SECOND,
            ),
        }
    }
}

impl EnumerationConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(concurrency) = std::env::var("SUBSWEEP_CONCURRENCY") {
            let parsed = concurrency
                .parse::<usize>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_CONCURRENCY value"))?;
            config.concurrency = validation::validate_concurrency(parsed)?;
        }

        if let Ok(timeout) = std::env::var("SUBSWEEP_ATTEMPT_TIMEOUT_MS") {
            let ms = timeout
                .parse::<u64>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_ATTEMPT_TIMEOUT_MS value"))?;
            config.attempt_timeout = Duration::from_millis(validation::validate_timeout_ms(ms)?);
        }

        if let Ok(timeout) = std::env::var("SUBSWEEP_GET_TIMEOUT_MS") {
            let ms = timeout
                .parse::<u64>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_GET_TIMEOUT_MS value"))?;
            config.get_timeout = Duration::from_millis(validation::validate_timeout_ms(ms)?);
        }

        if let Ok(size) = std::env::var("SUBSWEEP_MAX_RESPONSE_SIZE") {
            config.max_response_size = size
                .parse::<usize>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_MAX_RESPONSE_SIZE value"))?;
        }

        if let Ok(verify) = std::env::var("SUBSWEEP_VERIFY_SSL") {
            config.verify_ssl = verify
                .parse::<bool>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_VERIFY_SSL value"))?;
        }

        if let Ok(fallback) = std::env::var("SUBSWEEP_GET_FALLBACK") {
            config.get_fallback = fallback
                .parse::<bool>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_GET_FALLBACK value"))?;
        }

        if let Ok(precheck) = std::env::var("SUBSWEEP_DNS_PRECHECK") {
            config.dns_precheck = precheck
                .parse::<bool>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_DNS_PRECHECK value"))?;
        }

        if let Ok(agent) = std::env::var("SUBSWEEP_USER_AGENT") {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }

        if let Ok(batch) = std::env::var("SUBSWEEP_BATCH_SIZE") {
            let parsed = batch
                .parse::<usize>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_BATCH_SIZE value"))?;
            if parsed == 0 {
                return Err(SubsweepError::config("SUBSWEEP_BATCH_SIZE must be greater than 0"));
            }
            config.batch_size = parsed;
        }

        if let Ok(interval) = std::env::var("SUBSWEEP_FLUSH_INTERVAL_MS") {
            let ms = interval
                .parse::<u64>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_FLUSH_INTERVAL_MS value"))?;
            config.flush_interval = Duration::from_millis(ms);
        }

        if let Ok(grace) = std::env::var("SUBSWEEP_CANCEL_GRACE_SECS") {
            let secs = grace
                .parse::<u64>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_CANCEL_GRACE_SECS value"))?;
            config.cancel_grace = Duration::from_secs(secs);
        }

        if let Ok(capacity) = std::env::var("SUBSWEEP_LOG_CAPACITY") {
            let parsed = capacity
                .parse::<usize>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_LOG_CAPACITY value"))?;
            if parsed == 0 {
                return Err(SubsweepError::config("SUBSWEEP_LOG_CAPACITY must be greater than 0"));
            }
            config.log_capacity = parsed;
        }

        if let Ok(rate) = std::env::var("SUBSWEEP_RATE_LIMIT") {
            let ops = rate
                .parse::<u32>()
                .map_err(|_| SubsweepError::config("Invalid SUBSWEEP_RATE_LIMIT value"))?;
            if ops == 0 {
                return Err(SubsweepError::config("SUBSWEEP_RATE_LIMIT must be greater than 0"));
            }
            config.enable_rate_limiting = true;
            config.probe_rate_limit = RateLimitPolicy::per_second(ops);
        }

        Ok(config)
    }

    /// Validate the assembled configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_concurrency(self.concurrency)?;
        if self.batch_size == 0 {
            return Err(SubsweepError::config("Batch size must be greater than 0"));
        }
        if self.log_capacity == 0 {
            return Err(SubsweepError::config("Log capacity must be greater than 0"));
        }
        if self.max_response_size == 0 {
            return Err(SubsweepError::config(
                "Max response size must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Full CLI configuration: what to enumerate, where to store it, how loud
/// to be
#[derive(Debug, Clone)]
pub struct Config {
    /// Root domain candidates are derived from
    pub domain: String,
    /// Wordlist file path
    pub wordlist: Option<String>,
    /// Output results as JSON instead of the interactive display
    pub json_mode: bool,
    /// SQLite database path; in-memory persistence when absent
    pub db_path: Option<PathBuf>,
    /// Proxy URL all probe traffic is routed through
    pub proxy_url: Option<String>,
    /// Engine tuning
    pub enumeration: EnumerationConfig,
    /// Logging configuration
    pub logging: LogConfig,
}

impl Config {
    /// Create configuration from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        if args.len() < 2 {
            return Err(SubsweepError::config("Domain argument required"));
        }

        let domain = validation::validate_domain(&args[1])?;
        let json_mode = args.contains(&"--json".to_string());

        let mut enumeration = EnumerationConfig::from_env()?;

        if let Some(concurrency) = Self::flag_value(args, "--concurrency")? {
            let parsed = concurrency
                .parse::<usize>()
                .map_err(|_| SubsweepError::config(format!("Invalid concurrency: {}", concurrency)))?;
            enumeration.concurrency = validation::validate_concurrency(parsed)?;
        }

        if let Some(timeout) = Self::flag_value(args, "--timeout")? {
            let ms = timeout
                .parse::<u64>()
                .map_err(|_| SubsweepError::config(format!("Invalid timeout: {}", timeout)))?;
            enumeration.attempt_timeout =
                Duration::from_millis(validation::validate_timeout_ms(ms)?);
        }

        if args.contains(&"--no-get-fallback".to_string()) {
            enumeration.get_fallback = false;
        }
        if args.contains(&"--no-dns-precheck".to_string()) {
            enumeration.dns_precheck = false;
        }
        if args.contains(&"--verify-ssl".to_string()) {
            enumeration.verify_ssl = true;
        }

        if let Some(rate) = Self::flag_value(args, "--rate-limit")? {
            let ops = rate
                .parse::<u32>()
                .map_err(|_| SubsweepError::config(format!("Invalid rate limit: {}", rate)))?;
            if ops == 0 {
                return Err(SubsweepError::config("Rate limit must be greater than 0"));
            }
            enumeration.enable_rate_limiting = true;
            enumeration.probe_rate_limit = RateLimitPolicy::per_second(ops);
        }

        enumeration.validate()?;

        let wordlist = Self::flag_value(args, "--wordlist")?.map(str::to_string);
        let db_path = Self::flag_value(args, "--db")?.map(PathBuf::from);
        let proxy_url = Self::flag_value(args, "--proxy")?.map(str::to_string);
        let logging = LogConfig::from_env()?;

        Ok(Config {
            domain,
            wordlist,
            json_mode,
            db_path,
            proxy_url,
            enumeration,
            logging,
        })
    }

    /// Find the value following a `--flag`, erroring when the flag is
    /// present without one
    fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
        for (i, arg) in args.iter().enumerate() {
            if arg == flag {
                return match args.get(i + 1) {
                    Some(value) if !value.starts_with("--") => Ok(Some(value)),
                    _ => Err(SubsweepError::config(format!(
                        "Missing value for {}",
                        flag
                    ))),
                };
            }
        }
        Ok(None)
    }
}
