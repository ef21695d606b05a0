//! # Configuration Constants
//!
//! This module contains all configuration constants used throughout subsweep,
//! including default timeouts, probe cascade parameters, and operational
//! limits. Values mirror the defaults the tool has always shipped with; all
//! of them can be overridden through [`crate::config`].

use std::time::Duration;

/// Default number of concurrent probe workers per run
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Upper bound on the configurable worker count
pub const MAX_CONCURRENCY: usize = 1024;

/// Default timeout for a single HEAD/OPTIONS probe attempt in milliseconds
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 3_000;

/// Default timeout for the size-bounded GET attempt in milliseconds
///
/// Slightly longer than the header-only attempts since it also reads an
/// initial body window.
pub const DEFAULT_GET_TIMEOUT_MS: u64 = 4_000;

/// Default timeout for the DNS pre-check in milliseconds
pub const DEFAULT_DNS_TIMEOUT_MS: u64 = 2_000;

/// Probe cascade parameters
pub mod probe {
    /// Maximum number of response-body bytes read by the GET fallback.
    /// Enough to reach the `<title>` element of ordinary pages; everything
    /// past this window is discarded unread.
    pub const MAX_RESPONSE_SIZE: usize = 4_096;

    /// Maximum redirects followed by the GET fallback. Header-only probes
    /// never follow redirects.
    pub const MAX_REDIRECTS: usize = 4;

    /// Maximum characters retained from an extracted HTML title
    pub const TITLE_MAX_CHARS: usize = 100;

    /// Default User-Agent header sent with every probe
    pub const DEFAULT_USER_AGENT: &str = "subsweep/0.1 (HTTP subdomain enumerator)";

    /// 4xx status codes that still indicate a live HTTP service behind the
    /// candidate host. 2xx and 3xx are always accepted; 5xx never is.
    pub const ACCEPTED_4XX: &[u16] = &[
        400, 401, 403, 404, 405, 406, 407, 408, 409, 410, 411, 412, 413, 414, 415, 416, 417, 418,
        421, 422, 423, 424, 425, 426, 428, 429, 431, 451,
    ];
}

/// Result aggregation parameters
pub mod aggregate {
    use super::Duration;

    /// Number of buffered subdomain rows that triggers a persistence flush
    pub const DEFAULT_BATCH_SIZE: usize = 200;

    /// Maximum time buffered rows may wait before a flush
    pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
}

/// Run lifecycle parameters
pub mod run {
    use super::Duration;

    /// Grace period granted to in-flight probes after cancellation
    pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

    /// Default capacity of the per-run log ring buffer, in lines
    pub const DEFAULT_LOG_CAPACITY: usize = 256;

    /// Interval at which workers re-check the cancellation flag while idle
    pub const CANCEL_POLL_MS: u64 = 50;

    /// Maximum characters of run log retained by the persistence gateway;
    /// older content is dropped from the front
    pub const GATEWAY_LOG_LIMIT: usize = 4_000;
}

/// Input validation limits
pub mod validation {
    /// Maximum root domain length (RFC 1035 name limit)
    pub const MAX_DOMAIN_LENGTH: usize = 253;

    /// Maximum length of a single domain label
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Bounds for configurable probe timeouts in milliseconds
    pub const MIN_TIMEOUT_MS: u64 = 50;
    pub const MAX_TIMEOUT_MS: u64 = 300_000;
}

/// Probe rate limiting defaults (disabled unless configured)
pub mod rate_limit {
    /// Default probes-per-second quota applied when rate limiting is enabled
    /// without an explicit rate
    pub const DEFAULT_PROBES_PER_SECOND: u32 = 50;
}

/// CLI progress display settings
pub mod progress {
    /// Default progress bar width
    pub const DEFAULT_WIDTH: usize = 40;

    /// Status polling interval in milliseconds
    pub const POLL_INTERVAL_MS: u64 = 200;
}
