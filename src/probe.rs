//! # HTTP Probe Executor
//!
//! Determines liveness of a candidate hostname and harvests lightweight
//! metadata using a minimal-footprint cascade, short-circuiting on the
//! first usable signal:
//!
//! 1. A header-only HEAD probe against the candidate's root path, trying
//!    `https` before `http`.
//! 2. If that fails to connect or returns a status a header-only probe
//!    cannot resolve, an OPTIONS probe in the same scheme order.
//! 3. If both fail to yield a signal and GET-fallback is enabled, a
//!    size-bounded GET that reads only an initial byte window sufficient
//!    to extract a page title, discarding the remainder of the body.
//!
//! Every attempt has an independent timeout and bounded redirect
//! following. Certificate verification defaults to permissive to maximize
//! discovery; that trade-off is a configuration toggle. When a proxy
//! descriptor is supplied, every cascade step is routed through it, and a
//! proxy-path failure short-circuits the remaining steps for the
//! candidate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use serde::Serialize;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::EnumerationConfig;
use crate::constants;
use crate::error::{Result, SubsweepError};
use crate::proxy::ProxyDescriptor;

/// HTTP method used by a cascade step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    Head,
    Options,
    Get,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Head => "HEAD",
            ProbeMethod::Options => "OPTIONS",
            ProbeMethod::Get => "GET(limited)",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            ProbeMethod::Head => reqwest::Method::HEAD,
            ProbeMethod::Options => reqwest::Method::OPTIONS,
            ProbeMethod::Get => reqwest::Method::GET,
        }
    }
}

/// Classified result of a probe cascade: exactly one of these per candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeSignal {
    /// A numeric status code was received
    Status(u16),
    /// No response within the attempt's timeout budget
    Timeout,
    /// DNS failure, refused connection, or TLS failure
    ConnectionError,
    /// Failure attributable to the configured proxy path
    ProxyError,
}

/// Harvested per-candidate metadata, persisted alongside informative hits
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeMetadata {
    pub scheme: Option<String>,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub server: Option<String>,
    pub title: Option<String>,
    pub ips: Vec<String>,
    pub port: Option<u16>,
    pub final_url: Option<String>,
    pub redirected: bool,
    pub sampled_bytes: Option<usize>,
    pub detected_by: Option<String>,
    pub error: Option<String>,
}

/// Outcome of the full cascade for one candidate
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub host: String,
    pub method: Option<ProbeMethod>,
    pub signal: ProbeSignal,
    pub elapsed: Duration,
    pub metadata: ProbeMetadata,
}

impl ProbeOutcome {
    /// Whether the signal indicates a live HTTP service worth persisting.
    /// A received status is always a successful probe, but only statuses in
    /// the accepted set carry a usable liveness signal.
    pub fn is_informative(&self) -> bool {
        matches!(self.signal, ProbeSignal::Status(code) if is_informative_status(code))
    }

    /// JSON metadata blob in the shape persisted for discovered hosts
    pub fn to_metadata_json(&self) -> serde_json::Value {
        let mut value = match serde_json::to_value(&self.metadata) {
            Ok(value) => value,
            Err(_) => json!({}),
        };
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "method".to_string(),
                json!(self.method.as_ref().map(ProbeMethod::as_str)),
            );
            map.insert(
                "response_time".to_string(),
                json!(self.elapsed.as_secs_f64()),
            );
        }
        value
    }
}

/// Whether a status code indicates a live HTTP service behind the host
pub fn is_informative_status(code: u16) -> bool {
    if (200..400).contains(&code) {
        return true;
    }
    constants::probe::ACCEPTED_4XX.contains(&code)
}

/// Liveness probing seam: the run controller only depends on this trait
#[async_trait]
pub trait Prober: Send + Sync {
    /// Run the full cascade for one candidate hostname
    async fn probe(&self, host: &str) -> ProbeOutcome;
}

enum Attempt {
    Response {
        status: u16,
        meta: ProbeMetadata,
    },
    Failed(ProbeSignal, String),
}

/// Real prober issuing the HTTP cascade over reqwest
pub struct HttpProber {
    /// Client for header-only probes; never follows redirects
    plain: reqwest::Client,
    /// Client for the GET fallback; follows a bounded number of redirects
    redirecting: reqwest::Client,
    resolver: Option<TokioResolver>,
    attempt_timeout: Duration,
    get_timeout: Duration,
    dns_timeout: Duration,
    max_response_size: usize,
    get_fallback: bool,
    via_proxy: bool,
}

impl HttpProber {
    /// Build a prober from the run configuration and an optional proxy.
    ///
    /// Disabled proxy descriptors are treated as absent.
    pub fn new(config: &EnumerationConfig, proxy: Option<&ProxyDescriptor>) -> Result<Self> {
        let proxy = proxy.filter(|p| p.enabled);

        let plain = Self::client_builder(config, proxy)?
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SubsweepError::config(format!("Failed to build HTTP client: {}", e)))?;

        let redirecting = Self::client_builder(config, proxy)?
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| SubsweepError::config(format!("Failed to build HTTP client: {}", e)))?;

        let resolver = if config.dns_precheck {
            match TokioResolver::builder(TokioConnectionProvider::default()) {
                Ok(builder) => Some(builder.build()),
                Err(e) => {
                    warn!("DNS pre-check unavailable, skipping: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            plain,
            redirecting,
            resolver,
            attempt_timeout: config.attempt_timeout,
            get_timeout: config.get_timeout,
            dns_timeout: config.dns_timeout,
            max_response_size: config.max_response_size,
            get_fallback: config.get_fallback,
            via_proxy: proxy.is_some(),
        })
    }

    fn client_builder(
        config: &EnumerationConfig,
        proxy: Option<&ProxyDescriptor>,
    ) -> Result<reqwest::ClientBuilder> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.attempt_timeout)
            .danger_accept_invalid_certs(!config.verify_ssl);

        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        Ok(builder)
    }

    fn classify(&self, error: &reqwest::Error) -> (ProbeSignal, String) {
        if error.is_timeout() {
            return (ProbeSignal::Timeout, "timeout".to_string());
        }
        if self.via_proxy && error.is_connect() {
            return (ProbeSignal::ProxyError, format!("proxy_error: {}", error));
        }
        if error.is_connect() {
            return (
                ProbeSignal::ConnectionError,
                "connection_refused".to_string(),
            );
        }
        (
            ProbeSignal::ConnectionError,
            format!("http_error: {}", error),
        )
    }

    fn harvest(meta: &mut ProbeMetadata, scheme: &str, response: &reqwest::Response) {
        meta.scheme = Some(scheme.to_string());
        meta.status_code = Some(response.status().as_u16());
        meta.content_type = header_string(response, reqwest::header::CONTENT_TYPE);
        meta.content_length = header_string(response, reqwest::header::CONTENT_LENGTH);
        meta.server = header_string(response, reqwest::header::SERVER);
        if let Some(addr) = response.remote_addr() {
            let ip = addr.ip().to_string();
            if !meta.ips.contains(&ip) {
                meta.ips.push(ip);
            }
            meta.port = Some(addr.port());
        }
        if meta.port.is_none() {
            meta.port = Some(if scheme == "https" { 443 } else { 80 });
        }
    }

    /// One header-only attempt; never reads a body
    async fn attempt(&self, method: ProbeMethod, scheme: &str, host: &str) -> Attempt {
        let url = format!("{}://{}/", scheme, host);
        let request = self.plain.request(method.to_reqwest(), &url);

        match timeout(self.attempt_timeout, request.send()).await {
            Err(_) => Attempt::Failed(ProbeSignal::Timeout, "timeout".to_string()),
            Ok(Err(e)) => {
                let (signal, error) = self.classify(&e);
                Attempt::Failed(signal, error)
            }
            Ok(Ok(response)) => {
                let mut meta = ProbeMetadata::default();
                Self::harvest(&mut meta, scheme, &response);
                Attempt::Response {
                    status: response.status().as_u16(),
                    meta,
                }
            }
        }
    }

    /// Size-bounded GET: requests an initial byte range, follows a bounded
    /// number of redirects, reads at most `max_response_size` bytes of the
    /// body to extract a title, and discards the rest.
    async fn limited_get(&self, scheme: &str, host: &str) -> Attempt {
        let url = format!("{}://{}/", scheme, host);
        let request = self
            .redirecting
            .get(&url)
            .header(
                reqwest::header::RANGE,
                format!("bytes=0-{}", self.max_response_size.saturating_sub(1)),
            );

        let response = match timeout(self.get_timeout, request.send()).await {
            Err(_) => return Attempt::Failed(ProbeSignal::Timeout, "timeout".to_string()),
            Ok(Err(e)) => {
                let (signal, error) = self.classify(&e);
                return Attempt::Failed(signal, error);
            }
            Ok(Ok(response)) => response,
        };

        let mut meta = ProbeMetadata::default();
        let final_url = response.url().clone();
        Self::harvest(&mut meta, final_url.scheme(), &response);
        meta.redirected = final_url.as_str() != url;
        meta.final_url = Some(final_url.to_string());

        let status = response.status().as_u16();
        let body = self.read_bounded(response).await;
        meta.sampled_bytes = Some(body.len());
        meta.title = extract_title(&body);
        if meta.title.is_none() {
            debug!(
                url = %url,
                status = status,
                sampled = body.len(),
                "no <title> in sampled window"
            );
        }

        Attempt::Response { status, meta }
    }

    async fn read_bounded(&self, mut response: reqwest::Response) -> Vec<u8> {
        let mut body: Vec<u8> = Vec::with_capacity(self.max_response_size.min(1024));
        while body.len() < self.max_response_size {
            match timeout(self.get_timeout, response.chunk()).await {
                Ok(Ok(Some(chunk))) => {
                    let room = self.max_response_size - body.len();
                    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                // End of body, read error, or a stalled stream all end the
                // sampled window; whatever was read is still usable.
                _ => break,
            }
        }
        body
    }

    /// Re-probe an already confirmed host with the bounded GET to pick up
    /// status, title, and final URL, preserving the detecting method.
    async fn enrich(&self, host: &str, meta: &mut ProbeMetadata, detected_by: ProbeMethod) {
        let scheme = meta.scheme.clone().unwrap_or_else(|| "https".to_string());
        if let Attempt::Response {
            status,
            meta: enriched,
        } = self.limited_get(&scheme, host).await
        {
            if is_informative_status(status) {
                let ips = std::mem::take(&mut meta.ips);
                *meta = enriched;
                for ip in ips {
                    if !meta.ips.contains(&ip) {
                        meta.ips.push(ip);
                    }
                }
            }
        }
        meta.detected_by = Some(detected_by.as_str().to_string());
    }

    fn outcome(
        host: &str,
        method: Option<ProbeMethod>,
        signal: ProbeSignal,
        start: Instant,
        metadata: ProbeMetadata,
    ) -> ProbeOutcome {
        ProbeOutcome {
            host: host.to_string(),
            method,
            signal,
            elapsed: start.elapsed(),
            metadata,
        }
    }
}

fn header_string(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Extract an HTML title from the sampled body window.
///
/// Matches `<title>` case-insensitively, decodes lossily, trims, and caps
/// the result; pages whose title sits past the sampled window simply yield
/// none.
fn extract_title(body: &[u8]) -> Option<String> {
    let open = find_ascii_ci(body, b"<title>", 0)?;
    let start = open + b"<title>".len();
    let close = find_ascii_ci(body, b"</title>", start)?;
    let raw = String::from_utf8_lossy(&body[start..close]);
    let title: String = raw
        .trim()
        .chars()
        .take(constants::probe::TITLE_MAX_CHARS)
        .collect();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

fn find_ascii_ci(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < needle.len() || from > haystack.len() - needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, host: &str) -> ProbeOutcome {
        let start = Instant::now();
        let mut meta = ProbeMetadata::default();

        // Optional DNS pre-check: skip hosts that do not resolve without
        // spending HTTP attempts on them.
        if let Some(resolver) = &self.resolver {
            match timeout(self.dns_timeout, resolver.lookup_ip(host)).await {
                Ok(Ok(lookup)) => {
                    meta.ips = lookup.iter().map(|ip| ip.to_string()).collect();
                    if meta.ips.is_empty() {
                        meta.error = Some("dns: no records".to_string());
                        return Self::outcome(
                            host,
                            None,
                            ProbeSignal::ConnectionError,
                            start,
                            meta,
                        );
                    }
                }
                Ok(Err(e)) => {
                    debug!(host = %host, "dns pre-check failed: {}", e);
                    meta.error = Some("dns".to_string());
                    return Self::outcome(host, None, ProbeSignal::ConnectionError, start, meta);
                }
                Err(_) => {
                    meta.error = Some("dns: timeout".to_string());
                    return Self::outcome(host, None, ProbeSignal::ConnectionError, start, meta);
                }
            }
        }

        let mut last_status: Option<(ProbeMethod, u16, ProbeMetadata)> = None;
        let mut last_failure: Option<(ProbeSignal, String)> = None;

        for method in [ProbeMethod::Head, ProbeMethod::Options] {
            for scheme in ["https", "http"] {
                match self.attempt(method, scheme, host).await {
                    Attempt::Response { status, meta: got } => {
                        if is_informative_status(status) {
                            let mut meta = merge_ips(meta, got);
                            if self.get_fallback {
                                self.enrich(host, &mut meta, method).await;
                            } else {
                                meta.detected_by = Some(method.as_str().to_string());
                            }
                            return Self::outcome(
                                host,
                                Some(method),
                                ProbeSignal::Status(status),
                                start,
                                meta,
                            );
                        }
                        last_status = Some((method, status, got));
                    }
                    Attempt::Failed(ProbeSignal::ProxyError, error) => {
                        meta.error = Some(error);
                        return Self::outcome(
                            host,
                            Some(method),
                            ProbeSignal::ProxyError,
                            start,
                            meta,
                        );
                    }
                    Attempt::Failed(signal, error) => {
                        last_failure = Some((signal, error));
                    }
                }
            }
        }

        if self.get_fallback {
            for scheme in ["https", "http"] {
                match self.limited_get(scheme, host).await {
                    Attempt::Response { status, meta: got } => {
                        if is_informative_status(status) {
                            let mut meta = merge_ips(meta, got);
                            meta.detected_by = Some(ProbeMethod::Get.as_str().to_string());
                            return Self::outcome(
                                host,
                                Some(ProbeMethod::Get),
                                ProbeSignal::Status(status),
                                start,
                                meta,
                            );
                        }
                        last_status = Some((ProbeMethod::Get, status, got));
                    }
                    Attempt::Failed(ProbeSignal::ProxyError, error) => {
                        meta.error = Some(error);
                        return Self::outcome(
                            host,
                            Some(ProbeMethod::Get),
                            ProbeSignal::ProxyError,
                            start,
                            meta,
                        );
                    }
                    Attempt::Failed(signal, error) => {
                        last_failure = Some((signal, error));
                    }
                }
            }
        }

        // Cascade exhausted without a usable signal. A received status is
        // still a success outcome even when nothing will be persisted.
        if let Some((method, status, got)) = last_status {
            let meta = merge_ips(meta, got);
            return Self::outcome(host, Some(method), ProbeSignal::Status(status), start, meta);
        }

        let (signal, error) = last_failure
            .unwrap_or((ProbeSignal::ConnectionError, "unreachable".to_string()));
        meta.error = Some(error);
        Self::outcome(host, None, signal, start, meta)
    }
}

/// Fold pre-check IPs into attempt metadata without losing either side
fn merge_ips(pre: ProbeMetadata, mut attempt: ProbeMetadata) -> ProbeMetadata {
    for ip in pre.ips {
        if !attempt.ips.contains(&ip) {
            attempt.ips.push(ip);
        }
    }
    attempt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_informative_statuses() {
        assert!(is_informative_status(200));
        assert!(is_informative_status(301));
        assert!(is_informative_status(403));
        assert!(is_informative_status(404));
        assert!(is_informative_status(429));
        assert!(!is_informative_status(500));
        assert!(!is_informative_status(502));
        assert!(!is_informative_status(100));
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title(b"<html><head><TITLE> API portal </TITLE></head>"),
            Some("API portal".to_string())
        );
        assert_eq!(extract_title(b"<html><body>no title</body>"), None);
        assert_eq!(extract_title(b"<title></title>"), None);
        assert_eq!(extract_title(b"<title>unterminated"), None);
        assert_eq!(extract_title(b""), None);
    }

    #[test]
    fn test_extract_title_caps_length() {
        let long = format!("<title>{}</title>", "x".repeat(500));
        let title = extract_title(long.as_bytes()).unwrap();
        assert_eq!(title.len(), constants::probe::TITLE_MAX_CHARS);
    }

    #[test]
    fn test_outcome_informative() {
        let outcome = ProbeOutcome {
            host: "api.corp.test".to_string(),
            method: Some(ProbeMethod::Head),
            signal: ProbeSignal::Status(200),
            elapsed: Duration::from_millis(120),
            metadata: ProbeMetadata::default(),
        };
        assert!(outcome.is_informative());

        let outcome = ProbeOutcome {
            signal: ProbeSignal::Status(500),
            ..outcome
        };
        assert!(!outcome.is_informative());

        let outcome = ProbeOutcome {
            signal: ProbeSignal::Timeout,
            ..outcome
        };
        assert!(!outcome.is_informative());
    }

    #[test]
    fn test_metadata_json_shape() {
        let mut metadata = ProbeMetadata::default();
        metadata.status_code = Some(200);
        metadata.title = Some("API".to_string());
        let outcome = ProbeOutcome {
            host: "api.corp.test".to_string(),
            method: Some(ProbeMethod::Get),
            signal: ProbeSignal::Status(200),
            elapsed: Duration::from_millis(250),
            metadata,
        };
        let value = outcome.to_metadata_json();
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["title"], "API");
        assert_eq!(value["method"], "GET(limited)");
        assert!(value["response_time"].as_f64().unwrap() > 0.0);
    }
}
