//! # Result Aggregation
//!
//! Consumes probe outcomes in completion order (never candidate order),
//! deduplicates hosts per run, and batches informative hits for
//! persistence. Pure failures still advance the progress counters; they
//! are simply never written as subdomains. A final flush on run completion
//! guarantees no buffered outcome is lost.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::Result;
use crate::logbuf::LogBuffer;
use crate::probe::ProbeOutcome;
use crate::store::{PersistenceGateway, RunId, SubdomainRow};
use crate::utils;

/// Source tag stamped on every persisted subdomain
pub const SOURCE_TAG: &str = "http_enumerator";

/// Per-run aggregator owned by the collector task
pub struct Aggregator {
    gateway: Arc<dyn PersistenceGateway>,
    run_id: RunId,
    seen: HashSet<String>,
    buffer: Vec<SubdomainRow>,
    pending_log: Vec<String>,
    processed: Arc<AtomicU64>,
    found: Arc<AtomicU64>,
    total: u64,
    log: Arc<Mutex<LogBuffer>>,
    batch_size: usize,
    flush_interval: Duration,
    last_flush: Instant,
}

impl Aggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        run_id: RunId,
        total: u64,
        processed: Arc<AtomicU64>,
        found: Arc<AtomicU64>,
        log: Arc<Mutex<LogBuffer>>,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            run_id,
            seen: HashSet::new(),
            buffer: Vec::new(),
            pending_log: Vec::new(),
            processed,
            found,
            total,
            log,
            batch_size: batch_size.max(1),
            flush_interval,
            last_flush: Instant::now(),
        }
    }

    /// Record one outcome: advance progress, dedup, buffer informative
    /// hits, and flush when the batch or interval trigger fires.
    pub async fn record(&mut self, outcome: ProbeOutcome) -> Result<()> {
        self.processed.fetch_add(1, Ordering::SeqCst);

        if outcome.is_informative() && self.seen.insert(outcome.host.clone()) {
            self.found.fetch_add(1, Ordering::SeqCst);

            let line = describe(&outcome);
            if let Ok(mut log) = self.log.lock() {
                log.push(line.clone());
            }
            self.pending_log.push(line);

            self.buffer.push(SubdomainRow {
                host: outcome.host.clone(),
                source: SOURCE_TAG.to_string(),
                discovered_at: Utc::now(),
                metadata: outcome.to_metadata_json(),
            });
        }

        if self.buffer.len() >= self.batch_size || self.last_flush.elapsed() >= self.flush_interval
        {
            self.flush().await?;
        }

        Ok(())
    }

    /// Write buffered rows and pending log lines through the gateway and
    /// mirror the progress counters.
    pub async fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            let rows = std::mem::take(&mut self.buffer);
            self.gateway.insert_subdomains(self.run_id, &rows).await?;
        }

        if !self.pending_log.is_empty() {
            let lines = std::mem::take(&mut self.pending_log).join("\n");
            self.gateway.append_log(self.run_id, &lines).await?;
        }

        let processed = self.processed.load(Ordering::SeqCst);
        self.gateway
            .update_progress(self.run_id, processed, self.total)
            .await?;

        self.last_flush = Instant::now();
        Ok(())
    }

    /// Final flush on run completion; returns the number of hosts found
    pub async fn finish(mut self) -> Result<u64> {
        self.flush().await?;
        Ok(self.found.load(Ordering::SeqCst))
    }
}

/// One log line per discovered host, in the run log format
fn describe(outcome: &ProbeOutcome) -> String {
    let meta = &outcome.metadata;
    let mut line = format!("hit {}", outcome.host);

    let method = meta
        .detected_by
        .clone()
        .or_else(|| outcome.method.map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| "?".to_string());
    let scheme = meta.scheme.as_deref().unwrap_or("?");
    let status = meta
        .status_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "?".to_string());
    line.push_str(&format!(" [{} {} {}]", method, scheme, status));

    line.push_str(&format!(" ({:.2}s)", outcome.elapsed.as_secs_f64()));

    if !meta.ips.is_empty() {
        let mut ips = meta.ips.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        if meta.ips.len() > 3 {
            ips.push_str(&format!(" +{}", meta.ips.len() - 3));
        }
        line.push_str(&format!(" IP:[{}]", ips));
    }
    if let Some(server) = &meta.server {
        line.push_str(&format!(" - {}", utils::safe_snippet(server, 30)));
    }
    if let Some(title) = &meta.title {
        line.push_str(&format!(" - {}", utils::safe_snippet(title, 50)));
    }

    line
}
