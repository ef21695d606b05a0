//! # Run Controller
//!
//! Owns the run lifecycle: an explicit registry of run handles, the
//! `pending → running → {succeeded|failed|canceled}` state machine, and the
//! worker-pool pipeline connecting the candidate generator to the probe
//! executor and the result aggregator.
//!
//! A run is driven by a fixed pool of workers consuming candidates through
//! an atomic cursor; every worker checks the cancellation token between
//! candidates and forwards each outcome to a collector task that owns the
//! aggregator. Individual probe failures never fail a run; only
//! generator/persistence faults do, and each run performs exactly one
//! terminal transition.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::aggregate::Aggregator;
use crate::cancel::CancelToken;
use crate::candidates;
use crate::config::EnumerationConfig;
use crate::error::{Result, SubsweepError};
use crate::logbuf::LogBuffer;
use crate::probe::{ProbeOutcome, Prober};
use crate::rate_limit::ProbeRateLimiter;
use crate::store::{PersistenceGateway, RunId, RunStatus, SubdomainRow};
use crate::validation;
use crate::wordlist::WordlistProvider;

/// Read-only view of a run's current state
///
/// The log tail is an owned copy of the ring buffer; callers never see a
/// live reference.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub id: RunId,
    pub domain: String,
    pub status: RunStatus,
    pub progress_processed: u64,
    pub progress_total: u64,
    pub found: u64,
    pub error: Option<String>,
    pub log_tail: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Live state of one run, shared between the controller, the pipeline
/// task, and status polling
pub struct RunHandle {
    id: RunId,
    domain: String,
    status: AtomicU8,
    cancel: CancelToken,
    processed: Arc<AtomicU64>,
    found: Arc<AtomicU64>,
    total: u64,
    log: Arc<Mutex<LogBuffer>>,
    error: Mutex<Option<String>>,
    started_at: DateTime<Utc>,
    finished_at: Mutex<Option<DateTime<Utc>>>,
}

impl RunHandle {
    fn new(id: RunId, domain: String, total: u64, log_capacity: usize) -> Self {
        Self {
            id,
            domain,
            status: AtomicU8::new(status_to_u8(RunStatus::Pending)),
            cancel: CancelToken::new(),
            processed: Arc::new(AtomicU64::new(0)),
            found: Arc::new(AtomicU64::new(0)),
            total,
            log: Arc::new(Mutex::new(LogBuffer::new(log_capacity))),
            error: Mutex::new(None),
            started_at: Utc::now(),
            finished_at: Mutex::new(None),
        }
    }

    fn status(&self) -> RunStatus {
        status_from_u8(self.status.load(Ordering::SeqCst))
    }

    fn set_status(&self, status: RunStatus) {
        self.status.store(status_to_u8(status), Ordering::SeqCst);
    }

    fn push_log(&self, lines: &str) {
        if let Ok(mut log) = self.log.lock() {
            for line in lines.lines() {
                log.push(line);
            }
        }
    }

    fn set_error(&self, message: String) {
        if let Ok(mut error) = self.error.lock() {
            *error = Some(message);
        }
    }

    fn set_finished(&self, at: DateTime<Utc>) {
        if let Ok(mut finished) = self.finished_at.lock() {
            *finished = Some(at);
        }
    }

    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            id: self.id,
            domain: self.domain.clone(),
            status: self.status(),
            progress_processed: self.processed.load(Ordering::SeqCst),
            progress_total: self.total,
            found: self.found.load(Ordering::SeqCst),
            error: self.error.lock().ok().and_then(|e| e.clone()),
            log_tail: self
                .log
                .lock()
                .map(|log| log.snapshot())
                .unwrap_or_default(),
            started_at: self.started_at,
            finished_at: self.finished_at.lock().ok().and_then(|f| *f),
        }
    }
}

fn status_to_u8(status: RunStatus) -> u8 {
    match status {
        RunStatus::Pending => 0,
        RunStatus::Running => 1,
        RunStatus::Succeeded => 2,
        RunStatus::Failed => 3,
        RunStatus::Canceled => 4,
    }
}

fn status_from_u8(value: u8) -> RunStatus {
    match value {
        0 => RunStatus::Pending,
        1 => RunStatus::Running,
        2 => RunStatus::Succeeded,
        3 => RunStatus::Failed,
        _ => RunStatus::Canceled,
    }
}

/// Orchestrator owning every run started in this process
pub struct RunController {
    gateway: Arc<dyn PersistenceGateway>,
    prober: Arc<dyn Prober>,
    wordlists: Arc<dyn WordlistProvider>,
    config: EnumerationConfig,
    runs: DashMap<RunId, Arc<RunHandle>>,
}

impl RunController {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        prober: Arc<dyn Prober>,
        wordlists: Arc<dyn WordlistProvider>,
        config: EnumerationConfig,
    ) -> Self {
        Self {
            gateway,
            prober,
            wordlists,
            config,
            runs: DashMap::new(),
        }
    }

    /// Start an enumeration run, returning its identifier once the run is
    /// `running`.
    ///
    /// Input validation, wordlist loading, and candidate generation happen
    /// before the run exists, so `InvalidInput` surfaces synchronously and
    /// leaves nothing behind.
    pub async fn start(&self, domain: &str, wordlist_ref: Option<&str>) -> Result<RunId> {
        let domain = validation::validate_domain(domain)?;
        let reference = wordlist_ref
            .ok_or_else(|| SubsweepError::invalid_input("No wordlist configured"))?;
        let words = self.wordlists.load(reference)?;
        let candidates = candidates::generate(&domain, &words)?;
        self.config.validate()?;

        let run_id = self.gateway.create_run(&domain, Some(reference)).await?;
        let handle = Arc::new(RunHandle::new(
            run_id,
            domain,
            candidates.len() as u64,
            self.config.log_capacity,
        ));
        self.runs.insert(run_id, handle.clone());

        handle.set_status(RunStatus::Running);
        let transition = async {
            self.gateway
                .set_status(run_id, RunStatus::Running, Some(handle.started_at), None, None)
                .await?;
            self.gateway.update_progress(run_id, 0, handle.total).await
        };
        if let Err(e) = transition.await {
            self.runs.remove(&run_id);
            return Err(e);
        }

        let gateway = self.gateway.clone();
        let prober = self.prober.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            drive(gateway, prober, config, handle, candidates).await;
        });

        Ok(run_id)
    }

    /// Request cancellation of a running run. Idempotent; a no-op (and
    /// `false`) for unknown or non-running runs.
    pub fn cancel(&self, run_id: RunId) -> bool {
        match self.runs.get(&run_id) {
            Some(handle) if handle.status() == RunStatus::Running => {
                info!(run_id = run_id, "cancellation requested");
                handle.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Current status, progress, and log tail of a run
    pub fn status(&self, run_id: RunId) -> Option<RunSnapshot> {
        self.runs.get(&run_id).map(|handle| handle.snapshot())
    }

    /// Subdomains persisted for a run so far; available in any state
    pub async fn results(&self, run_id: RunId) -> Result<Vec<SubdomainRow>> {
        self.gateway.list_subdomains(run_id).await
    }
}

/// Run the pipeline to completion and perform the single terminal
/// transition.
async fn drive(
    gateway: Arc<dyn PersistenceGateway>,
    prober: Arc<dyn Prober>,
    config: EnumerationConfig,
    handle: Arc<RunHandle>,
    candidates: Vec<String>,
) {
    info!(
        run_id = handle.id,
        domain = %handle.domain,
        candidates = candidates.len(),
        "run started"
    );

    let result = pipeline(&gateway, &prober, &config, &handle, candidates).await;
    let finished = Utc::now();

    match result {
        Ok(found) => {
            if handle.cancel.is_cancelled() {
                note(&gateway, &handle, "run stopped by user").await;
                finalize(&gateway, &handle, RunStatus::Canceled, finished, None).await;
            } else {
                let summary = format!("enumeration complete: found {} live subdomains", found);
                note(&gateway, &handle, &summary).await;
                finalize(&gateway, &handle, RunStatus::Succeeded, finished, None).await;
            }
        }
        Err(e) => {
            let cause = e.to_string();
            note(&gateway, &handle, &format!("pipeline error: {}", cause)).await;
            handle.set_error(cause.clone());
            finalize(&gateway, &handle, RunStatus::Failed, finished, Some(&cause)).await;
        }
    }
}

/// Append a line to the run's ring buffer and mirror it to the gateway,
/// tolerating gateway failure during wind-down.
async fn note(gateway: &Arc<dyn PersistenceGateway>, handle: &Arc<RunHandle>, line: &str) {
    handle.push_log(line);
    if let Err(e) = gateway.append_log(handle.id, line).await {
        warn!(run_id = handle.id, "failed to mirror log line: {}", e);
    }
}

async fn finalize(
    gateway: &Arc<dyn PersistenceGateway>,
    handle: &Arc<RunHandle>,
    status: RunStatus,
    finished: DateTime<Utc>,
    error: Option<&str>,
) {
    handle.set_status(status);
    handle.set_finished(finished);

    if let Err(e) = gateway
        .set_status(handle.id, status, None, Some(finished), error)
        .await
    {
        error!(run_id = handle.id, "failed to persist final status: {}", e);
    }
    if let Err(e) = gateway
        .update_progress(
            handle.id,
            handle.processed.load(Ordering::SeqCst),
            handle.total,
        )
        .await
    {
        warn!(run_id = handle.id, "failed to persist final progress: {}", e);
    }

    info!(run_id = handle.id, status = %status, "run finished");
}

async fn pipeline(
    gateway: &Arc<dyn PersistenceGateway>,
    prober: &Arc<dyn Prober>,
    config: &EnumerationConfig,
    handle: &Arc<RunHandle>,
    candidates: Vec<String>,
) -> Result<u64> {
    let intro = [
        format!("starting http enumerator: {} candidates", candidates.len()),
        format!(
            "config: concurrency={} timeout={}ms get_fallback={} dns_precheck={}",
            config.concurrency,
            config.attempt_timeout.as_millis(),
            config.get_fallback,
            config.dns_precheck,
        ),
        "strategy: HEAD -> OPTIONS -> GET(limited)".to_string(),
    ];
    for line in &intro {
        handle.push_log(line);
    }
    gateway.append_log(handle.id, &intro.join("\n")).await?;

    let limiter = if config.enable_rate_limiting {
        Some(Arc::new(ProbeRateLimiter::new(&config.probe_rate_limit)?))
    } else {
        None
    };

    let candidates = Arc::new(candidates);
    let cursor = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::channel::<ProbeOutcome>(config.concurrency.max(1));

    let worker_count = config.concurrency.min(candidates.len()).max(1);
    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let candidates = candidates.clone();
        let cursor = cursor.clone();
        let prober = prober.clone();
        let cancel = handle.cancel.clone();
        let limiter = limiter.clone();
        let tx = tx.clone();

        workers.push(tokio::spawn(async move {
            loop {
                // Cancellation checkpoint: between candidates, never
                // mid-probe.
                if cancel.is_cancelled() {
                    break;
                }
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(host) = candidates.get(index) else {
                    break;
                };
                if let Some(limiter) = &limiter {
                    limiter.acquire().await;
                }
                let outcome = prober.probe(host).await;
                if tx.send(outcome).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let mut aggregator = Aggregator::new(
        gateway.clone(),
        handle.id,
        handle.total,
        handle.processed.clone(),
        handle.found.clone(),
        handle.log.clone(),
        config.batch_size,
        config.flush_interval,
    );
    let collector = tokio::spawn(async move {
        while let Some(outcome) = rx.recv().await {
            aggregator.record(outcome).await?;
        }
        aggregator.finish().await
    });

    // Wind-down: wait for the pool, granting in-flight probes a bounded
    // grace period once cancellation is requested.
    let overran_grace = {
        let mut wind_down = future::join_all(workers.iter_mut());
        tokio::select! {
            _ = &mut wind_down => false,
            _ = handle.cancel.cancelled() => {
                timeout(config.cancel_grace, &mut wind_down).await.is_err()
            }
        }
    };
    if overran_grace {
        warn!(
            run_id = handle.id,
            "grace period elapsed, abandoning in-flight probes"
        );
        for worker in &workers {
            worker.abort();
        }
    }

    let found = collector
        .await
        .map_err(|e| SubsweepError::pipeline(format!("collector task failed: {}", e)))??;
    Ok(found)
}
