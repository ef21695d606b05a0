//! # Persistence Gateway
//!
//! Data model and storage interface for runs and discovered subdomains.
//! The enumeration core only talks to the [`PersistenceGateway`] trait;
//! [`MemoryGateway`] backs tests and one-shot CLI invocations, while
//! [`sqlite::SqliteGateway`] provides durable storage.
//!
//! Gateways must tolerate concurrent, append-only calls: workers of one run
//! never update the same subdomain row in place, and `insert_subdomains` is
//! idempotent on (run_id, host).

pub mod sqlite;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, SubsweepError};

/// Identifier of one enumeration run
pub type RunId = u64;

/// Lifecycle state of a run
///
/// Transitions are monotone: `pending → running → {succeeded|failed|
/// canceled}`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Canceled => "canceled",
        }
    }

    /// Whether this state permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Canceled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = SubsweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            "canceled" => Ok(RunStatus::Canceled),
            other => Err(SubsweepError::persistence(format!(
                "Unknown run status: {}",
                other
            ))),
        }
    }
}

/// Stored state of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: RunId,
    pub domain: String,
    pub status: RunStatus,
    pub wordlist_ref: Option<String>,
    pub error: Option<String>,
    pub log_snippet: String,
    pub progress_processed: u64,
    pub progress_total: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One discovered subdomain as persisted for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainRow {
    pub host: String,
    pub source: String,
    pub discovered_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// Storage interface consumed by the enumeration core
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Create a run in `pending` state, returning its identifier
    async fn create_run(&self, domain: &str, wordlist_ref: Option<&str>) -> Result<RunId>;

    /// Append one or more lines (separated by `\n`) to the run's log tail
    async fn append_log(&self, run_id: RunId, line: &str) -> Result<()>;

    /// Record the latest progress counters
    async fn update_progress(&self, run_id: RunId, processed: u64, total: u64) -> Result<()>;

    /// Transition the run's status, optionally stamping timestamps and an
    /// error summary. Passing `None` leaves the existing value untouched.
    async fn set_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
        error: Option<&str>,
    ) -> Result<()>;

    /// Insert discovered subdomains, ignoring rows whose (run_id, host)
    /// already exists. Returns the number of rows actually inserted.
    async fn insert_subdomains(&self, run_id: RunId, rows: &[SubdomainRow]) -> Result<u64>;

    /// Fetch a run's stored state
    async fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>>;

    /// All subdomains persisted for a run, in insertion order
    async fn list_subdomains(&self, run_id: RunId) -> Result<Vec<SubdomainRow>>;
}

/// Append `line` to a bounded log string, keeping only the tail when the
/// combined content exceeds the gateway log limit.
pub(crate) fn append_bounded_log(log: &str, line: &str) -> String {
    let combined = if log.is_empty() {
        line.to_string()
    } else {
        format!("{}\n{}", log, line)
    };
    let combined = combined.trim().to_string();
    let limit = constants::run::GATEWAY_LOG_LIMIT;
    if combined.len() <= limit {
        return combined;
    }
    // Cut from the front at a char boundary so the newest content survives.
    let mut start = combined.len() - limit;
    while !combined.is_char_boundary(start) {
        start += 1;
    }
    combined[start..].to_string()
}

struct MemoryRun {
    record: RunRecord,
    hosts: HashSet<String>,
    rows: Vec<SubdomainRow>,
}

/// In-memory gateway backed by a concurrent map
///
/// Used by tests and by CLI invocations that do not ask for a database
/// file. Behavior matches the durable gateway, including (run_id, host)
/// idempotence.
pub struct MemoryGateway {
    runs: DashMap<RunId, MemoryRun>,
    next_id: AtomicU64,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            runs: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn with_run<T>(&self, run_id: RunId, f: impl FnOnce(&mut MemoryRun) -> T) -> Result<T> {
        match self.runs.get_mut(&run_id) {
            Some(mut entry) => Ok(f(&mut entry)),
            None => Err(SubsweepError::persistence(format!(
                "Run {} not found",
                run_id
            ))),
        }
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn create_run(&self, domain: &str, wordlist_ref: Option<&str>) -> Result<RunId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = RunRecord {
            id,
            domain: domain.to_string(),
            status: RunStatus::Pending,
            wordlist_ref: wordlist_ref.map(str::to_string),
            error: None,
            log_snippet: String::new(),
            progress_processed: 0,
            progress_total: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        self.runs.insert(
            id,
            MemoryRun {
                record,
                hosts: HashSet::new(),
                rows: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn append_log(&self, run_id: RunId, line: &str) -> Result<()> {
        self.with_run(run_id, |run| {
            run.record.log_snippet = append_bounded_log(&run.record.log_snippet, line);
        })
    }

    async fn update_progress(&self, run_id: RunId, processed: u64, total: u64) -> Result<()> {
        self.with_run(run_id, |run| {
            run.record.progress_processed = processed;
            run.record.progress_total = total;
        })
    }

    async fn set_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
        error: Option<&str>,
    ) -> Result<()> {
        self.with_run(run_id, |run| {
            run.record.status = status;
            if started_at.is_some() {
                run.record.started_at = started_at;
            }
            if finished_at.is_some() {
                run.record.finished_at = finished_at;
            }
            if let Some(error) = error {
                run.record.error = Some(error.to_string());
            }
        })
    }

    async fn insert_subdomains(&self, run_id: RunId, rows: &[SubdomainRow]) -> Result<u64> {
        self.with_run(run_id, |run| {
            let mut inserted = 0;
            for row in rows {
                if run.hosts.insert(row.host.clone()) {
                    run.rows.push(row.clone());
                    inserted += 1;
                }
            }
            inserted
        })
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>> {
        Ok(self.runs.get(&run_id).map(|entry| entry.record.clone()))
    }

    async fn list_subdomains(&self, run_id: RunId) -> Result<Vec<SubdomainRow>> {
        Ok(self
            .runs
            .get(&run_id)
            .map(|entry| entry.rows.clone())
            .unwrap_or_default())
    }
}
