//! # SQLite Persistence Gateway
//!
//! Durable storage for runs and discovered subdomains. The schema mirrors
//! the tool's long-standing layout: a `subdomain_runs` table owning
//! lifecycle state and the bounded log snippet, and a `subdomains` table
//! with a UNIQUE(run_id, host) constraint realizing insert idempotence via
//! `INSERT OR IGNORE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

use super::{
    append_bounded_log, PersistenceGateway, RunId, RunRecord, RunStatus, SubdomainRow,
};
use crate::error::Result;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS subdomain_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        wordlist_ref TEXT,
        error_message TEXT,
        log_snippet TEXT NOT NULL DEFAULT '',
        progress_processed INTEGER NOT NULL DEFAULT 0,
        progress_total INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        started_at TEXT,
        finished_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS subdomains (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL REFERENCES subdomain_runs(id),
        host TEXT NOT NULL,
        source TEXT,
        metadata TEXT,
        created_at TEXT NOT NULL,
        UNIQUE(run_id, host)
    )",
    "CREATE INDEX IF NOT EXISTS idx_subdomains_run_id ON subdomains(run_id)",
];

/// Gateway writing through a SQLite connection pool
pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    /// Connect to a SQLite database URL and ensure the schema exists
    pub async fn connect(url: &str) -> Result<Self> {
        // A single connection keeps `sqlite::memory:` coherent and matches
        // the append-only write pattern of the enumeration core.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Open (creating if necessary) a database file on disk
    pub async fn open_file(path: &Path) -> Result<Self> {
        Self::connect(&format!("sqlite://{}?mode=rwc", path.display())).await
    }

    fn row_to_record(row: &SqliteRow) -> Result<RunRecord> {
        let status: String = row.try_get("status")?;
        Ok(RunRecord {
            id: row.try_get::<i64, _>("id")? as RunId,
            domain: row.try_get("domain")?,
            status: status.parse()?,
            wordlist_ref: row.try_get("wordlist_ref")?,
            error: row.try_get("error_message")?,
            log_snippet: row.try_get("log_snippet")?,
            progress_processed: row.try_get::<i64, _>("progress_processed")? as u64,
            progress_total: row.try_get::<i64, _>("progress_total")? as u64,
            created_at: parse_ts(row.try_get("created_at")?).unwrap_or_else(Utc::now),
            started_at: row
                .try_get::<Option<String>, _>("started_at")?
                .and_then(|ts| parse_ts(ts)),
            finished_at: row
                .try_get::<Option<String>, _>("finished_at")?
                .and_then(|ts| parse_ts(ts)),
        })
    }
}

fn parse_ts(raw: String) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn create_run(&self, domain: &str, wordlist_ref: Option<&str>) -> Result<RunId> {
        let result = sqlx::query(
            "INSERT INTO subdomain_runs (domain, status, wordlist_ref, created_at)
             VALUES (?, 'pending', ?, ?)",
        )
        .bind(domain)
        .bind(wordlist_ref)
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid() as RunId)
    }

    async fn append_log(&self, run_id: RunId, line: &str) -> Result<()> {
        let current: Option<String> =
            sqlx::query_scalar("SELECT log_snippet FROM subdomain_runs WHERE id = ?")
                .bind(run_id as i64)
                .fetch_optional(&self.pool)
                .await?;

        let updated = append_bounded_log(current.as_deref().unwrap_or(""), line);
        sqlx::query("UPDATE subdomain_runs SET log_snippet = ? WHERE id = ?")
            .bind(updated)
            .bind(run_id as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_progress(&self, run_id: RunId, processed: u64, total: u64) -> Result<()> {
        sqlx::query(
            "UPDATE subdomain_runs SET progress_processed = ?, progress_total = ? WHERE id = ?",
        )
        .bind(processed as i64)
        .bind(total as i64)
        .bind(run_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE subdomain_runs
             SET status = ?,
                 started_at = COALESCE(?, started_at),
                 finished_at = COALESCE(?, finished_at),
                 error_message = COALESCE(?, error_message)
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(started_at.map(format_ts))
        .bind(finished_at.map(format_ts))
        .bind(error)
        .bind(run_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_subdomains(&self, run_id: RunId, rows: &[SubdomainRow]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for row in rows {
            let metadata = serde_json::to_string(&row.metadata).unwrap_or_default();
            let result = sqlx::query(
                "INSERT OR IGNORE INTO subdomains (run_id, host, source, metadata, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(run_id as i64)
            .bind(&row.host)
            .bind(&row.source)
            .bind(metadata)
            .bind(format_ts(row.discovered_at))
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<RunRecord>> {
        let row = sqlx::query("SELECT * FROM subdomain_runs WHERE id = ?")
            .bind(run_id as i64)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_subdomains(&self, run_id: RunId) -> Result<Vec<SubdomainRow>> {
        let rows = sqlx::query(
            "SELECT host, source, metadata, created_at FROM subdomains
             WHERE run_id = ? ORDER BY id",
        )
        .bind(run_id as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut subdomains = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata: Option<String> = row.try_get("metadata")?;
            subdomains.push(SubdomainRow {
                host: row.try_get("host")?,
                source: row
                    .try_get::<Option<String>, _>("source")?
                    .unwrap_or_default(),
                discovered_at: parse_ts(row.try_get("created_at")?).unwrap_or_else(Utc::now),
                metadata: metadata
                    .and_then(|raw| serde_json::from_str(&raw).ok())
                    .unwrap_or(serde_json::Value::Null),
            });
        }
        Ok(subdomains)
    }
}
