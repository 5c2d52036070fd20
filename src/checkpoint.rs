//! SQLite store of finished runs, keyed by thread id.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use finrouter_common::{Plan, StepKind};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::orchestrator::state::RunSnapshot;

/// One persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: i64,
    pub thread_id: String,
    pub request: String,
    pub plan: Plan,
    pub routing_rationale: String,
    pub fell_back: bool,
    pub outputs: BTreeMap<String, String>,
    pub processed_steps: Vec<StepKind>,
    pub final_response: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

/// Async-safe handle to the checkpoint database.
///
/// Wraps `CheckpointDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`.
#[derive(Clone)]
pub struct CheckpointHandle {
    inner: Arc<std::sync::Mutex<CheckpointDb>>,
}

impl CheckpointHandle {
    pub fn new(db: CheckpointDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&CheckpointDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("Checkpoint DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("Checkpoint DB task panicked")?
    }

    pub async fn record(&self, snapshot: RunSnapshot, error: Option<String>) -> Result<i64> {
        self.call(move |db| db.record(&snapshot, error.as_deref())).await
    }

    pub async fn latest_for_thread(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let thread_id = thread_id.to_string();
        self.call(move |db| db.latest_for_thread(&thread_id)).await
    }

    pub async fn list_for_thread(&self, thread_id: &str, limit: usize) -> Result<Vec<Checkpoint>> {
        let thread_id = thread_id.to_string();
        self.call(move |db| db.list_for_thread(&thread_id, limit)).await
    }
}

pub struct CheckpointDb {
    conn: Connection,
}

type RawRow = (i64, String, String, String, String, bool, String, String, Option<String>, Option<String>, String);

const SELECT_COLUMNS: &str = "id, thread_id, request, plan, routing_rationale, fell_back, outputs, \
                              processed_steps, final_response, error, created_at";

impl CheckpointDb {
    /// Open (or create) a database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create checkpoint directory")?;
        }
        let conn = Connection::open(path).context("Failed to open checkpoint database")?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory checkpoint database")?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS checkpoints (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    thread_id TEXT NOT NULL,
                    request TEXT NOT NULL,
                    plan TEXT NOT NULL,
                    routing_rationale TEXT NOT NULL DEFAULT '',
                    fell_back INTEGER NOT NULL DEFAULT 0,
                    outputs TEXT NOT NULL DEFAULT '{}',
                    processed_steps TEXT NOT NULL DEFAULT '[]',
                    final_response TEXT,
                    error TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_checkpoints_thread ON checkpoints(thread_id, id);
                ",
            )
            .context("Failed to run checkpoint migrations")
    }

    pub fn record(&self, snapshot: &RunSnapshot, error: Option<&str>) -> Result<i64> {
        let plan = serde_json::to_string(&snapshot.plan).context("Failed to serialize plan")?;
        let outputs = serde_json::to_string(&snapshot.outputs).context("Failed to serialize outputs")?;
        let processed =
            serde_json::to_string(&snapshot.processed_steps).context("Failed to serialize processed steps")?;
        self.conn
            .execute(
                "INSERT INTO checkpoints (thread_id, request, plan, routing_rationale, fell_back, outputs, processed_steps, final_response, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    snapshot.thread_id,
                    snapshot.request,
                    plan,
                    snapshot.routing_rationale,
                    snapshot.fell_back,
                    outputs,
                    processed,
                    snapshot.final_response,
                    error,
                ],
            )
            .context("Failed to insert checkpoint")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn latest_for_thread(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let raw: Option<RawRow> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM checkpoints WHERE thread_id = ?1 ORDER BY id DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![thread_id],
                read_row,
            )
            .optional()
            .context("Failed to query latest checkpoint")?;
        raw.map(into_checkpoint).transpose()
    }

    /// Most recent first.
    pub fn list_for_thread(&self, thread_id: &str, limit: usize) -> Result<Vec<Checkpoint>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM checkpoints WHERE thread_id = ?1 ORDER BY id DESC LIMIT ?2",
                SELECT_COLUMNS
            ))
            .context("Failed to prepare checkpoint listing")?;
        let rows = stmt
            .query_map(params![thread_id, limit as i64], read_row)
            .context("Failed to list checkpoints")?
            .collect::<rusqlite::Result<Vec<RawRow>>>()
            .context("Failed to read checkpoint row")?;
        rows.into_iter().map(into_checkpoint).collect()
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn into_checkpoint(raw: RawRow) -> Result<Checkpoint> {
    let (id, thread_id, request, plan, routing_rationale, fell_back, outputs, processed, final_response, error, created_at) =
        raw;
    Ok(Checkpoint {
        id,
        thread_id,
        request,
        plan: serde_json::from_str(&plan).context("Corrupt plan in checkpoint")?,
        routing_rationale,
        fell_back,
        outputs: serde_json::from_str(&outputs).context("Corrupt outputs in checkpoint")?,
        processed_steps: serde_json::from_str(&processed).context("Corrupt processed steps in checkpoint")?,
        final_response,
        error,
        created_at,
    })
}
