use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::codec;
use crate::config::QueueConfig;
use crate::db;
use crate::error::{QueueError, Result};
use crate::types::Job;

/// How many lost claim races `pop`/`remove` absorb before giving up
/// with [`QueueError::ContentionExceeded`].
const MAX_CLAIM_RETRIES: u32 = 16;

/// How long a file-backed connection waits on another writer's lock
/// before surfacing a busy error.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable priority queue of crawl jobs.
///
/// One handle owns one SQLite connection and one queue table. Threads
/// share a handle through the connection mutex; separate processes open
/// their own handles on the same database file and coordinate through
/// the store's transactions. A job is delivered to at most one `pop`
/// caller: the claim deletes the row in the same transaction that reads
/// it, and a delete that affects zero rows (another consumer got there
/// first) rolls back and retries against the new queue head.
#[derive(Debug)]
pub struct JobQueue {
    conn: Mutex<Connection>,
    /// Quoted, escape-safe table identifier.
    table: String,
}

impl JobQueue {
    /// Wrap an existing connection, validating `table` and creating the
    /// schema if absent. Existing rows are untouched, so reopening a
    /// previously populated queue works.
    pub fn new(conn: Connection, table: &str) -> Result<Self> {
        db::validate_table_name(table)?;
        let index = db::quote_identifier(&format!("idx_{table}_priority"));
        let table = db::quote_identifier(table);
        db::init_queue_table(&conn, &table, &index)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table,
        })
    }

    /// Open (creating if needed) a file-backed queue at `path`.
    pub fn open<P: AsRef<Path>>(path: P, table: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::new(conn, table)
    }

    /// Open a transient in-memory queue. Contents die with the handle.
    pub fn open_in_memory(table: &str) -> Result<Self> {
        Self::new(Connection::open_in_memory()?, table)
    }

    /// Open the queue a [`QueueConfig`] describes.
    pub fn from_config(config: &QueueConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::open(path, &config.table),
            None => Self::open_in_memory(&config.table),
        }
    }

    /// Enqueue one job.
    ///
    /// A `priority` key in `args` is extracted and stored in its own
    /// column (absent means `0`); the remaining arguments plus the job
    /// name form the persisted payload. An uncoercible priority fails
    /// with [`QueueError::InvalidPriority`] and inserts nothing.
    pub fn add(&self, name: &str, mut args: Map<String, Value>) -> Result<()> {
        let priority = match args.remove("priority") {
            Some(value) => coerce_priority(value)?,
            None => 0.0,
        };
        let payload = codec::encode(&Job::new(name, args))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (priority, payload) VALUES (?1, ?2)",
                self.table
            ),
            rusqlite::params![priority, payload],
        )?;
        debug!(%name, priority, "job enqueued");
        Ok(())
    }

    /// Claim the highest-priority job, or return `None` when the queue
    /// is empty.
    ///
    /// The payload is decoded before the delete commits: a row that
    /// fails to decode stays in the queue and the error surfaces to the
    /// caller instead of destroying the job. Equal priorities are
    /// claimed in no particular order.
    pub fn pop(&self) -> Result<Option<Job>> {
        let mut conn = self.conn.lock().unwrap();
        for attempt in 0..MAX_CLAIM_RETRIES {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let head: Option<(i64, Vec<u8>)> = tx
                .query_row(
                    &format!(
                        "SELECT id, payload FROM {} ORDER BY priority DESC LIMIT 1",
                        self.table
                    ),
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((id, payload)) = head else {
                return Ok(None);
            };
            // Dropping the transaction on the error path rolls back, so
            // an undecodable row is left in place rather than destroyed.
            let job = codec::decode(&payload)?;

            let affected = tx.execute(
                &format!("DELETE FROM {} WHERE id = ?1", self.table),
                [id],
            )?;
            if affected == 0 {
                // Another consumer claimed this row first.
                tx.rollback()?;
                warn!(attempt, "queue head vanished during claim, retrying");
                continue;
            }
            tx.commit()?;
            debug!(name = %job.name, "job claimed");
            return Ok(Some(job));
        }
        warn!(retries = MAX_CLAIM_RETRIES, "claim retry budget exhausted");
        Err(QueueError::ContentionExceeded {
            retries: MAX_CLAIM_RETRIES,
        })
    }

    /// Number of pending jobs.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 =
            conn.query_row(&format!("SELECT count(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })?;
        Ok(n as u64)
    }

    /// All pending jobs, highest priority first, without removing any.
    ///
    /// A single statement drives the scan, so the result is one
    /// consistent snapshot of the committed state.
    pub fn list(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT payload FROM {} ORDER BY priority DESC",
            self.table
        ))?;
        let payloads: Vec<Vec<u8>> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        payloads.iter().map(|p| codec::decode(p)).collect()
    }

    /// Delete every job the predicate matches; returns how many went.
    ///
    /// If a targeted row vanishes mid-pass (deleted by a concurrent
    /// consumer), the pass rolls back and restarts from a fresh scan —
    /// the returned count always comes from one uncontended pass.
    pub fn remove<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&Job) -> bool,
    {
        let mut conn = self.conn.lock().unwrap();
        'rescan: for attempt in 0..MAX_CLAIM_RETRIES {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            // Collect eagerly so the statement drops before the deletes
            // below borrow the transaction.
            let rows: Vec<(i64, Vec<u8>)> = {
                let mut stmt =
                    tx.prepare(&format!("SELECT id, payload FROM {}", self.table))?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };

            let mut removed = 0usize;
            for (id, payload) in rows {
                let job = codec::decode(&payload)?;
                if !predicate(&job) {
                    continue;
                }
                let affected = tx.execute(
                    &format!("DELETE FROM {} WHERE id = ?1", self.table),
                    [id],
                )?;
                if affected == 0 {
                    tx.rollback()?;
                    warn!(attempt, "row vanished during removal, rescanning");
                    continue 'rescan;
                }
                removed += 1;
            }
            tx.commit()?;
            debug!(removed, "matching jobs removed");
            return Ok(removed);
        }
        warn!(retries = MAX_CLAIM_RETRIES, "removal retry budget exhausted");
        Err(QueueError::ContentionExceeded {
            retries: MAX_CLAIM_RETRIES,
        })
    }

    /// Delete all pending jobs unconditionally.
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {}", self.table), [])?;
        debug!("queue cleared");
        Ok(())
    }
}

/// Read a `priority` argument as a float, the way a loosely typed caller
/// contract expects: numbers as-is, booleans as 0/1, numeric strings
/// parsed. Anything else is a caller bug, reported before any insert.
fn coerce_priority(value: Value) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| QueueError::InvalidPriority(n.to_string())),
        Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| QueueError::InvalidPriority(s)),
        other => Err(QueueError::InvalidPriority(other.to_string())),
    }
}
