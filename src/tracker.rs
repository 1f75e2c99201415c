//! Persistent last-update tracker.
//!
//! A single SQLite row survives restarts so the loop never runs an update
//! too soon after a crash and never loses track of staleness. The write is
//! guarded against going backwards: a slow in-flight attempt can never
//! overwrite a newer success.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};

use crate::error::{Result, UpdaterError};

/// Single-table schema: one named scalar per row.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS update_ts (\n\
                      name TEXT PRIMARY KEY,\n\
                      value REAL NOT NULL DEFAULT 0)";

/// The one record this crate maintains.
const RECORD_NAME: &str = "last";

/// Durable store of the last successful update time (UTC epoch seconds).
///
/// Thread-safe via an internal `Mutex<Connection>`; there is only one
/// writer by design, the mutex just keeps the type `Sync` for the async
/// loop that owns it.
pub struct UpdateTracker {
    conn: Mutex<Option<Connection>>,
}

impl UpdateTracker {
    /// Open (or create) the tracker database at `path`.
    ///
    /// On creation the `"last"` record is initialized to `0.0` (never run).
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| UpdaterError::Storage(format!("cannot open {}: {e}", path.display())))?;
        conn.execute(SCHEMA, [])
            .map_err(|e| UpdaterError::Storage(format!("cannot apply schema: {e}")))?;
        conn.execute(
            "INSERT OR IGNORE INTO update_ts (name, value) VALUES (?1, 0)",
            params![RECORD_NAME],
        )
        .map_err(|e| UpdaterError::Storage(format!("cannot seed record: {e}")))?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| UpdaterError::Storage("tracker mutex poisoned".to_owned()))
    }

    /// The last successful update time, `0.0` if none has been recorded.
    pub fn last_update(&self) -> Result<f64> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(UpdaterError::Closed)?;
        conn.query_row(
            "SELECT value FROM update_ts WHERE name = ?1",
            params![RECORD_NAME],
            |row| row.get(0),
        )
        .map_err(|e| UpdaterError::Storage(format!("cannot read last update: {e}")))
    }

    /// Durably record `ts` as the last update time.
    ///
    /// No-op unless `ts` is strictly greater than the stored value, so the
    /// record is monotonically non-decreasing. The single-statement UPDATE
    /// is atomic under crashes: a reader sees either the old value or the
    /// new one.
    pub fn record_update(&self, ts: f64) -> Result<()> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(UpdaterError::Closed)?;
        conn.execute(
            "UPDATE update_ts SET value = ?1 WHERE name = ?2 AND value < ?1",
            params![ts, RECORD_NAME],
        )
        .map_err(|e| UpdaterError::Storage(format!("cannot record update: {e}")))?;
        Ok(())
    }

    /// Release the database. Further use fails with [`UpdaterError::Closed`].
    pub fn close(&self) {
        if let Ok(mut guard) = self.conn.lock() {
            *guard = None;
        }
    }

    /// Whether the tracker has been closed.
    pub fn is_closed(&self) -> bool {
        self.conn.lock().map(|g| g.is_none()).unwrap_or(true)
    }
}
