//! SQLite-backed result store
//!
//! Maps [`Fingerprint`]s to the captured stdout of successful runs. The store
//! lives for one process: it is created in a temporary location at startup and
//! its backing file is deleted again by [`ResultStore::close`] (or on drop).
//!
//! ## Schema
//!
//! ```text
//! cache(key TEXT PRIMARY KEY, value TEXT NOT NULL)
//! ```

use crate::{Fingerprint, Result, StoreError};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cache (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

/// How long SQLite waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable key → output mapping backed by an embedded database
///
/// All access goes through a single mutex, so concurrent callers never
/// interleave upserts.
#[derive(Debug)]
pub struct ResultStore {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
}

impl ResultStore {
    /// Create a fresh store with a unique file name inside `dir`
    ///
    /// Uses the system temporary directory when `dir` is `None`.
    pub fn open_temporary(dir: Option<&Path>) -> Result<Self> {
        let dir = dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(e, &dir, "create_dir_all"))?;
        let path = dir.join(format!("memorun-cache-{}.db", Uuid::new_v4().simple()));
        Self::open(path)
    }

    /// Open (or create) a store at `path`
    ///
    /// The file at `path` is owned by the store and removed on close.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open(&path).map_err(|e| StoreError::database(e, "open"))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::database(e, "configure"))?;

        let store = Self {
            conn: Mutex::new(Some(conn)),
            path,
        };
        store.ensure_schema()?;
        tracing::debug!(path = %store.path.display(), "Opened result store");
        Ok(store)
    }

    /// Create the cache table if it does not exist yet
    ///
    /// Safe to call any number of times; existing rows are untouched.
    pub fn ensure_schema(&self) -> Result<()> {
        self.with_conn("create schema", |conn| conn.execute_batch(SCHEMA))
    }

    /// Path of the backing database file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the captured output for a fingerprint
    ///
    /// A miss is `Ok(None)`.
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<String>> {
        let key = fingerprint.as_hex();
        let value = self.with_conn("get", |conn| {
            conn.query_row(
                "SELECT value FROM cache WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })?;
        tracing::trace!(fingerprint = %fingerprint.short(), hit = value.is_some(), "Cache lookup");
        Ok(value)
    }

    /// Insert or replace the output stored for a fingerprint
    pub fn put(&self, fingerprint: &Fingerprint, output: &str) -> Result<()> {
        let key = fingerprint.as_hex();
        self.with_conn("put", |conn| {
            conn.execute(
                "INSERT INTO cache (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, output],
            )
        })?;
        tracing::debug!(
            fingerprint = %fingerprint.short(),
            bytes = output.len(),
            "Cached snippet output"
        );
        Ok(())
    }

    /// Number of cached entries
    pub fn len(&self) -> Result<usize> {
        let count = self.with_conn("count", |conn| {
            conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get::<_, i64>(0))
        })?;
        usize::try_from(count).map_err(|_| StoreError::corrupt(format!("negative row count {count}")))
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All fingerprints currently stored, in key order
    pub fn fingerprints(&self) -> Result<Vec<Fingerprint>> {
        let keys = self.with_conn("list", |conn| {
            let mut stmt = conn.prepare("SELECT key FROM cache ORDER BY key")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        keys.iter()
            .map(|key| {
                Fingerprint::from_hex(key)
                    .map_err(|_| StoreError::corrupt(format!("row with malformed key '{key}'")))
            })
            .collect()
    }

    /// Release the database handle and delete the backing file
    ///
    /// The file is removed even when closing the handle fails; the close error
    /// is returned afterwards.
    pub fn close(mut self) -> Result<()> {
        let closed = self.take_connection().map_or(Ok(()), |conn| {
            conn.close()
                .map_err(|(_, e)| StoreError::database(e, "close"))
        });
        finish_close(closed, &self.path)?;
        tracing::debug!(path = %self.path.display(), "Closed result store");
        Ok(())
    }

    fn take_connection(&mut self) -> Option<Connection> {
        self.conn
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::corrupt("result store lock poisoned"))
    }

    fn with_conn<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| StoreError::corrupt("result store used after close"))?;
        f(conn).map_err(|e| StoreError::database(e, operation))
    }
}

impl Drop for ResultStore {
    fn drop(&mut self) {
        // Already closed: the file is gone.
        let Some(conn) = self.take_connection() else {
            return;
        };
        drop(conn);
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::warn!(path = %self.path.display(), "Failed to remove result store: {e}");
        }
    }
}

fn finish_close(closed: Result<()>, path: &Path) -> Result<()> {
    let removed = remove_if_exists(path);
    closed.and(removed)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(e, path, "remove")),
    }
}
