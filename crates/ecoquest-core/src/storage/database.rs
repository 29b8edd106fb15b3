//! SQLite database handle.
//!
//! One [`Database`] owns one connection behind a mutex, so a single handle
//! can be shared between threads. Every write runs in an `IMMEDIATE`
//! transaction with a busy timeout, which keeps several handles (or
//! processes) on the same file serialized as well.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::{data_dir, migrations, Config};
use crate::error::{CoreError, DatabaseError, Result};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database configured in `config`, under the data directory.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.database_path(&data_dir()?);
        Self::open_at(&path, Duration::from_millis(config.storage.busy_timeout_ms))
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(path = %path.display(), %mode, "WAL journal mode unavailable");
        }
        Self::init(conn)
    }

    /// Open an in-memory database. Used by tests and throwaway runs.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Poisoned))
    }

    /// Run read-only work against the connection.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run several reads against one snapshot.
    ///
    /// Uses a `DEFERRED` transaction: in WAL mode every statement inside it
    /// sees the database as of the first read, even if another handle
    /// commits in between.
    pub(crate) fn snapshot<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let out = f(&tx)?;
        tx.finish()?;
        Ok(out)
    }

    /// Run `f` inside an `IMMEDIATE` transaction.
    ///
    /// Commits when `f` returns `Ok`; any error rolls back every statement
    /// `f` executed.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn schema_version(&self) -> Result<i32> {
        self.read(|conn| Ok(migrations::get_schema_version(conn)))
    }
}
