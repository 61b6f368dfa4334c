pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::{info, warn};

pub use error::StoreError;

const READER_POOL_SIZE: usize = 4;

/// Attempts per transaction when SQLite reports BUSY/LOCKED.
const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// SQLite store with a single writer connection and a small pool of read-only
/// connections (WAL mode lets readers run alongside the writer).
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    /// Open (or create) the database file at `path` and bring the schema up to date.
    /// The path must be a real file: read-only connections attach to it separately.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let writer = Connection::open(path)?;

        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        writer.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Run a read-only closure on one of the reader connections.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx].lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction on the writer connection.
    ///
    /// The transaction commits only if `f` returns `Ok`; any error (or a panic)
    /// drops it, which rolls back every write made inside. Transient lock errors
    /// re-run the whole closure up to `MAX_ATTEMPTS` times.
    pub fn with_tx<F, T>(&self, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.writer.lock().map_err(|_| StoreError::Poisoned)?;

        let mut attempt = 1;
        loop {
            let result = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::from)
                .and_then(|tx| {
                    let value = f(&tx)?;
                    tx.commit()?;
                    Ok(value)
                });

            match result {
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    let delay_ms = BASE_BACKOFF_MS << (attempt - 1);
                    warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        delay_ms,
                        error = %e,
                        "Transient database error, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(delay_ms));
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_transaction_rolls_back() {
        let t = test_support::open();

        let result: Result<(), StoreError> = t.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (username, full_name, hash_pass, created_at, password_changed_at)
                 VALUES ('ghost', 'Ghost', 'x', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
                [],
            )?;
            Err(StoreError::Corrupt("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = t
            .db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn semantic_errors_are_not_retried() {
        let t = test_support::open();
        let mut calls = 0;
        let result: Result<(), StoreError> = t.db.with_tx(|_| {
            calls += 1;
            Err(StoreError::UniqueViolation("x".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn transient_errors_are_retried_a_bounded_number_of_times() {
        let t = test_support::open();
        let mut calls = 0;
        let result: Result<(), StoreError> = t.db.with_tx(|_| {
            calls += 1;
            Err(StoreError::Busy)
        });
        assert!(matches!(result, Err(StoreError::Busy)));
        assert_eq!(calls, MAX_ATTEMPTS);
    }
}
