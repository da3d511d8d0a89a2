//! Read-only SQLite store.
//!
//! Opens a fixed pool of read-only connections at startup and executes all
//! query work on the blocking thread pool. Statements are prepared through
//! the per-connection statement cache so they are reusable across requests.
//! Every execution runs under a wall-clock budget; on expiry the connection
//! is interrupted and the request fails with the timeout error kind.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, InterruptHandle, OpenFlags};

use crate::error::{AppError, AppResult};

/// ~10 MB in-process page cache (negative cache_size is KiB).
const PAGE_CACHE_KIB: i64 = -10_240;
/// ~30 MB memory-mapped window.
const MMAP_BYTES: i64 = 30 * 1024 * 1024;
const STATEMENT_CACHE_CAPACITY: usize = 64;

pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_QUERY_BUDGET: Duration = Duration::from_secs(30);

struct Slot {
    conn: Mutex<Connection>,
    interrupt: Arc<InterruptHandle>,
}

struct StoreInner {
    slots: Vec<Slot>,
    next: AtomicUsize,
    budget: Duration,
}

/// Cheap-to-clone handle over the pooled read-only connections.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn open(db_path: impl AsRef<Path>) -> AppResult<Self> {
        Self::open_with(db_path, DEFAULT_POOL_SIZE, DEFAULT_QUERY_BUDGET)
    }

    pub fn open_with(
        db_path: impl AsRef<Path>,
        pool_size: usize,
        budget: Duration,
    ) -> AppResult<Self> {
        let db_path = db_path.as_ref();
        if !db_path.exists() {
            return Err(AppError::Internal(format!(
                "store not found at {}",
                db_path.display()
            )));
        }

        let mut slots = Vec::with_capacity(pool_size);
        for i in 0..pool_size.max(1) {
            let conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
            apply_read_pragmas(&conn)?;

            if i == 0 {
                verify_schema(&conn)?;
                // Planner statistics were produced by the precompute pass;
                // optimize is best-effort on a read-only handle.
                if let Err(e) = conn.execute_batch("PRAGMA optimize") {
                    tracing::debug!("PRAGMA optimize skipped: {}", e);
                }
            }

            let interrupt = Arc::new(conn.get_interrupt_handle());
            slots.push(Slot {
                conn: Mutex::new(conn),
                interrupt,
            });
        }

        tracing::info!(
            "store opened read-only at {} ({} connections)",
            db_path.display(),
            slots.len()
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                slots,
                next: AtomicUsize::new(0),
                budget,
            }),
        })
    }

    /// Run a closure against a pooled connection on the blocking pool,
    /// under the store's wall-clock budget. If the budget expires, or the
    /// caller's future is dropped mid-flight, the connection is interrupted
    /// at its next row boundary.
    pub async fn query<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        let idx = inner.next.fetch_add(1, Ordering::Relaxed) % inner.slots.len();
        let mut guard = InterruptGuard {
            handle: inner.slots[idx].interrupt.clone(),
            armed: true,
        };

        let task = tokio::task::spawn_blocking(move || {
            let conn = inner.slots[idx]
                .conn
                .lock()
                .map_err(|_| AppError::Internal("connection lock poisoned".to_string()))?;
            f(&conn)
        });

        match tokio::time::timeout(self.inner.budget, task).await {
            Ok(joined) => {
                guard.armed = false;
                joined.map_err(|e| AppError::Internal(format!("query task failed: {}", e)))?
            }
            Err(_) => Err(AppError::QueryTimeout),
        }
    }

    /// The `metadata` key/value table, verbatim.
    pub async fn metadata(&self) -> AppResult<HashMap<String, String>> {
        self.query(|conn| {
            let mut stmt = conn.prepare_cached("SELECT key, value FROM metadata")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut map = HashMap::new();
            for row in rows {
                let (key, value) = row?;
                map.insert(key, value);
            }
            Ok(map)
        })
        .await
    }
}

/// Interrupts the connection on drop unless disarmed. Left armed on the
/// timeout path and on caller cancellation.
struct InterruptGuard {
    handle: Arc<InterruptHandle>,
    armed: bool,
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.armed {
            self.handle.interrupt();
        }
    }
}

fn apply_read_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "cache_size", PAGE_CACHE_KIB)?;
    conn.pragma_update(None, "mmap_size", MMAP_BYTES)?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    // Read-only: durability is irrelevant.
    conn.pragma_update(None, "synchronous", "OFF")?;
    conn.pragma_update(None, "query_only", "ON")?;
    Ok(())
}

/// Prepare the statements every endpoint depends on. A failure here means
/// the store file is missing tables and must abort startup.
fn verify_schema(conn: &Connection) -> AppResult<()> {
    const PROBES: [&str; 7] = [
        "SELECT COUNT(*) FROM transactions",
        "SELECT key, value FROM metadata",
        "SELECT reg_num, name, total_transactions, last_transaction FROM top_agents LIMIT 1",
        "SELECT period, property_type, transaction_type, count FROM monthly_stats LIMIT 1",
        "SELECT property_type, count, percentage FROM property_type_stats LIMIT 1",
        "SELECT transaction_type, count, percentage FROM transaction_type_stats LIMIT 1",
        "SELECT town, count, percentage FROM town_stats LIMIT 1",
    ];
    for sql in PROBES {
        conn.prepare_cached(sql).map_err(|e| {
            AppError::Internal(format!("store schema check failed for `{}`: {}", sql, e))
        })?;
    }
    Ok(())
}
