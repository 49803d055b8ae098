use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tokio::task;
use crate::error::{LineageError, Result};

/// Pragmas for connections that only ever read the reference store
const READ_PRAGMAS: &str = "PRAGMA query_only = ON; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA cache_size = -65536; \
     PRAGMA mmap_size = 268435456;";

/// Pragmas for the loader, which owns the file while it writes.
/// Rollback journal keeps the file openable by read-only connections.
const WRITE_PRAGMAS: &str = "PRAGMA journal_mode = DELETE; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA temp_store = MEMORY;";

/// Database connection wrapper
///
/// Holds only the path; every call opens its own connection so concurrent
/// lineage requests never share connection state.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
    read_only: bool,
}

impl Db {
    /// Connection manager for the query engine (read-only)
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            read_only: true,
        }
    }

    /// Connection manager that may create and write the database (loader, tests)
    pub fn writable<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            read_only: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Open a new connection with the pragmas matching this wrapper's mode
    pub fn open_connection(&self) -> Result<Connection> {
        open(&self.path, self.read_only)
    }

    /// Execute a closure with a fresh connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let read_only = self.read_only;
        task::spawn_blocking(move || {
            let mut conn = open(&path, read_only)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| LineageError::Query(format!("database task failed: {}", e)))?
    }
}

fn open(path: &Path, read_only: bool) -> Result<Connection> {
    if read_only {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(READ_PRAGMAS)?;
        Ok(conn)
    } else {
        let conn = Connection::open(path)?;
        conn.execute_batch(WRITE_PRAGMAS)?;
        Ok(conn)
    }
}

pub mod migrate;

const EXPECTED_TABLES: &[&str] = &["item_master", "material_transactions", "schema_migrations"];

const EXPECTED_INDEXES: &[&str] = &[
    "idx_txn_batch",
    "idx_txn_item_lot",
    "idx_txn_parent_lot",
    "idx_txn_supplier_lot",
];

/// What a schema check found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReport {
    pub migrations: Vec<String>,
    /// Bundled migrations the database has not seen
    pub pending: Vec<String>,
    pub transactions: i64,
    pub items: i64,
}

/// Verify that all expected tables and lookup indexes exist
pub fn verify_schema(conn: &Connection) -> Result<SchemaReport> {
    let names = |kind: &str| -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")?;
        let names = stmt
            .query_map([kind], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        Ok(names)
    };

    let tables = names("table")?;
    let missing: Vec<&str> = EXPECTED_TABLES
        .iter()
        .copied()
        .filter(|t| !tables.iter().any(|name| name == t))
        .collect();
    if !missing.is_empty() {
        return Err(LineageError::Config(format!("Missing tables: {}", missing.join(", "))));
    }

    let indexes = names("index")?;
    for index in EXPECTED_INDEXES {
        if !indexes.iter().any(|name| name == index) {
            log::warn!("Missing index: {} (lookups will be slow)", index);
        }
    }

    let migrations = migrate::get_applied_migrations(conn)?;
    let pending = migrate::pending_migrations(conn)?;
    if !pending.is_empty() {
        log::warn!("Pending migrations: {} (run the load tool to apply)", pending.join(", "));
    }
    let transactions: i64 = conn.query_row("SELECT COUNT(*) FROM material_transactions", [], |row| row.get(0))?;
    let items: i64 = conn.query_row("SELECT COUNT(*) FROM item_master", [], |row| row.get(0))?;

    Ok(SchemaReport {
        migrations,
        pending,
        transactions,
        items,
    })
}
