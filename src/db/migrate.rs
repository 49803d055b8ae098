use rusqlite::{Connection, params};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use crate::error::{Result, LineageError};

/// Schema migrations compiled into the binary, so a deployed `load` does not
/// need the source tree.
const BUNDLED: &[(&str, &str)] = &[
    ("001_reference_tables.sql", include_str!("../../migrations/001_reference_tables.sql")),
    ("002_lookup_indexes.sql", include_str!("../../migrations/002_lookup_indexes.sql")),
];

/// One numbered schema step
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    sql: String,
}

impl Migration {
    /// Parse the version from a "NNN_description.sql" filename
    fn from_file(filename: &str, sql: String) -> Result<Self> {
        let version_str = filename
            .split('_')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LineageError::Config(format!("Invalid migration filename: {}", filename)))?;
        let version: u32 = version_str.parse()
            .map_err(|_| LineageError::Config(format!("Invalid migration version: {}", version_str)))?;

        Ok(Self {
            version,
            name: filename.trim_end_matches(".sql").to_string(),
            sql,
        })
    }
}

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Names of applied migrations, in version order
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

fn applied_versions(conn: &Connection) -> Result<HashSet<u32>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, u32>(0))?
        .collect::<std::result::Result<HashSet<_>, rusqlite::Error>>()?;
    Ok(versions)
}

/// Sort by version and reject two files claiming the same one
fn ordered(mut migrations: Vec<Migration>) -> Result<Vec<Migration>> {
    migrations.sort_by_key(|m| m.version);
    for pair in migrations.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(LineageError::Config(format!(
                "Migrations {} and {} share version {}",
                pair[0].name, pair[1].name, pair[0].version
            )));
        }
    }
    Ok(migrations)
}

/// Migrations compiled into the crate
pub fn bundled_migrations() -> Result<Vec<Migration>> {
    let migrations = BUNDLED
        .iter()
        .map(|(filename, sql)| Migration::from_file(filename, sql.to_string()))
        .collect::<Result<Vec<_>>>()?;
    ordered(migrations)
}

/// Load migration files (*.sql) from a directory
pub fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let mut migrations = Vec::new();

    for entry in fs::read_dir(migrations_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("sql") {
            continue;
        }
        let filename = path.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LineageError::Config("Invalid migration filename".to_string()))?;
        let sql = fs::read_to_string(&path)?;
        migrations.push(Migration::from_file(filename, sql)?);
    }

    ordered(migrations)
}

/// Apply every migration whose version is not recorded yet; returns the
/// versions applied by this call
pub fn apply_migrations(conn: &mut Connection, migrations: &[Migration]) -> Result<Vec<u32>> {
    ensure_migrations_table(conn)?;
    let applied = applied_versions(conn)?;
    let mut newly_applied = Vec::new();

    for migration in migrations {
        if applied.contains(&migration.version) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;

        tx.execute_batch(&migration.sql)
            .map_err(|e| LineageError::Query(format!(
                "Failed to execute migration {}: {}", migration.name, e
            )))?;

        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;

        tx.commit()?;
        newly_applied.push(migration.version);
    }

    if newly_applied.is_empty() {
        log::debug!("Schema up to date");
    } else {
        log::info!("Applied {} migration(s)", newly_applied.len());
    }
    Ok(newly_applied)
}

/// Run pending migrations from a directory
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<Vec<u32>> {
    let migrations = load_migrations(migrations_dir)?;
    apply_migrations(conn, &migrations)
}

/// Run pending bundled migrations
pub fn run_bundled_migrations(conn: &mut Connection) -> Result<Vec<u32>> {
    let migrations = bundled_migrations()?;
    apply_migrations(conn, &migrations)
}

/// Bundled migrations not yet recorded in the database. Read-only.
pub fn pending_migrations(conn: &Connection) -> Result<Vec<String>> {
    let applied = applied_versions(conn)?;
    Ok(bundled_migrations()?
        .into_iter()
        .filter(|m| !applied.contains(&m.version))
        .map(|m| m.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap()
            .query_map([kind], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .unwrap()
    }

    #[test]
    fn test_migration_tracking() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        ensure_migrations_table(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![1, "001_reference_tables"],
        ).unwrap();

        let applied = get_applied_migrations(&conn).unwrap();
        assert_eq!(applied, vec!["001_reference_tables".to_string()]);
        assert_eq!(pending_migrations(&conn).unwrap(), vec!["002_lookup_indexes".to_string()]);
    }

    #[test]
    fn test_load_migrations_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("002_more.sql"), "CREATE TABLE more (id INTEGER);").unwrap();
        fs::write(dir.join("001_base.sql"), "CREATE TABLE base (id INTEGER);").unwrap();
        fs::write(dir.join("README.md"), "not a migration").unwrap();

        let migrations = load_migrations(dir).unwrap();
        let versions: Vec<u32> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(migrations[0].name, "001_base");
    }

    #[test]
    fn test_bad_migration_version() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("abc_test.sql"), "SELECT 1;").unwrap();
        assert!(matches!(load_migrations(temp_dir.path()), Err(LineageError::Config(_))));
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("001_a.sql"), "SELECT 1;").unwrap();
        fs::write(temp_dir.path().join("001_b.sql"), "SELECT 1;").unwrap();
        let err = load_migrations(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("share version 1"));
    }

    #[test]
    fn test_bundled_schema() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        assert_eq!(run_bundled_migrations(&mut conn).unwrap(), vec![1, 2]);
        assert!(run_bundled_migrations(&mut conn).unwrap().is_empty());
        assert!(pending_migrations(&conn).unwrap().is_empty());

        let tables = names(&conn, "table");
        for table in ["material_transactions", "item_master", "schema_migrations"] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }

        let indexes = names(&conn, "index");
        for index in ["idx_txn_batch", "idx_txn_item_lot", "idx_txn_parent_lot", "idx_txn_supplier_lot"] {
            assert!(indexes.contains(&index.to_string()), "missing index {}", index);
        }
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("001_ok.sql"), "CREATE TABLE ok (id INTEGER);").unwrap();
        fs::write(temp_dir.path().join("002_broken.sql"), "CREATE TABLE broken (;").unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        let err = run_migrations(&mut conn, temp_dir.path()).unwrap_err();
        assert!(matches!(err, LineageError::Query(_)));
        assert_eq!(get_applied_migrations(&conn).unwrap(), vec!["001_ok".to_string()]);
    }
}
