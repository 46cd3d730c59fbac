//! Connection setup and schema migrations for the clinic store.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use super::DatabaseError;

/// Ordered schema steps; `schema_version` records the highest one applied.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../resources/migrations/001_initial.sql"))];

const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA foreign_keys=ON;
     PRAGMA busy_timeout=5000;";

/// Open the clinic database at `path`, creating it if needed, and bring the
/// schema up to date. Called once at startup.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = connect(path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Per-request connection to a database that has already been migrated.
pub fn connect(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    Ok(conn)
}

#[cfg(test)]
pub(crate) fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Apply every migration newer than the recorded schema version, each in its
/// own transaction.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let applied = schema_version(conn)?;
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        tracing::info!(version, "Applying schema migration");
        let failed = |e: rusqlite::Error| DatabaseError::MigrationFailed {
            version,
            reason: e.to_string(),
        };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.commit().map_err(failed)?;
    }
    Ok(())
}

/// Highest applied migration, or 0 on a fresh file with no `schema_version`
/// table. Any other failure is reported, never read as "empty".
pub fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let tracked = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !tracked {
        return Ok(0);
    }
    let version: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

#[cfg(test)]
pub(crate) fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_has_every_table_at_latest_version() {
        let conn = open_memory_database().unwrap();
        // 16 entity tables + schema_version
        assert_eq!(count_tables(&conn).unwrap(), 17);
        assert_eq!(schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn untracked_store_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn version_lookup_failure_is_not_treated_as_fresh() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE schema_version (label TEXT)").unwrap();
        assert!(matches!(schema_version(&conn), Err(DatabaseError::Sqlite(_))));
        assert!(run_migrations(&conn).is_err());
        assert_eq!(count_tables(&conn).unwrap(), 1);
    }

    #[test]
    fn rerunning_migrations_is_a_no_op() {
        let conn = open_memory_database().unwrap();
        run_migrations(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn connections_enforce_foreign_keys() {
        let conn = open_memory_database().unwrap();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn reopened_file_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        drop(open_database(&path).unwrap());
        let conn = connect(&path).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);
        assert_eq!(count_tables(&conn).unwrap(), 17);
    }
}
