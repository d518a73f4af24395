//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.

use mr_core::{Error, Result};
use rusqlite::Connection;

/// V1: the catalog of published objects.
const V1_INITIAL: &str = r#"
CREATE TABLE catalog_files (
    container_id INTEGER NOT NULL,
    object_id    INTEGER NOT NULL,
    hash         TEXT NOT NULL,
    file_name    TEXT,
    mime_type    TEXT,
    file_size    INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    PRIMARY KEY (container_id, object_id)
);

CREATE INDEX idx_catalog_files_hash ON catalog_files(hash);
"#;

/// Ordered list of all migrations: `(version, sql)`.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(Error::database)?;

        if already {
            continue;
        }

        let tx = conn.unchecked_transaction().map_err(Error::database)?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])
            .map_err(Error::database)?;

        tx.commit().map_err(Error::database)?;
        tracing::debug!(version, "Applied catalog migration");
    }

    Ok(())
}
