//! Catalog file operations.

use chrono::Utc;
use mr_core::{Error, ObjectRef, Result};
use rusqlite::Connection;

use crate::models::CatalogFile;

const COLS: &str = "container_id, object_id, hash, file_name, mime_type, file_size, created_at";

/// Fields needed to publish an object.
#[derive(Debug, Clone, Default)]
pub struct NewCatalogFile<'a> {
    pub hash: &'a str,
    pub file_name: Option<&'a str>,
    pub mime_type: Option<&'a str>,
    pub file_size: u64,
}

/// Insert or update a catalog entry.
pub fn upsert_file(conn: &Connection, object: ObjectRef, file: &NewCatalogFile<'_>) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO catalog_files (container_id, object_id, hash, file_name, mime_type, file_size, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(container_id, object_id)
         DO UPDATE SET hash = excluded.hash, file_name = excluded.file_name,
                       mime_type = excluded.mime_type, file_size = excluded.file_size",
        rusqlite::params![
            object.container_id.get(),
            object.object_id.get(),
            file.hash,
            file.file_name,
            file.mime_type,
            file.file_size as i64,
            now,
        ],
    )
    .map_err(Error::database)?;
    Ok(())
}

/// Get the catalog entry for an object.
pub fn get_file(conn: &Connection, object: ObjectRef) -> Result<Option<CatalogFile>> {
    let q = format!("SELECT {COLS} FROM catalog_files WHERE container_id = ?1 AND object_id = ?2");
    let result = conn.query_row(
        &q,
        [object.container_id.get(), object.object_id.get()],
        CatalogFile::from_row,
    );
    match result {
        Ok(f) => Ok(Some(f)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e)),
    }
}

/// Delete the catalog entry for an object.
///
/// With `hash` set, only an entry whose hash starts with it is removed, so a
/// newer object republished under the same id survives a stale cleanup. A
/// shortened capability token is therefore enough to match.
pub fn delete_file(conn: &Connection, object: ObjectRef, hash: Option<&str>) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM catalog_files
             WHERE container_id = ?1 AND object_id = ?2 AND (?3 IS NULL OR substr(hash, 1, length(?3)) = ?3)",
            rusqlite::params![object.container_id.get(), object.object_id.get(), hash],
        )
        .map_err(Error::database)?;
    Ok(n > 0)
}

/// Number of catalog entries.
pub fn count_files(conn: &Connection) -> Result<u64> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM catalog_files", [], |row| row.get(0))
        .map_err(Error::database)?;
    Ok(n.max(0) as u64)
}
