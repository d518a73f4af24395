//! Rust structs mapping to database tables.

use mr_core::ObjectRef;

/// One published object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFile {
    pub object: ObjectRef,
    /// Unique token of the object at the time it was published.
    pub hash: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: u64,
    pub created_at: String,
}

impl CatalogFile {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let container_id: i64 = row.get(0)?;
        let object_id: i64 = row.get(1)?;
        let file_size: i64 = row.get(5)?;
        Ok(Self {
            object: ObjectRef::new(container_id, object_id),
            hash: row.get(2)?,
            file_name: row.get(3)?,
            mime_type: row.get(4)?,
            file_size: file_size.max(0) as u64,
            created_at: row.get(6)?,
        })
    }
}
