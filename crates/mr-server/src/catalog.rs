//! Catalog collaborator.
//!
//! The streaming path never reads the catalog; it only asks it to forget
//! objects the upstream reports as gone.

use std::sync::Arc;

use async_trait::async_trait;
use mr_core::{Error, ObjectRef, Result};
use mr_db::pool::DbPool;

/// Cleanup hook for stale catalog records.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Forget `object`. With `token` set, only a record carrying that token
    /// is removed. Returns whether anything was deleted.
    async fn delete_object(&self, object: ObjectRef, token: Option<&str>) -> Result<bool>;
}

/// Catalog that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCatalog;

#[async_trait]
impl Catalog for NoopCatalog {
    async fn delete_object(&self, _object: ObjectRef, _token: Option<&str>) -> Result<bool> {
        Ok(false)
    }
}

/// Catalog backed by the SQLite `catalog_files` table.
#[derive(Clone)]
pub struct SqliteCatalog {
    db: DbPool,
}

impl SqliteCatalog {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &DbPool {
        &self.db
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn delete_object(&self, object: ObjectRef, token: Option<&str>) -> Result<bool> {
        let db = self.db.clone();
        let token = token.map(str::to_owned);
        tokio::task::spawn_blocking(move || {
            let conn = mr_db::get_conn(&db)?;
            mr_db::queries::catalog::delete_file(&conn, object, token.as_deref())
        })
        .await
        .map_err(|e| Error::Internal(format!("catalog task failed: {e}")))?
    }
}

/// Build the catalog named by the configuration.
pub fn from_config(config: &mr_core::config::CatalogConfig) -> Result<Arc<dyn Catalog>> {
    match &config.db_path {
        Some(path) => {
            let db = mr_db::init_pool(path)?;
            tracing::info!("Catalog opened at {}", path.display());
            Ok(Arc::new(SqliteCatalog::new(db)))
        }
        None => {
            tracing::info!("No catalog configured; stale-object cleanup disabled");
            Ok(Arc::new(NoopCatalog))
        }
    }
}
