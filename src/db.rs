use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::store::sparql::{HttpSparqlConnection, SparqlGraphStore};
use crate::store::sqlite::SqliteGraphStore;
use crate::store::GraphStore;

pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open the configured graph store backend.
pub async fn open_store(config: &Config) -> Result<Arc<dyn GraphStore>> {
    match config.store.backend {
        StoreBackend::Sqlite => {
            let Some(path) = config.store.path.as_deref() else {
                bail!("store.path must be set when store.backend is 'sqlite'");
            };
            let pool = connect(path).await?;
            Ok(Arc::new(SqliteGraphStore::new(pool)))
        }
        StoreBackend::Sparql => {
            let Some(endpoint) = config.store.endpoint.clone() else {
                bail!("store.endpoint must be set when store.backend is 'sparql'");
            };
            let conn = HttpSparqlConnection::new(
                endpoint,
                config.store.update_endpoint.clone(),
                config.store.timeout_secs,
            )
            .context("Failed to build SPARQL client")?;
            Ok(Arc::new(SparqlGraphStore::new(conn)))
        }
    }
}
