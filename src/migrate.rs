use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::config::{Config, StoreBackend};
use crate::db;
use crate::ontology::prop;

/// Create the triple store schema for the configured SQLite database.
pub async fn run_migrations(config: &Config) -> Result<()> {
    if config.store.backend != StoreBackend::Sqlite {
        bail!("init only applies to the sqlite store backend");
    }
    let Some(path) = config.store.path.as_deref() else {
        bail!("store.path must be set when store.backend is 'sqlite'");
    };

    let pool = db::connect(path).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation on an open pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS triples (
            graph TEXT NOT NULL,
            subject TEXT NOT NULL,
            predicate TEXT NOT NULL,
            object TEXT NOT NULL,
            is_resource INTEGER NOT NULL DEFAULT 0,
            UNIQUE(subject, predicate, object)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_triples_subject ON triples(subject, predicate)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_triples_object ON triples(predicate, object)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_triples_graph ON triples(graph)")
        .execute(pool)
        .await?;

    // One resource per identifier and one contact per address, whichever
    // account writes first.
    for (name, predicate) in [
        ("idx_triples_identifier", prop::IDENTIFIER),
        ("idx_triples_email", prop::HAS_EMAIL_ADDRESS),
    ] {
        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON triples(object) WHERE predicate = '{}'",
            name, predicate
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}
