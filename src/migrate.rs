//! Idempotent schema migrations.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Opens the configured database and applies the schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Applies the schema to an open pool. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per (project, name); the embedding is rewritten with the content.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snippets (
            project TEXT NOT NULL,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (project, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_snippets_project_updated ON snippets(project, updated_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("snippet schema up to date");
    Ok(())
}
