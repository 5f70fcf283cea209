use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // Documents, one JSON object of fields per row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            fields_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Counter rows for every "{collection}_{context}_aggregation" table.
    // Ungrouped rows use grouped = 0 and group_key = ''.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag_aggregations (
            aggregation TEXT NOT NULL,
            tag TEXT NOT NULL,
            grouped INTEGER NOT NULL DEFAULT 0,
            group_key TEXT NOT NULL DEFAULT '',
            count INTEGER NOT NULL,
            PRIMARY KEY (aggregation, tag, grouped, group_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents(collection, updated_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_tag_aggregations_group ON tag_aggregations(aggregation, grouped, group_key)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
