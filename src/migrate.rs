use anyhow::Result;
use sqlx::SqlitePool;

/// Create the embedding cache schema if it does not exist.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embedding_cache (
            cache_key TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            content TEXT NOT NULL,
            dims INTEGER NOT NULL,
            vector BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (cache_key, chunk_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
