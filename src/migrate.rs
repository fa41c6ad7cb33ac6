use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // One row per indexed artifact (file, symbol span or doc chunk).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            symbol TEXT,
            line_start INTEGER,
            line_end INTEGER,
            kind TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            excerpt TEXT NOT NULL DEFAULT '',
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            last_indexed INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_path ON artifacts(path)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_kind ON artifacts(kind)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
