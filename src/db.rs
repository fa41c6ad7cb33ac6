use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// Open the artifact database, creating the file if needed.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = config.db_path();

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
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    Ok(pool)
}

/// Open the database only if it already exists.
///
/// Search must not create an empty database as a side effect; a missing
/// file means the embedding index is unavailable.
pub async fn connect_existing(config: &Config) -> Result<SqlitePool> {
    let db_path = config.db_path();
    if !db_path.exists() {
        anyhow::bail!(
            "index database not found at {} (run `holo init` and `holo index`)",
            db_path.display()
        );
    }
    connect(config).await
}
