//! Index statistics and health overview.
//!
//! A quick summary of what's indexed and whether the curated mappings still
//! point at real files. Used by `holo stats` to confirm that indexing runs
//! and mapping maintenance are keeping up with the repository.

use anyhow::Result;

use holo_index_core::store::{ArtifactStore, StoreStats};

use crate::config::Config;
use crate::db;
use crate::mappings::{load_mapping_file, validate_table, FsResolver};
use crate::sqlite_store::SqliteStore;

/// Curated mapping health.
struct MappingSummary {
    entries: usize,
    stale: usize,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let store = SqliteStore::new(pool);
    let stats = store.stats().await;
    store.close().await;
    let stats = stats?;

    let db_path = config.db_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let mappings = match load_mapping_file(&config.mappings_path()) {
        Ok(table) => {
            let resolver = FsResolver::new(config.project.root.clone());
            let statuses = validate_table(&table, &resolver);
            Ok(MappingSummary {
                entries: table.len(),
                stale: statuses.iter().filter(|s| !s.exists).count(),
            })
        }
        Err(e) => Err(format!("{:#}", e)),
    };

    print!("{}", render(config, db_size, &stats, &mappings));
    Ok(())
}

fn render(
    config: &Config,
    db_size: u64,
    stats: &StoreStats,
    mappings: &Result<MappingSummary, String>,
) -> String {
    let mut out = String::new();
    out.push_str("HoloIndex stats\n");
    out.push_str("===============\n\n");
    out.push_str(&format!("  Database:    {}\n", config.db_path().display()));
    out.push_str(&format!("  Size:        {}\n", format_bytes(db_size)));
    out.push_str(&format!(
        "  Provider:    {}\n",
        if config.embedding.is_enabled() {
            config.embedding.provider.as_str()
        } else {
            "disabled"
        }
    ));
    out.push('\n');

    out.push_str(&format!("  Artifacts:   {}\n", stats.total_artifacts));
    out.push_str(&format!("  Files:       {}\n", stats.files));
    out.push_str(&format!(
        "  By kind:     code {} / documentation {} / wsp_protocol {}\n",
        stats.code, stats.documentation, stats.wsp_protocol
    ));
    if !stats.models.is_empty() {
        out.push_str(&format!("  Models:      {}\n", stats.models.join(", ")));
    }
    let indexed = match stats.last_indexed {
        Some(ts) => format_ts_relative(ts),
        None => "never".to_string(),
    };
    out.push_str(&format!("  Last index:  {}\n", indexed));
    out.push('\n');

    out.push_str(&format!(
        "  Mappings:    {}\n",
        config.mappings_path().display()
    ));
    match mappings {
        Ok(m) => {
            out.push_str(&format!("  Entries:     {}\n", m.entries));
            out.push_str(&format!("  Stale:       {}\n", m.stale));
        }
        Err(reason) => out.push_str(&format!("  Unavailable: {}\n", reason)),
    }
    out.push('\n');
    out
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now ("3 hours ago"); older than a
/// month falls back to a date.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }
    let plural = |n: i64, unit: &str| format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" });
    match delta {
        d if d < 60 => "just now".to_string(),
        d if d < 3600 => plural(d / 60, "min"),
        d if d < 86400 => plural(d / 3600, "hour"),
        d if d < 86400 * 30 => plural(d / 86400, "day"),
        _ => format_ts_iso(ts),
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
