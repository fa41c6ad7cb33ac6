//! Curated mapping file loading, reference resolution, and hot reload.
//!
//! The mapping file is maintained by hand and selected by extension:
//!
//! ```toml
//! # holo_mappings.toml
//! version = 1
//!
//! [[mapping]]
//! query = "youtube chat moderation"
//! target = "modules/communication/livechat/src/livechat_core.py"
//! ```
//!
//! ```json
//! { "youtube chat moderation": "modules/communication/livechat/src/livechat_core.py" }
//! ```
//!
//! JSON may also be a list of `{"query": ..., "target": ...}` objects.
//! Entry order in the file is the table's insertion order.
//!
//! [`MappingSource`] owns the shared [`MappingHandle`] and re-reads the file
//! when its modification time changes. A reload parses the whole file first
//! and only then swaps the snapshot; a file that fails to parse leaves the
//! previous table in place.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use holo_index_core::mapping::{MappingHandle, MappingTable, ReferenceResolver};
use holo_index_core::models::{MappingEntry, TargetReference};

use crate::config::Config;
use crate::spans;

#[derive(Debug, Deserialize)]
struct TomlMappingFile {
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<u32>,
    #[serde(default)]
    mapping: Vec<MappingRecord>,
}

#[derive(Debug, Deserialize)]
struct MappingRecord {
    query: String,
    target: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonMappingFile {
    Object(IndexMap<String, String>),
    List(Vec<MappingRecord>),
}

/// Parse mapping file content. `extension` selects the format.
pub fn parse_mappings(content: &str, extension: &str) -> Result<MappingTable> {
    let records: Vec<(String, String)> = match extension {
        "toml" => {
            let file: TomlMappingFile =
                toml::from_str(content).context("Failed to parse TOML mapping file")?;
            file.mapping.into_iter().map(|r| (r.query, r.target)).collect()
        }
        "json" => {
            let file: JsonMappingFile =
                serde_json::from_str(content).context("Failed to parse JSON mapping file")?;
            match file {
                JsonMappingFile::Object(map) => map.into_iter().collect(),
                JsonMappingFile::List(list) => {
                    list.into_iter().map(|r| (r.query, r.target)).collect()
                }
            }
        }
        other => bail!(
            "Unsupported mapping file extension '{}'. Use .toml or .json.",
            other
        ),
    };

    let mut table = MappingTable::new();
    for (i, (query, target)) in records.into_iter().enumerate() {
        if query.trim().is_empty() {
            bail!("mapping #{}: query must not be empty", i + 1);
        }
        if target.trim().is_empty() {
            bail!("mapping #{} ('{}'): target must not be empty", i + 1, query);
        }
        table.insert(MappingEntry::new(query, target));
    }
    Ok(table)
}

/// Read and parse a mapping file.
pub fn load_mapping_file(path: &Path) -> Result<MappingTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mapping file: {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    parse_mappings(&content, &extension)
        .with_context(|| format!("Invalid mapping file: {}", path.display()))
}

// ============ Reference resolution ============

/// Resolves mapping targets against the repository root on disk.
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute location of a target, or `None` if it would leave the root.
    pub fn locate(&self, target: &TargetReference) -> Option<PathBuf> {
        let rel = Path::new(&target.path);
        if target.path.is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(rel))
    }

    /// Leading text of the target: the symbol's span when one is named and
    /// found, otherwise the top of the file.
    pub fn excerpt(&self, target: &TargetReference, max_chars: usize) -> Option<String> {
        let path = self.locate(target)?;
        let text = std::fs::read_to_string(&path).ok()?;
        let body = target
            .symbol
            .as_deref()
            .and_then(|symbol| spans::find_symbol(&target.path, &text, symbol))
            .map(|span| span.text)
            .unwrap_or(text);
        Some(spans::excerpt(&body, max_chars))
    }
}

impl ReferenceResolver for FsResolver {
    fn exists(&self, target: &TargetReference) -> bool {
        let Some(path) = self.locate(target) else {
            return false;
        };
        match target.symbol.as_deref() {
            None => path.is_file(),
            // A renamed or deleted symbol leaves the file behind.
            Some(symbol) => std::fs::read_to_string(&path)
                .map(|text| spans::find_symbol(&target.path, &text, symbol).is_some())
                .unwrap_or(false),
        }
    }

    fn modified_at(&self, target: &TargetReference) -> Option<i64> {
        let path = self.locate(target)?;
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs() as i64)
    }
}

// ============ Hot-reloading source ============

#[derive(Debug, Default)]
struct SourceState {
    loaded: bool,
    /// File mtime at the last load attempt; inner `None` means the file was
    /// missing. A file is only re-read once this changes.
    seen: Option<Option<SystemTime>>,
    last_error: Option<String>,
}

/// The current curated mapping table plus where it came from.
pub struct MappingSource {
    path: Option<PathBuf>,
    handle: MappingHandle,
    state: Mutex<SourceState>,
}

impl MappingSource {
    /// A source backed by a mapping file. Load errors are recorded, not
    /// returned; [`current`](Self::current) reports them.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let source = Self {
            path: Some(path.into()),
            handle: MappingHandle::default(),
            state: Mutex::new(SourceState::default()),
        };
        source.refresh();
        source
    }

    /// A fixed in-memory table.
    pub fn from_table(table: MappingTable) -> Self {
        Self {
            path: None,
            handle: MappingHandle::new(table),
            state: Mutex::new(SourceState {
                loaded: true,
                ..SourceState::default()
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the table for one query, reloading first if the file
    /// changed. `Err` carries the reason no table is available.
    pub fn current(&self) -> std::result::Result<Arc<MappingTable>, String> {
        self.refresh();
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.loaded {
            Ok(self.handle.snapshot())
        } else {
            Err(state
                .last_error
                .clone()
                .unwrap_or_else(|| "mapping table not loaded".to_string()))
        }
    }

    /// Force a reload, returning the new entry count.
    pub fn reload(&self) -> Result<usize> {
        let Some(path) = &self.path else {
            return Ok(self.handle.snapshot().len());
        };
        let modified = file_mtime(path);
        let table = load_mapping_file(path)?;
        let count = table.len();
        self.handle.replace(table);

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.loaded = true;
        state.seen = Some(modified);
        state.last_error = None;
        info!(path = %path.display(), entries = count, "loaded curated mappings");
        Ok(count)
    }

    fn refresh(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let modified = file_mtime(path);
        {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.seen == Some(modified) {
                return;
            }
        }

        if let Err(e) = self.reload() {
            let reason = format!("{:#}", e);
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.loaded {
                warn!(error = %reason, "mapping reload failed; keeping previous table");
            } else {
                debug!(error = %reason, "curated mappings unavailable");
            }
            state.seen = Some(modified);
            state.last_error = Some(reason);
        }
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

// ============ list / validate ============

/// One row of `holo mappings list` / `validate`.
#[derive(Debug, Clone, Serialize)]
pub struct MappingStatus {
    pub query: String,
    pub target: String,
    pub exists: bool,
}

/// Check every entry's target against the filesystem.
pub fn validate_table(table: &MappingTable, resolver: &FsResolver) -> Vec<MappingStatus> {
    table
        .entries()
        .map(|entry| MappingStatus {
            query: entry.query_pattern.clone(),
            target: entry.target_reference.clone(),
            exists: resolver.exists(&entry.target()),
        })
        .collect()
}

pub fn run_list(config: &Config, json: bool) -> Result<()> {
    let table = load_mapping_file(&config.mappings_path())?;
    let resolver = FsResolver::new(&config.project.root);
    let rows = validate_table(&table, &resolver);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{} curated mapping(s) in {}", rows.len(), config.mappings_path().display());
    for row in &rows {
        println!(
            "  {:<40} -> {}{}",
            row.query,
            row.target,
            if row.exists { "" } else { "  [stale]" }
        );
    }
    Ok(())
}

/// Validate targets. Stale entries are reported, not treated as failure.
pub fn run_validate(config: &Config, json: bool) -> Result<()> {
    let table = load_mapping_file(&config.mappings_path())?;
    let resolver = FsResolver::new(&config.project.root);
    let rows = validate_table(&table, &resolver);
    let stale: Vec<&MappingStatus> = rows.iter().filter(|r| !r.exists).collect();

    if json {
        let report = serde_json::json!({
            "total": rows.len(),
            "stale": stale,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("mappings validate");
    println!("  total: {}", rows.len());
    println!("  stale: {}", stale.len());
    for row in &stale {
        println!("    {} -> {} (target not found)", row.query, row.target);
    }
    Ok(())
}

/// Starter mapping file written by `holo init` when none exists.
pub const MAPPING_TEMPLATE: &str = r#"# Curated problem -> location mappings for HoloIndex.
#
# Exact (normalized) matches score 1.0 and always rank above semantic hits.
# Targets are repository-relative paths, optionally with a symbol:
#   target = "modules/communication/livechat/src/livechat_core.py:LiveChatCore.poll"
version = 1

# [[mapping]]
# query = "youtube chat moderation"
# target = "modules/communication/livechat/src/livechat_core.py"
"#;
