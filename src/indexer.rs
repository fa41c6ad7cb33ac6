//! Building the embedding index.
//!
//! `holo index` walks the configured roots, splits every matching file into
//! artifacts (the whole file plus its code symbols or documentation chunks,
//! see [`spans`](crate::spans)), and embeds the ones whose content hash or
//! model changed since the last run.
//!
//! ```text
//! walk roots ──► files ──► artifacts ──► unchanged? ──► skip
//!                                           │
//!                                           └──► embed (batched) ──► upsert
//! ```
//!
//! A full pass removes artifacts that were not produced this time (deleted
//! files, renamed symbols) unless `--keep-stale` is given. A failed batch is
//! logged and counted as pending; the next run retries it. Rows whose content
//! changed but could not be re-embedded are removed so search never serves a
//! vector for text that is gone.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use holo_index_core::embedding::EmbeddingProvider;
use holo_index_core::models::{
    content_hash, normalize_rel_path, ArtifactId, ArtifactKind, IndexedArtifact,
};
use holo_index_core::store::ArtifactStore;

use crate::config::Config;
use crate::spans;

/// Longest text sent to the embedding provider for one artifact.
const MAX_EMBED_CHARS: usize = 8000;

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/target/**",
    "**/node_modules/**",
    "**/__pycache__/**",
    "**/.venv/**",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Report what would change without embedding or writing.
    pub dry_run: bool,
    /// Keep artifacts that no longer exist on disk.
    pub keep_stale: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub files: usize,
    pub artifacts: usize,
    pub embedded: usize,
    pub unchanged: usize,
    /// Artifacts that still need an embedding (failed batches, or all
    /// changed artifacts in a dry run).
    pub pending: usize,
    pub pruned: usize,
    pub skipped: usize,
}

/// One embeddable unit before it has a vector.
struct Unit {
    id: ArtifactId,
    kind: ArtifactKind,
    text: String,
    hash: String,
    excerpt: String,
}

pub async fn run_index(config: &Config, opts: IndexOptions) -> Result<()> {
    let provider = crate::embedding::create_provider(&config.embedding)?;
    let pool = crate::db::connect_existing(config).await?;
    let store = crate::sqlite_store::SqliteStore::new(pool);

    let summary = index_repository(config, &store, provider.as_ref(), opts).await;
    store.close().await;
    let summary = summary?;

    if opts.dry_run {
        println!("index (dry-run)");
    } else {
        println!("index complete");
    }
    println!("  files: {}", summary.files);
    println!("  artifacts: {}", summary.artifacts);
    println!("  unchanged: {}", summary.unchanged);
    println!("  embedded: {}", summary.embedded);
    println!("  pending: {}", summary.pending);
    println!("  pruned: {}", summary.pruned);
    println!("  skipped files: {}", summary.skipped);
    if summary.pending > 0 && !opts.dry_run {
        println!("  re-run `holo index` to retry pending artifacts");
    }
    Ok(())
}

/// Index every file under `index.roots` into `store`.
pub async fn index_repository(
    config: &Config,
    store: &dyn ArtifactStore,
    provider: &dyn EmbeddingProvider,
    opts: IndexOptions,
) -> Result<IndexSummary> {
    if !provider.is_enabled() {
        bail!(
            "Embedding provider is disabled; set [embedding] provider in the config to build the index"
        );
    }

    let mut summary = IndexSummary::default();
    let files = collect_files(config)?;
    summary.files = files.len();

    let mut seen: HashSet<ArtifactId> = HashSet::new();
    let mut pending: Vec<Unit> = Vec::new();
    // Pending units that already have an out-of-date row in the store.
    let mut outdated: HashSet<ArtifactId> = HashSet::new();

    for (rel, path) in &files {
        let text = match read_indexable(path, config.index.max_file_bytes) {
            Some(text) => text,
            None => {
                debug!(path = %rel, "skipping file");
                summary.skipped += 1;
                continue;
            }
        };

        for unit in file_units(config, rel, &text) {
            summary.artifacts += 1;
            seen.insert(unit.id.clone());

            let existing = store.get_artifact(&unit.id).await?;
            let stored = existing.is_some();
            let up_to_date = existing
                .map(|a| {
                    a.content_hash == unit.hash
                        && a.model == provider.model_name()
                        && a.embedding.len() == provider.dims()
                })
                .unwrap_or(false);
            if up_to_date {
                summary.unchanged += 1;
            } else {
                if stored {
                    outdated.insert(unit.id.clone());
                }
                pending.push(unit);
            }
        }
    }

    let stale: Vec<ArtifactId> = if opts.keep_stale {
        Vec::new()
    } else {
        store
            .list_artifact_ids()
            .await?
            .into_iter()
            .filter(|id| !seen.contains(id))
            .collect()
    };

    if opts.dry_run {
        summary.pending = pending.len();
        summary.pruned = stale.len();
        return Ok(summary);
    }

    let now = chrono::Utc::now().timestamp();
    let batch_size = config.embedding.batch_size.max(1);
    for batch in pending.chunks(batch_size) {
        let texts: Vec<String> = batch
            .iter()
            .map(|u| spans::excerpt(&u.text, MAX_EMBED_CHARS))
            .collect();

        let vectors = match provider.embed_texts(&texts).await {
            Ok(vectors) if vectors.len() == batch.len() => vectors,
            Ok(vectors) => {
                warn!(
                    expected = batch.len(),
                    got = vectors.len(),
                    "embedding batch returned the wrong number of vectors"
                );
                summary.pending += batch.len();
                withdraw_outdated(store, batch, &outdated).await?;
                continue;
            }
            Err(e) => {
                warn!(error = %e, size = batch.len(), "embedding batch failed");
                summary.pending += batch.len();
                withdraw_outdated(store, batch, &outdated).await?;
                continue;
            }
        };

        for (unit, embedding) in batch.iter().zip(vectors) {
            let artifact = IndexedArtifact {
                id: unit.id.clone(),
                content_hash: unit.hash.clone(),
                embedding,
                kind: unit.kind,
                last_indexed: now,
                excerpt: unit.excerpt.clone(),
                model: provider.model_name().to_string(),
            };
            store.upsert_artifact(&artifact).await?;
            summary.embedded += 1;
        }
    }

    if !stale.is_empty() {
        summary.pruned = store.remove_artifacts(&stale).await?;
    }

    info!(
        files = summary.files,
        artifacts = summary.artifacts,
        embedded = summary.embedded,
        unchanged = summary.unchanged,
        pending = summary.pending,
        pruned = summary.pruned,
        "index pass finished"
    );
    Ok(summary)
}

async fn withdraw_outdated(
    store: &dyn ArtifactStore,
    batch: &[Unit],
    outdated: &HashSet<ArtifactId>,
) -> Result<()> {
    let ids: Vec<ArtifactId> = batch
        .iter()
        .filter(|u| outdated.contains(&u.id))
        .map(|u| u.id.clone())
        .collect();
    if !ids.is_empty() {
        let removed = store.remove_artifacts(&ids).await?;
        debug!(removed, "removed artifacts that could not be re-embedded");
    }
    Ok(())
}

/// Files to index, keyed by repository-relative path.
fn collect_files(config: &Config) -> Result<BTreeMap<String, PathBuf>> {
    let project_root = std::fs::canonicalize(&config.project.root).with_context(|| {
        format!(
            "Project root does not exist: {}",
            config.project.root.display()
        )
    })?;

    let include_set = build_globset(&config.index.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.index.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = BTreeMap::new();
    for root in &config.index.roots {
        let root = project_root.join(root);
        if !root.exists() {
            bail!("Index root does not exist: {}", root.display());
        }

        let walker = WalkDir::new(&root).follow_links(config.index.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = relative_to(&project_root, entry.path()) else {
                continue;
            };
            if exclude_set.is_match(&rel) || !include_set.is_match(&rel) {
                continue;
            }
            files.insert(rel, entry.path().to_path_buf());
        }
    }
    Ok(files)
}

fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let rel = normalize_rel_path(&relative.to_string_lossy());
    if rel.is_empty() {
        None
    } else {
        Some(rel)
    }
}

/// File contents if the file is small enough, valid UTF-8, and not blank.
fn read_indexable(path: &Path, max_bytes: u64) -> Option<String> {
    let metadata = std::fs::metadata(path).ok()?;
    if metadata.len() > max_bytes {
        return None;
    }
    let text = std::fs::read_to_string(path).ok()?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn file_units(config: &Config, rel: &str, text: &str) -> Vec<Unit> {
    let kind = spans::artifact_kind(rel);
    let excerpt_chars = config.index.excerpt_chars;

    let mut units = vec![Unit {
        id: ArtifactId::file(rel),
        kind,
        text: text.to_string(),
        hash: content_hash(text),
        excerpt: spans::excerpt(text, excerpt_chars),
    }];

    for span in spans::extract_spans(rel, text, config.index.doc_chunk_chars) {
        units.push(Unit {
            id: ArtifactId::span(rel, span.symbol.as_deref(), span.start, span.end),
            kind,
            hash: content_hash(&span.text),
            excerpt: spans::excerpt(&span.text, excerpt_chars),
            text: span.text,
        });
    }
    units
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
