//! Search orchestration.
//!
//! One query runs through the whole pipeline:
//!
//! ```text
//!            ┌──► module gate ───────────────────────────┐
//! query ─────┼──► curated lookup ───────────┐            │
//!            └──► embed + nearest (timeout) ┴─► rank ──► compose ──► Report
//! ```
//!
//! The curated lookup and the semantic branch run concurrently; only the
//! semantic branch does I/O, and it is bounded by `search.timeout_ms`. Any
//! semantic failure (disabled provider, provider error, store error,
//! timeout) degrades the report to curated-only results with a note. Only
//! when the mapping table is unavailable as well does the search fail, with
//! [`HoloError::InfrastructureFailure`].
//!
//! Search never writes to either store.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use holo_index_core::composer::{compose, ComposeOptions, Degradation, Report};
use holo_index_core::embedding::{embed_query, EmbeddingProvider};
use holo_index_core::models::SearchResult;
use holo_index_core::ranker::{rank, semantic_results};
use holo_index_core::store::{ArtifactStore, Neighbor};
use holo_index_core::HoloError;

use crate::config::Config;
use crate::gate::ModuleGate;
use crate::mappings::{FsResolver, MappingSource};

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 1000;

/// Per-query tunables, copied out of [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub candidate_k: usize,
    pub timeout: Duration,
    pub snippet_chars: usize,
    pub fuzzy_threshold: f64,
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_limit: config.search.default_limit,
            candidate_k: config.search.candidate_k,
            timeout: Duration::from_millis(config.search.timeout_ms),
            snippet_chars: config.search.snippet_chars,
            fuzzy_threshold: config.mappings.fuzzy_threshold,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from_config(&Config::minimal())
    }
}

/// The embedding side of the pipeline.
pub enum SemanticBackend {
    Ready {
        store: Arc<dyn ArtifactStore>,
        provider: Arc<dyn EmbeddingProvider>,
    },
    /// No provider configured.
    Disabled,
    /// Could not be set up; carries the reason.
    Unavailable(String),
}

pub struct SearchEngine {
    semantic: SemanticBackend,
    curated: MappingSource,
    resolver: FsResolver,
    gate: ModuleGate,
    settings: SearchSettings,
    pool: Option<SqlitePool>,
}

impl SearchEngine {
    pub fn new(
        semantic: SemanticBackend,
        curated: MappingSource,
        resolver: FsResolver,
        gate: ModuleGate,
        settings: SearchSettings,
    ) -> Self {
        Self {
            semantic,
            curated,
            resolver,
            gate,
            settings,
            pool: None,
        }
    }

    /// Build the engine from configuration.
    ///
    /// Never fails: a missing database or a broken provider setup makes the
    /// semantic backend unavailable, and a missing mapping file makes the
    /// curated source unavailable. Each surfaces per query.
    pub async fn from_config(config: &Config) -> Self {
        let mut pool = None;
        let semantic = if !config.embedding.is_enabled() {
            SemanticBackend::Disabled
        } else {
            match crate::embedding::create_provider(&config.embedding) {
                Err(e) => {
                    warn!(error = %e, "embedding provider unavailable");
                    SemanticBackend::Unavailable(format!("{:#}", e))
                }
                Ok(provider) => match crate::db::connect_existing(config).await {
                    Err(e) => {
                        warn!(error = %e, "embedding index unavailable");
                        SemanticBackend::Unavailable(format!("{:#}", e))
                    }
                    Ok(p) => {
                        let store = crate::sqlite_store::SqliteStore::new(p.clone());
                        pool = Some(p);
                        SemanticBackend::Ready {
                            store: Arc::new(store),
                            provider: Arc::from(provider),
                        }
                    }
                },
            }
        };

        let mut engine = Self::new(
            semantic,
            MappingSource::from_file(config.mappings_path()),
            FsResolver::new(config.project.root.clone()),
            ModuleGate::from_config(config),
            SearchSettings::from_config(config),
        );
        engine.pool = pool;
        engine
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn mappings(&self) -> &MappingSource {
        &self.curated
    }

    /// Answer one query. `limit` defaults to `search.default_limit`.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Report, HoloError> {
        let query = validate_query(query)?;
        let limit = limit.unwrap_or(self.settings.default_limit);
        if limit == 0 {
            return Err(HoloError::InvalidInput(
                "limit must be at least 1".to_string(),
            ));
        }
        let started = Instant::now();

        let modules = self.gate.check_query(query);
        debug!(modules = modules.len(), "module gate checked");

        let (curated, semantic) = tokio::join!(
            self.curated_branch(query),
            self.semantic_branch(query)
        );

        let mut degraded = Vec::new();
        let curated = match curated {
            Ok(results) => results,
            Err(reason) => {
                let degradation = Degradation::CuratedUnavailable { reason };
                if let Err(semantic_failure) = &semantic {
                    return Err(HoloError::InfrastructureFailure {
                        curated: reason_of(&degradation),
                        semantic: reason_of(semantic_failure),
                    });
                }
                degraded.push(degradation);
                Vec::new()
            }
        };
        let semantic = match semantic {
            Ok(neighbors) => semantic_results(neighbors),
            Err(degradation) => {
                debug!(note = %degradation.note(), "semantic branch degraded");
                degraded.push(degradation);
                Vec::new()
            }
        };

        debug!(
            curated = curated.len(),
            semantic = semantic.len(),
            "ranking candidates"
        );
        let ranked = rank(curated, semantic, limit);
        let report = compose(
            query,
            modules,
            ranked,
            degraded,
            ComposeOptions {
                limit,
                snippet_chars: self.settings.snippet_chars,
            },
        );
        debug!(
            results = report.results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search finished"
        );
        Ok(report)
    }

    async fn curated_branch(&self, query: &str) -> Result<Vec<SearchResult>, String> {
        let table = self.curated.current()?;
        let threshold = self.settings.fuzzy_threshold;
        let Some(hit) = table.lookup(query, threshold, &self.resolver) else {
            return Ok(Vec::new());
        };
        let snippet = self
            .resolver
            .excerpt(&hit.target, self.settings.snippet_chars)
            .unwrap_or_default();
        debug!(
            pattern = %hit.entry.query_pattern,
            exact = hit.exact,
            stale = hit.stale,
            "curated hit"
        );
        Ok(vec![hit.into_result(threshold, snippet)])
    }

    async fn semantic_branch(&self, query: &str) -> Result<Vec<Neighbor>, Degradation> {
        let (store, provider) = match &self.semantic {
            SemanticBackend::Ready { store, provider } => (store, provider),
            SemanticBackend::Disabled => return Err(Degradation::SemanticDisabled),
            SemanticBackend::Unavailable(reason) => {
                return Err(Degradation::SemanticUnavailable {
                    reason: reason.clone(),
                })
            }
        };
        if !provider.is_enabled() {
            return Err(Degradation::SemanticDisabled);
        }

        let k = self.settings.candidate_k;
        let lookup = nearest(store.as_ref(), provider.as_ref(), query, k);
        match tokio::time::timeout(self.settings.timeout, lookup).await {
            Ok(Ok(neighbors)) => Ok(neighbors),
            Ok(Err(e)) => {
                warn!(error = %e, "semantic search failed");
                Err(Degradation::SemanticUnavailable {
                    reason: format!("{:#}", e),
                })
            }
            Err(_) => {
                let timeout_ms = self.settings.timeout.as_millis() as u64;
                warn!(timeout_ms, "semantic search timed out");
                Err(Degradation::SemanticTimeout { timeout_ms })
            }
        }
    }

    /// Release the database connection, if any.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

async fn nearest(
    store: &dyn ArtifactStore,
    provider: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
) -> Result<Vec<Neighbor>> {
    let vector = embed_query(provider, query).await?;
    store.vector_search(&vector, k).await
}

fn reason_of(degradation: &Degradation) -> String {
    match degradation {
        Degradation::SemanticDisabled => "no embedding provider configured".to_string(),
        Degradation::SemanticUnavailable { reason } | Degradation::CuratedUnavailable { reason } => {
            reason.clone()
        }
        Degradation::SemanticTimeout { timeout_ms } => {
            format!("timed out after {} ms", timeout_ms)
        }
    }
}

/// Trimmed query, or `InvalidInput`.
pub fn validate_query(query: &str) -> Result<&str, HoloError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(HoloError::InvalidInput("query is empty".to_string()));
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err(HoloError::InvalidInput(format!(
            "query is longer than {} characters",
            MAX_QUERY_CHARS
        )));
    }
    if trimmed.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return Err(HoloError::InvalidInput(
            "query contains control characters".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Run `holo search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let engine = SearchEngine::from_config(config).await;
    let report = engine.search(query, limit).await;
    engine.close().await;
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}
