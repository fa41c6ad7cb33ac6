//! Curated mapping table and lookup.
//!
//! The table holds human-verified `problem → location` entries. Lookup tries
//! an exact (normalized) pattern match first, then falls back to the best
//! token-Jaccard match above a threshold.
//!
//! # Relevance
//!
//! | Match | `relevance_score` |
//! |-------|-------------------|
//! | exact | `1.0` |
//! | fuzzy `s ≥ t` | `0.3 + 0.69 × (s − t) / (1 − t)`, within `[0.3, 0.99]` |
//!
//! # Tie-break
//!
//! Equal fuzzy scores prefer the entry whose target file was modified most
//! recently. Entries without a known modification time come after dated
//! ones, and table insertion order decides the rest.

use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::fuzzy::{fuzzy_score, normalize_query};
use crate::models::{MappingEntry, MatchOrigin, SearchResult, TargetReference};

/// Default minimum fuzzy score for a curated match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.3;

const FUZZY_FLOOR: f64 = 0.3;
const FUZZY_CEILING: f64 = 0.99;

/// Answers filesystem questions about mapping targets.
///
/// Implemented by the app over the repository root; tests use fixed maps.
pub trait ReferenceResolver {
    /// Whether the target file exists and, when a symbol is named, still
    /// defines it.
    fn exists(&self, target: &TargetReference) -> bool;
    /// Modification time (unix seconds) of the target file, if known.
    fn modified_at(&self, target: &TargetReference) -> Option<i64>;
}

/// Insertion-ordered set of [`MappingEntry`] keyed by normalized pattern.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: IndexMap<String, MappingEntry>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. A pattern that normalizes to an existing key replaces
    /// that entry's target in place (last write wins, position kept).
    pub fn insert(&mut self, entry: MappingEntry) {
        let key = normalize_query(&entry.query_pattern);
        if key.is_empty() {
            return;
        }
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.values()
    }

    /// Find the best curated match for `query`.
    pub fn lookup(
        &self,
        query: &str,
        threshold: f64,
        resolver: &dyn ReferenceResolver,
    ) -> Option<CuratedMatch> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return None;
        }

        if let Some(entry) = self.entries.get(&normalized) {
            return Some(CuratedMatch::build(entry, 1.0, true, resolver));
        }

        let mut best: Option<(&MappingEntry, f64, Option<i64>)> = None;
        for (key, entry) in &self.entries {
            let score = fuzzy_score(&normalized, key);
            if score <= 0.0 || score < threshold {
                continue;
            }
            match best {
                Some((_, best_score, _)) if score < best_score => {}
                Some((_, best_score, best_mtime)) if score == best_score => {
                    let mtime = resolver.modified_at(&entry.target());
                    if fresher(mtime, best_mtime) {
                        best = Some((entry, score, mtime));
                    }
                }
                _ => best = Some((entry, score, resolver.modified_at(&entry.target()))),
            }
        }

        best.map(|(entry, score, _)| CuratedMatch::build(entry, score, false, resolver))
    }
}

// Entries are visited in insertion order, so only a strictly fresher
// mtime displaces the current best.
fn fresher(candidate: Option<i64>, current: Option<i64>) -> bool {
    match (candidate, current) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Map a fuzzy score into the curated relevance band `[0.3, 0.99]`.
pub fn scale_fuzzy(score: f64, threshold: f64) -> f64 {
    let t = threshold.clamp(0.0, 1.0);
    if t >= 1.0 {
        return FUZZY_CEILING;
    }
    let scaled = FUZZY_FLOOR + (FUZZY_CEILING - FUZZY_FLOOR) * ((score - t) / (1.0 - t));
    scaled.clamp(FUZZY_FLOOR, FUZZY_CEILING)
}

/// A curated mapping hit, before snippet enrichment.
#[derive(Debug, Clone)]
pub struct CuratedMatch {
    pub entry: MappingEntry,
    pub target: TargetReference,
    /// Raw Jaccard score (`1.0` for exact matches).
    pub fuzzy_score: f64,
    pub exact: bool,
    /// Target file or symbol does not exist.
    pub stale: bool,
}

impl CuratedMatch {
    fn build(
        entry: &MappingEntry,
        score: f64,
        exact: bool,
        resolver: &dyn ReferenceResolver,
    ) -> Self {
        let target = entry.target();
        let stale = !resolver.exists(&target);
        Self {
            entry: entry.clone(),
            target,
            fuzzy_score: score,
            exact,
            stale,
        }
    }

    pub fn relevance(&self, threshold: f64) -> f64 {
        if self.exact {
            1.0
        } else {
            scale_fuzzy(self.fuzzy_score, threshold)
        }
    }

    pub fn into_result(self, threshold: f64, snippet: String) -> SearchResult {
        let relevance_score = self.relevance(threshold);
        SearchResult {
            source_artifact_id: self.target.artifact_id().to_string(),
            relevance_score,
            match_origin: MatchOrigin::CuratedMapping,
            snippet,
            stale_reference: self.stale,
            matched_pattern: Some(self.entry.query_pattern),
        }
    }
}

/// Shared, swappable handle to the current mapping table.
///
/// Readers take an `Arc` snapshot that stays valid for the whole query;
/// [`replace`](Self::replace) swaps in a fully built table, so a reader
/// never observes a partially loaded one.
#[derive(Debug, Default)]
pub struct MappingHandle {
    current: RwLock<Arc<MappingTable>>,
}

impl MappingHandle {
    pub fn new(table: MappingTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<MappingTable> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Swap in a new table, returning the previous snapshot.
    pub fn replace(&self, table: MappingTable) -> Arc<MappingTable> {
        let next = Arc::new(table);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}
