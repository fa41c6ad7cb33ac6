//! Storage abstraction for the embedding index.
//!
//! The [`ArtifactStore`] trait defines every operation the indexer and the
//! search pipeline need, so the vector store is pluggable (SQLite in the app
//! crate, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes. The
//! search path only ever calls read operations.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::embedding::normalized_similarity;
use crate::models::{ArtifactId, ArtifactKind, IndexedArtifact};

/// A nearest-neighbor hit returned by [`ArtifactStore::vector_search`].
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub artifact_id: ArtifactId,
    /// Normalized similarity in `[0.0, 1.0]`, see
    /// [`normalized_similarity`](crate::embedding::normalized_similarity).
    pub similarity: f64,
    pub kind: ArtifactKind,
    pub excerpt: String,
}

/// Summary counts for `holo stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total_artifacts: i64,
    pub files: i64,
    pub code: i64,
    pub documentation: i64,
    pub wsp_protocol: i64,
    pub models: Vec<String>,
    pub last_indexed: Option<i64>,
}

/// Abstract storage backend for indexed artifacts.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_artifact`](ArtifactStore::upsert_artifact) | Insert or replace one artifact |
/// | [`get_artifact`](ArtifactStore::get_artifact) | Fetch one artifact by id |
/// | [`list_artifact_ids`](ArtifactStore::list_artifact_ids) | Every stored id |
/// | [`remove_artifacts`](ArtifactStore::remove_artifacts) | Explicit pruning |
/// | [`vector_search`](ArtifactStore::vector_search) | Top-K by similarity |
/// | [`stats`](ArtifactStore::stats) | Counts per kind |
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upsert_artifact(&self, artifact: &IndexedArtifact) -> Result<()>;

    async fn get_artifact(&self, id: &ArtifactId) -> Result<Option<IndexedArtifact>>;

    async fn list_artifact_ids(&self) -> Result<Vec<ArtifactId>>;

    /// Delete the given ids, returning how many existed.
    async fn remove_artifacts(&self, ids: &[ArtifactId]) -> Result<usize>;

    /// The `k` most similar artifacts, ordered by similarity descending and
    /// then artifact id ascending.
    async fn vector_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Score every candidate against `query_vec` and keep the best `k`.
///
/// Shared by the brute-force store implementations so they order results
/// identically.
pub fn top_k_neighbors<'a, I>(query_vec: &[f32], candidates: I, k: usize) -> Vec<Neighbor>
where
    I: IntoIterator<Item = (&'a ArtifactId, &'a [f32], ArtifactKind, &'a str)>,
{
    let mut scored: Vec<Neighbor> = candidates
        .into_iter()
        .filter(|(_, vector, _, _)| !vector.is_empty())
        .map(|(id, vector, kind, excerpt)| Neighbor {
            artifact_id: id.clone(),
            similarity: normalized_similarity(query_vec, vector),
            kind,
            excerpt: excerpt.to_string(),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.artifact_id.to_string().cmp(&b.artifact_id.to_string()))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_orders_and_truncates() {
        let a = ArtifactId::file("a.py");
        let b = ArtifactId::file("b.py");
        let c = ArtifactId::file("c.py");
        let va = [1.0f32, 0.0];
        let vb = [0.0f32, 1.0];
        let vc = [1.0f32, 0.1];
        let hits = top_k_neighbors(
            &[1.0, 0.0],
            vec![
                (&b, &vb[..], ArtifactKind::Code, "b"),
                (&c, &vc[..], ArtifactKind::Code, "c"),
                (&a, &va[..], ArtifactKind::Code, "a"),
            ],
            2,
        );
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].artifact_id, a);
        assert_eq!(hits[1].artifact_id, c);
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.similarity)));
    }

    #[test]
    fn test_top_k_ties_break_by_id() {
        let a = ArtifactId::file("a.py");
        let z = ArtifactId::file("z.py");
        let v = [1.0f32, 0.0];
        let hits = top_k_neighbors(
            &[1.0, 0.0],
            vec![
                (&z, &v[..], ArtifactKind::Code, ""),
                (&a, &v[..], ArtifactKind::Code, ""),
            ],
            5,
        );
        assert_eq!(hits[0].artifact_id, a);
        assert_eq!(hits[1].artifact_id, z);
    }

    #[test]
    fn test_top_k_skips_empty_vectors() {
        let a = ArtifactId::file("a.py");
        let empty: [f32; 0] = [];
        let hits = top_k_neighbors(&[1.0], vec![(&a, &empty[..], ArtifactKind::Code, "")], 5);
        assert!(hits.is_empty());
    }
}
