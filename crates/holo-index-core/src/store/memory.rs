//! In-memory [`ArtifactStore`] implementation for tests and embedding in
//! other tools.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Vector search is
//! brute-force over all stored vectors.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ArtifactId, ArtifactKind, IndexedArtifact};

use super::{top_k_neighbors, ArtifactStore, Neighbor, StoreStats};

/// In-memory artifact store.
pub struct InMemoryStore {
    artifacts: RwLock<HashMap<ArtifactId, IndexedArtifact>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            artifacts: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn upsert_artifact(&self, artifact: &IndexedArtifact) -> Result<()> {
        let mut artifacts = self.artifacts.write().unwrap();
        artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(())
    }

    async fn get_artifact(&self, id: &ArtifactId) -> Result<Option<IndexedArtifact>> {
        let artifacts = self.artifacts.read().unwrap();
        Ok(artifacts.get(id).cloned())
    }

    async fn list_artifact_ids(&self) -> Result<Vec<ArtifactId>> {
        let artifacts = self.artifacts.read().unwrap();
        let mut ids: Vec<ArtifactId> = artifacts.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn remove_artifacts(&self, ids: &[ArtifactId]) -> Result<usize> {
        let mut artifacts = self.artifacts.write().unwrap();
        Ok(ids.iter().filter(|id| artifacts.remove(*id).is_some()).count())
    }

    async fn vector_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let artifacts = self.artifacts.read().unwrap();
        Ok(top_k_neighbors(
            query_vec,
            artifacts
                .values()
                .map(|a| (&a.id, a.embedding.as_slice(), a.kind, a.excerpt.as_str())),
            k,
        ))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let artifacts = self.artifacts.read().unwrap();
        let mut stats = StoreStats {
            total_artifacts: artifacts.len() as i64,
            ..StoreStats::default()
        };
        let mut models = BTreeSet::new();
        for a in artifacts.values() {
            if a.id.lines.is_none() && a.id.symbol.is_none() {
                stats.files += 1;
            }
            match a.kind {
                ArtifactKind::Code => stats.code += 1,
                ArtifactKind::Documentation => stats.documentation += 1,
                ArtifactKind::WspProtocol => stats.wsp_protocol += 1,
            }
            models.insert(a.model.clone());
            stats.last_indexed = stats.last_indexed.max(Some(a.last_indexed));
        }
        stats.models = models.into_iter().collect();
        Ok(stats)
    }
}
