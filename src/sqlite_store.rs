//! SQLite-backed [`ArtifactStore`] implementation.
//!
//! Artifacts live in a single `artifacts` table (see [`crate::migrate`]);
//! vectors are stored as little-endian `f32` BLOBs and searched brute-force,
//! which is adequate for a single repository's worth of spans.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use holo_index_core::embedding::{blob_to_vec, vec_to_blob};
use holo_index_core::models::{ArtifactId, ArtifactKind, IndexedArtifact};
use holo_index_core::store::{top_k_neighbors, ArtifactStore, Neighbor, StoreStats};

/// SQLite implementation of the [`ArtifactStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_id(row: &SqliteRow) -> ArtifactId {
    let path: String = row.get("path");
    let symbol: Option<String> = row.get("symbol");
    let start: Option<i64> = row.get("line_start");
    let end: Option<i64> = row.get("line_end");
    let lines = match (start, end) {
        (Some(s), Some(e)) => Some((s as u32, e as u32)),
        _ => None,
    };
    ArtifactId {
        path,
        symbol,
        lines,
    }
}

fn row_kind(row: &SqliteRow) -> ArtifactKind {
    let kind: String = row.get("kind");
    kind.parse().unwrap_or(ArtifactKind::Code)
}

fn row_artifact(row: &SqliteRow) -> IndexedArtifact {
    let blob: Vec<u8> = row.get("embedding");
    IndexedArtifact {
        id: row_id(row),
        content_hash: row.get("content_hash"),
        embedding: blob_to_vec(&blob),
        kind: row_kind(row),
        last_indexed: row.get("last_indexed"),
        excerpt: row.get("excerpt"),
        model: row.get("model"),
    }
}

const ARTIFACT_COLUMNS: &str = "id, path, symbol, line_start, line_end, kind, content_hash, \
     excerpt, model, embedding, last_indexed";

#[async_trait]
impl ArtifactStore for SqliteStore {
    async fn upsert_artifact(&self, artifact: &IndexedArtifact) -> Result<()> {
        let blob = vec_to_blob(&artifact.embedding);
        sqlx::query(
            r#"
            INSERT INTO artifacts (id, path, symbol, line_start, line_end, kind,
                                   content_hash, excerpt, model, dims, embedding, last_indexed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                line_start = excluded.line_start,
                line_end = excluded.line_end,
                content_hash = excluded.content_hash,
                excerpt = excluded.excerpt,
                model = excluded.model,
                dims = excluded.dims,
                embedding = excluded.embedding,
                last_indexed = excluded.last_indexed
            "#,
        )
        .bind(artifact.id.to_string())
        .bind(&artifact.id.path)
        .bind(&artifact.id.symbol)
        .bind(artifact.id.lines.map(|l| l.0 as i64))
        .bind(artifact.id.lines.map(|l| l.1 as i64))
        .bind(artifact.kind.as_str())
        .bind(&artifact.content_hash)
        .bind(&artifact.excerpt)
        .bind(&artifact.model)
        .bind(artifact.embedding.len() as i64)
        .bind(&blob)
        .bind(artifact.last_indexed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_artifact(&self, id: &ArtifactId) -> Result<Option<IndexedArtifact>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM artifacts WHERE id = ?",
            ARTIFACT_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_artifact))
    }

    async fn list_artifact_ids(&self) -> Result<Vec<ArtifactId>> {
        let rows = sqlx::query("SELECT path, symbol, line_start, line_end FROM artifacts")
            .fetch_all(&self.pool)
            .await?;
        let mut ids: Vec<ArtifactId> = rows.iter().map(row_id).collect();
        ids.sort();
        Ok(ids)
    }

    async fn remove_artifacts(&self, ids: &[ArtifactId]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0usize;
        for id in ids {
            let result = sqlx::query("DELETE FROM artifacts WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn vector_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let rows = sqlx::query(
            "SELECT path, symbol, line_start, line_end, kind, excerpt, embedding \
             FROM artifacts WHERE dims = ?",
        )
        .bind(query_vec.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<(ArtifactId, Vec<f32>, ArtifactKind, String)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                (
                    row_id(row),
                    blob_to_vec(&blob),
                    row_kind(row),
                    row.get::<String, _>("excerpt"),
                )
            })
            .collect();

        Ok(top_k_neighbors(
            query_vec,
            candidates
                .iter()
                .map(|(id, v, kind, excerpt)| (id, v.as_slice(), *kind, excerpt.as_str())),
            k,
        ))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total_artifacts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifacts")
            .fetch_one(&self.pool)
            .await?;
        let files: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM artifacts WHERE symbol IS NULL AND line_start IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let mut stats = StoreStats {
            total_artifacts,
            files,
            ..StoreStats::default()
        };

        let kind_rows = sqlx::query("SELECT kind, COUNT(*) AS n FROM artifacts GROUP BY kind")
            .fetch_all(&self.pool)
            .await?;
        for row in &kind_rows {
            let n: i64 = row.get("n");
            match row_kind(row) {
                ArtifactKind::Code => stats.code += n,
                ArtifactKind::Documentation => stats.documentation += n,
                ArtifactKind::WspProtocol => stats.wsp_protocol += n,
            }
        }

        stats.models = sqlx::query_scalar("SELECT DISTINCT model FROM artifacts ORDER BY model")
            .fetch_all(&self.pool)
            .await?;
        stats.last_indexed = sqlx::query_scalar("SELECT MAX(last_indexed) FROM artifacts")
            .fetch_one(&self.pool)
            .await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> SqliteStore {
        let mut cfg = Config::minimal();
        cfg.db.path = tmp.path().join("holo.sqlite");
        crate::migrate::run_migrations(&cfg).await.unwrap();
        SqliteStore::new(crate::db::connect(&cfg).await.unwrap())
    }

    fn artifact(id: ArtifactId, embedding: Vec<f32>) -> IndexedArtifact {
        IndexedArtifact {
            excerpt: format!("excerpt of {}", id),
            id,
            content_hash: "abc".into(),
            embedding,
            kind: ArtifactKind::Code,
            last_indexed: 1_700_000_000,
            model: "test-model".into(),
        }
    }

    #[tokio::test]
    async fn test_upsert_get_and_search() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        let file = ArtifactId::file("modules/a/src/core.py");
        let span = ArtifactId::span("modules/a/src/core.py", Some("Core.run"), 4, 12);
        store
            .upsert_artifact(&artifact(file.clone(), vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert_artifact(&artifact(span.clone(), vec![0.0, 1.0]))
            .await
            .unwrap();

        let got = store.get_artifact(&span).await.unwrap().unwrap();
        assert_eq!(got.id, span);
        assert_eq!(got.embedding, vec![0.0, 1.0]);

        let hits = store.vector_search(&[0.1, 0.9], 5).await.unwrap();
        assert_eq!(hits[0].artifact_id, span);
        assert_eq!(hits[1].artifact_id, file);
    }

    #[tokio::test]
    async fn test_vector_search_skips_other_dims() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .upsert_artifact(&artifact(ArtifactId::file("a.py"), vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert!(store.vector_search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_stats() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store
            .upsert_artifact(&artifact(ArtifactId::file("a.py"), vec![1.0]))
            .await
            .unwrap();
        let mut doc = artifact(ArtifactId::span("README.md", None, 1, 9), vec![1.0]);
        doc.kind = ArtifactKind::Documentation;
        store.upsert_artifact(&doc).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_artifacts, 2);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.code, 1);
        assert_eq!(stats.documentation, 1);
        assert_eq!(stats.models, vec!["test-model".to_string()]);
        assert_eq!(stats.last_indexed, Some(1_700_000_000));

        let removed = store
            .remove_artifacts(&[ArtifactId::file("a.py")])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            store.list_artifact_ids().await.unwrap(),
            vec![ArtifactId::span("README.md", None, 1, 9)]
        );
    }
}
