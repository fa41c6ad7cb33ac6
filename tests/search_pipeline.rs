//! End-to-end tests of the search pipeline through the library API.
//!
//! The embedding index is an [`InMemoryStore`] seeded with vectors from a
//! deterministic bag-of-words provider, so similarity is predictable and no
//! network or model download is involved.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use holo_index::gate::ModuleGate;
use holo_index::mappings::{FsResolver, MappingSource};
use holo_index::search::{SearchEngine, SearchSettings, SemanticBackend};
use holo_index_core::composer::{Degradation, Outcome};
use holo_index_core::embedding::EmbeddingProvider;
use holo_index_core::mapping::MappingTable;
use holo_index_core::models::{ArtifactId, ArtifactKind, IndexedArtifact, MatchOrigin, MappingEntry};
use holo_index_core::store::memory::InMemoryStore;
use holo_index_core::store::ArtifactStore;
use holo_index_core::HoloError;

const DIMS: usize = 32;

const LIVECHAT_CORE: &str = "modules/communication/livechat/src/livechat_core.py";
const APP_TSX: &str = "modules/communication/livechat/src/App.tsx";
const BANTER: &str = "modules/gamification/banter/src/banter_engine.py";

// ─── Test providers ─────────────────────────────────────────────────

/// Hash each lowercase word into one of `DIMS` buckets.
fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        v[bucket % DIMS] += 1.0;
    }
    v
}

struct BagProvider;

#[async_trait]
impl EmbeddingProvider for BagProvider {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

struct OfflineProvider;

#[async_trait]
impl EmbeddingProvider for OfflineProvider {
    fn model_name(&self) -> &str {
        "offline"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow!("connection refused"))
    }
}

struct SlowProvider;

#[async_trait]
impl EmbeddingProvider for SlowProvider {
    fn model_name(&self) -> &str {
        "slow"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn write_repo(root: &Path) {
    let src = root.join("modules/communication/livechat/src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(root.join("modules/communication/livechat/tests")).unwrap();
    fs::write(
        root.join("modules/communication/livechat/README.md"),
        "# LiveChat\n",
    )
    .unwrap();
    fs::write(
        src.join("livechat_core.py"),
        "class LiveChatCore:\n    def moderate(self, message):\n        return message\n",
    )
    .unwrap();
    fs::write(
        src.join("App.tsx"),
        "export default function App() {\n  return <ChatModerationPanel />;\n}\n",
    )
    .unwrap();
}

fn artifact(id: ArtifactId, text: &str, kind: ArtifactKind) -> IndexedArtifact {
    IndexedArtifact {
        id,
        content_hash: holo_index_core::models::content_hash(text),
        embedding: bag_of_words(text),
        kind,
        last_indexed: 1_700_000_000,
        excerpt: text.to_string(),
        model: "bag-of-words".to_string(),
    }
}

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let artifacts = [
        artifact(
            ArtifactId::file(LIVECHAT_CORE),
            "youtube chat moderation live chat core",
            ArtifactKind::Code,
        ),
        artifact(
            ArtifactId::span(LIVECHAT_CORE, Some("LiveChatCore.moderate"), 2, 3),
            "youtube chat moderation moderate message",
            ArtifactKind::Code,
        ),
        artifact(
            ArtifactId::file(APP_TSX),
            "chat moderation panel youtube app",
            ArtifactKind::Code,
        ),
        artifact(
            ArtifactId::file("WSP_framework/src/WSP_50.md"),
            "pre action verification protocol",
            ArtifactKind::WspProtocol,
        ),
    ];
    for a in &artifacts {
        store.upsert_artifact(a).await.unwrap();
    }
    store
}

fn mapping_table() -> MappingTable {
    let mut table = MappingTable::new();
    table.insert(MappingEntry::new("YouTube chat moderation", LIVECHAT_CORE));
    table.insert(MappingEntry::new("banter engine responses", BANTER));
    table
}

fn settings() -> SearchSettings {
    SearchSettings {
        default_limit: 5,
        candidate_k: 10,
        timeout: Duration::from_secs(2),
        snippet_chars: 200,
        fuzzy_threshold: 0.3,
    }
}

fn engine_with(
    root: &Path,
    semantic: SemanticBackend,
    curated: MappingSource,
    settings: SearchSettings,
) -> SearchEngine {
    SearchEngine::new(
        semantic,
        curated,
        FsResolver::new(root),
        ModuleGate::new(root, &[PathBuf::from("modules")]),
        settings,
    )
}

async fn ready_engine(root: &Path, provider: Arc<dyn EmbeddingProvider>) -> SearchEngine {
    let store: Arc<dyn ArtifactStore> = seeded_store().await;
    engine_with(
        root,
        SemanticBackend::Ready { store, provider },
        MappingSource::from_table(mapping_table()),
        settings(),
    )
}

fn repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());
    tmp
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_curated_answer_ranks_first_and_absorbs_semantic_duplicates() {
    let tmp = repo();
    let engine = ready_engine(tmp.path(), Arc::new(BagProvider)).await;

    let report = engine
        .search("YouTube chat moderation", None)
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::Results);
    assert!(report.degraded.is_empty());

    let first = &report.results[0];
    assert_eq!(first.source_artifact_id, LIVECHAT_CORE);
    assert_eq!(first.match_origin, MatchOrigin::CuratedMapping);
    assert_eq!(first.relevance_score, 1.0);

    // The file and its method span are covered by the curated target.
    let livechat_hits = report
        .results
        .iter()
        .filter(|r| r.source_artifact_id.starts_with(LIVECHAT_CORE))
        .count();
    assert_eq!(livechat_hits, 1);

    let app = report
        .results
        .iter()
        .position(|r| r.source_artifact_id == APP_TSX)
        .expect("App.tsx should follow as a semantic result");
    assert!(app > 0);
    assert_eq!(report.results[app].match_origin, MatchOrigin::SemanticEmbedding);
}

#[tokio::test]
async fn test_semantic_results_never_outrank_curated() {
    let tmp = repo();
    let engine = ready_engine(tmp.path(), Arc::new(BagProvider)).await;

    // Fuzzy curated hit with a modest score; semantic hits score higher.
    let report = engine.search("chat moderation panel", None).await.unwrap();

    let origins: Vec<MatchOrigin> = report.results.iter().map(|r| r.match_origin).collect();
    let first_semantic = origins
        .iter()
        .position(|o| *o == MatchOrigin::SemanticEmbedding)
        .unwrap();
    assert!(origins[..first_semantic]
        .iter()
        .all(|o| *o == MatchOrigin::CuratedMapping));
    assert!(origins[first_semantic..]
        .iter()
        .all(|o| *o == MatchOrigin::SemanticEmbedding));
    assert_eq!(origins[0], MatchOrigin::CuratedMapping);
}

#[tokio::test]
async fn test_identical_queries_produce_identical_reports() {
    let tmp = repo();
    let engine = ready_engine(tmp.path(), Arc::new(BagProvider)).await;

    let a = engine.search("chat moderation", Some(4)).await.unwrap();
    let b = engine.search("chat moderation", Some(4)).await.unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    assert_eq!(a.render_text(), b.render_text());
}

#[tokio::test]
async fn test_unreachable_provider_degrades_to_curated_only() {
    let tmp = repo();
    let engine = ready_engine(tmp.path(), Arc::new(OfflineProvider)).await;

    let report = engine
        .search("YouTube chat moderation", None)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].match_origin, MatchOrigin::CuratedMapping);
    assert!(matches!(
        &report.degraded[..],
        [Degradation::SemanticUnavailable { reason }] if reason.contains("connection refused")
    ));
    assert!(report.render_text().contains("curated-mapping-only results shown"));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let tmp = repo();
    let store: Arc<dyn ArtifactStore> = seeded_store().await;
    let engine = engine_with(
        tmp.path(),
        SemanticBackend::Ready {
            store,
            provider: Arc::new(SlowProvider),
        },
        MappingSource::from_table(mapping_table()),
        SearchSettings {
            timeout: Duration::from_millis(50),
            ..settings()
        },
    );

    let started = std::time::Instant::now();
    let report = engine
        .search("YouTube chat moderation", None)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(report.results.len(), 1);
    assert_eq!(
        report.degraded,
        vec![Degradation::SemanticTimeout { timeout_ms: 50 }]
    );
}

#[tokio::test]
async fn test_nothing_matches_is_an_empty_report() {
    let tmp = repo();
    let engine = engine_with(
        tmp.path(),
        SemanticBackend::Ready {
            store: Arc::new(InMemoryStore::new()),
            provider: Arc::new(BagProvider),
        },
        MappingSource::from_table(mapping_table()),
        settings(),
    );

    let report = engine.search("quantum flux capacitor", None).await.unwrap();
    assert_eq!(report.outcome, Outcome::NoKnownAnswer);
    assert!(report.results.is_empty());
    assert!(report.degraded.is_empty());
}

#[tokio::test]
async fn test_both_stores_unavailable_is_infrastructure_failure() {
    let tmp = repo();
    let engine = engine_with(
        tmp.path(),
        SemanticBackend::Unavailable("index database not found".to_string()),
        MappingSource::from_file(tmp.path().join("missing.toml")),
        settings(),
    );

    let err = engine
        .search("YouTube chat moderation", None)
        .await
        .unwrap_err();
    match err {
        HoloError::InfrastructureFailure { curated, semantic } => {
            assert!(curated.contains("missing.toml"));
            assert_eq!(semantic, "index database not found");
        }
        other => panic!("expected InfrastructureFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_mappings_degrade_to_semantic_only() {
    let tmp = repo();
    let store: Arc<dyn ArtifactStore> = seeded_store().await;
    let engine = engine_with(
        tmp.path(),
        SemanticBackend::Ready {
            store,
            provider: Arc::new(BagProvider),
        },
        MappingSource::from_file(tmp.path().join("missing.toml")),
        settings(),
    );

    let report = engine
        .search("YouTube chat moderation", None)
        .await
        .unwrap();
    assert!(!report.results.is_empty());
    assert!(report
        .results
        .iter()
        .all(|r| r.match_origin == MatchOrigin::SemanticEmbedding));
    assert!(matches!(
        &report.degraded[..],
        [Degradation::CuratedUnavailable { .. }]
    ));
}

#[tokio::test]
async fn test_stale_mapping_target_is_flagged() {
    let tmp = repo();
    let engine = ready_engine(tmp.path(), Arc::new(BagProvider)).await;

    let report = engine
        .search("banter engine responses", Some(1))
        .await
        .unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].source_artifact_id, BANTER);
    assert!(report.results[0].stale_reference);
}

#[tokio::test]
async fn test_limit_bounds_result_count() {
    let tmp = repo();
    let engine = ready_engine(tmp.path(), Arc::new(BagProvider)).await;

    let report = engine
        .search("YouTube chat moderation", Some(1))
        .await
        .unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.limit, 1);

    let err = engine.search("chat", Some(0)).await.unwrap_err();
    assert!(err.is_input_error());
}

#[tokio::test]
async fn test_existing_module_in_query_adds_advisory() {
    let tmp = repo();
    let engine = ready_engine(tmp.path(), Arc::new(BagProvider)).await;

    let report = engine
        .search("add reconnect logic to communication/livechat", None)
        .await
        .unwrap();
    let advisory = report.advisory.expect("advisory for existing module");
    assert_eq!(advisory.modules.len(), 1);
    let module = &advisory.modules[0];
    assert_eq!(
        module.resolved_path.as_deref(),
        Some("modules/communication/livechat")
    );
    assert!(module.has_readme);
    assert!(module.has_tests);

    let plain = engine.search("chat moderation", None).await.unwrap();
    assert!(plain.advisory.is_none());
}

#[tokio::test]
async fn test_mapping_reload_is_visible_to_next_query() {
    let tmp = repo();
    let mapping_path = tmp.path().join("holo_mappings.json");
    fs::write(
        &mapping_path,
        format!(r#"{{"youtube chat moderation": "{}"}}"#, LIVECHAT_CORE),
    )
    .unwrap();

    let engine = engine_with(
        tmp.path(),
        SemanticBackend::Disabled,
        MappingSource::from_file(&mapping_path),
        settings(),
    );

    let before = engine.search("chat ui entry point", None).await.unwrap();
    assert_eq!(before.outcome, Outcome::NoKnownAnswer);

    fs::write(
        &mapping_path,
        format!(
            r#"{{"youtube chat moderation": "{}", "chat ui entry point": "{}"}}"#,
            LIVECHAT_CORE, APP_TSX
        ),
    )
    .unwrap();
    assert_eq!(engine.mappings().reload().unwrap(), 2);

    let after = engine.search("chat ui entry point", None).await.unwrap();
    assert_eq!(after.results[0].source_artifact_id, APP_TSX);
    assert!(!after.results[0].stale_reference);
}

#[tokio::test]
async fn test_broken_mapping_file_keeps_previous_table() {
    let tmp = repo();
    let mapping_path = tmp.path().join("holo_mappings.toml");
    fs::write(
        &mapping_path,
        format!(
            "[[mapping]]\nquery = \"youtube chat moderation\"\ntarget = \"{}\"\n",
            LIVECHAT_CORE
        ),
    )
    .unwrap();

    let engine = engine_with(
        tmp.path(),
        SemanticBackend::Disabled,
        MappingSource::from_file(&mapping_path),
        settings(),
    );

    fs::write(&mapping_path, "[[mapping]\nquery = ").unwrap();
    assert!(engine.mappings().reload().is_err());

    let report = engine
        .search("youtube chat moderation", None)
        .await
        .unwrap();
    assert_eq!(report.results[0].source_artifact_id, LIVECHAT_CORE);
}
