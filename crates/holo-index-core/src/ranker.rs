//! Relevance ranker: merges curated and semantic candidates.
//!
//! The ranker never mixes tiers. Curated mappings are human-verified, so
//! every curated result is placed ahead of every semantic result no matter
//! what the raw scores say.
//!
//! # Algorithm
//!
//! 1. Curated tier: drop repeated ids, sort by score (desc), id (asc).
//! 2. Semantic tier: drop any result whose artifact equals or lies inside a
//!    curated result's artifact; keep the best-scoring copy of repeated ids;
//!    sort by score (desc), id (asc).
//! 3. Concatenate curated ++ semantic and truncate to `limit`.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{ArtifactId, MatchOrigin, SearchResult};
use crate::store::Neighbor;

/// Turn nearest-neighbor hits into semantic [`SearchResult`]s.
pub fn semantic_results(neighbors: Vec<Neighbor>) -> Vec<SearchResult> {
    neighbors
        .into_iter()
        .map(|n| SearchResult {
            source_artifact_id: n.artifact_id.to_string(),
            relevance_score: n.similarity.clamp(0.0, 1.0),
            match_origin: MatchOrigin::SemanticEmbedding,
            snippet: n.excerpt,
            stale_reference: false,
            matched_pattern: None,
        })
        .collect()
}

/// Merge both tiers into one ordered, deduplicated list of at most `limit`.
pub fn rank(
    curated: Vec<SearchResult>,
    semantic: Vec<SearchResult>,
    limit: usize,
) -> Vec<SearchResult> {
    let curated = sort_tier(dedup_by_id(curated));

    let curated_ids: Vec<(String, Option<ArtifactId>)> = curated
        .iter()
        .map(|r| {
            (
                r.source_artifact_id.clone(),
                r.source_artifact_id.parse::<ArtifactId>().ok(),
            )
        })
        .collect();

    let semantic: Vec<SearchResult> = semantic
        .into_iter()
        .filter(|r| !shadowed_by_curated(&r.source_artifact_id, &curated_ids))
        .collect();
    // Sort before dedup so the surviving copy is the best-scoring one.
    let semantic = dedup_by_id(sort_tier(semantic));

    let mut merged = curated;
    merged.extend(semantic);
    merged.truncate(limit);
    merged
}

fn shadowed_by_curated(id: &str, curated: &[(String, Option<ArtifactId>)]) -> bool {
    let parsed = id.parse::<ArtifactId>().ok();
    curated.iter().any(|(raw, cid)| {
        if raw == id {
            return true;
        }
        match (cid, &parsed) {
            (Some(c), Some(p)) => c.covers(p),
            _ => false,
        }
    })
}

fn dedup_by_id(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.source_artifact_id.clone()))
        .collect()
}

fn sort_tier(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.source_artifact_id.cmp(&b.source_artifact_id))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curated(id: &str, score: f64) -> SearchResult {
        SearchResult {
            source_artifact_id: id.to_string(),
            relevance_score: score,
            match_origin: MatchOrigin::CuratedMapping,
            snippet: String::new(),
            stale_reference: false,
            matched_pattern: Some("p".into()),
        }
    }

    fn semantic(id: &str, score: f64) -> SearchResult {
        SearchResult {
            source_artifact_id: id.to_string(),
            relevance_score: score,
            match_origin: MatchOrigin::SemanticEmbedding,
            snippet: String::new(),
            stale_reference: false,
            matched_pattern: None,
        }
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results
            .iter()
            .map(|r| r.source_artifact_id.as_str())
            .collect()
    }

    #[test]
    fn test_curated_outranks_higher_semantic_score() {
        let out = rank(
            vec![curated("a.py", 0.31)],
            vec![semantic("b.py", 0.99)],
            5,
        );
        assert_eq!(ids(&out), vec!["a.py", "b.py"]);
        assert_eq!(out[0].match_origin, MatchOrigin::CuratedMapping);
    }

    #[test]
    fn test_semantic_duplicate_of_curated_dropped() {
        let out = rank(
            vec![curated("src/livechat_core.py", 1.0)],
            vec![
                semantic("src/livechat_core.py", 0.95),
                semantic("src/livechat_core.py:LiveChat.poll#L10-40", 0.9),
                semantic("app/App.tsx", 0.7),
            ],
            5,
        );
        assert_eq!(ids(&out), vec!["src/livechat_core.py", "app/App.tsx"]);
    }

    #[test]
    fn test_symbol_curated_keeps_other_spans_of_same_file() {
        let out = rank(
            vec![curated("src/core.py:Core", 1.0)],
            vec![
                semantic("src/core.py:Core.run#L5-9", 0.9),
                semantic("src/core.py:helper#L50-60", 0.8),
            ],
            5,
        );
        assert_eq!(ids(&out), vec!["src/core.py:Core", "src/core.py:helper#L50-60"]);
    }

    #[test]
    fn test_within_tier_score_then_id() {
        let out = rank(
            Vec::new(),
            vec![
                semantic("c.py", 0.5),
                semantic("b.py", 0.8),
                semantic("a.py", 0.5),
            ],
            5,
        );
        assert_eq!(ids(&out), vec!["b.py", "a.py", "c.py"]);
    }

    #[test]
    fn test_repeated_semantic_id_keeps_best() {
        let out = rank(
            Vec::new(),
            vec![semantic("a.py", 0.4), semantic("a.py", 0.9)],
            5,
        );
        assert_eq!(out.len(), 1);
        assert!((out[0].relevance_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_truncates_to_limit() {
        let out = rank(
            vec![curated("a.py", 1.0)],
            vec![semantic("b.py", 0.9), semantic("c.py", 0.8)],
            2,
        );
        assert_eq!(ids(&out), vec!["a.py", "b.py"]);
    }

    #[test]
    fn test_empty_is_empty() {
        assert!(rank(Vec::new(), Vec::new(), 5).is_empty());
    }

    #[test]
    fn test_deterministic_across_input_order() {
        let a = rank(
            vec![curated("x.py", 0.6)],
            vec![semantic("m.py", 0.5), semantic("k.py", 0.5), semantic("z.py", 0.7)],
            10,
        );
        let b = rank(
            vec![curated("x.py", 0.6)],
            vec![semantic("z.py", 0.7), semantic("k.py", 0.5), semantic("m.py", 0.5)],
            10,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_semantic_results_conversion() {
        let out = semantic_results(vec![Neighbor {
            artifact_id: ArtifactId::span("a.py", Some("f"), 1, 3),
            similarity: 0.8,
            kind: crate::models::ArtifactKind::Code,
            excerpt: "def f():".into(),
        }]);
        assert_eq!(out[0].source_artifact_id, "a.py:f#L1-3");
        assert_eq!(out[0].match_origin, MatchOrigin::SemanticEmbedding);
        assert_eq!(out[0].snippet, "def f():");
    }
}
