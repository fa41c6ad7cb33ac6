//! Core data models used throughout HoloIndex.
//!
//! These types represent the curated mappings, indexed artifacts, and
//! search results that flow through the retrieval pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Normalize a repository-relative path: forward slashes, no leading `./`.
pub fn normalize_rel_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut s = unified.as_str();
    while let Some(rest) = s.strip_prefix("./") {
        s = rest;
    }
    s.trim_end_matches('/').to_string()
}

/// SHA-256 hex digest of `text`, used to detect changed artifacts.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A curated `problem description → code location` association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Natural-language problem description, as written by the maintainer.
    pub query_pattern: String,
    /// `path` or `path:Symbol.method`.
    pub target_reference: String,
}

impl MappingEntry {
    pub fn new(query_pattern: impl Into<String>, target_reference: impl Into<String>) -> Self {
        Self {
            query_pattern: query_pattern.into(),
            target_reference: target_reference.into(),
        }
    }

    pub fn target(&self) -> TargetReference {
        TargetReference::parse(&self.target_reference)
    }
}

/// Parsed form of [`MappingEntry::target_reference`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetReference {
    pub path: String,
    pub symbol: Option<String>,
}

impl TargetReference {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().split_once(':') {
            Some((path, symbol)) if !symbol.trim().is_empty() => Self {
                path: normalize_rel_path(path),
                symbol: Some(symbol.trim().to_string()),
            },
            Some((path, _)) => Self {
                path: normalize_rel_path(path),
                symbol: None,
            },
            None => Self {
                path: normalize_rel_path(raw),
                symbol: None,
            },
        }
    }

    /// The artifact this reference resolves to when indexed.
    pub fn artifact_id(&self) -> ArtifactId {
        ArtifactId {
            path: self.path.clone(),
            symbol: self.symbol.clone(),
            lines: None,
        }
    }
}

/// Identity of one indexed unit: a file, or a symbol / line span inside it.
///
/// Canonical string form is `path[:symbol][#Lstart-end]`, e.g.
/// `modules/communication/livechat/src/livechat_core.py:LiveChatCore.poll#L40-88`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    pub path: String,
    pub symbol: Option<String>,
    /// Inclusive, 1-based line range.
    pub lines: Option<(u32, u32)>,
}

impl ArtifactId {
    pub fn file(path: &str) -> Self {
        Self {
            path: normalize_rel_path(path),
            symbol: None,
            lines: None,
        }
    }

    pub fn span(path: &str, symbol: Option<&str>, start: u32, end: u32) -> Self {
        Self {
            path: normalize_rel_path(path),
            symbol: symbol.map(str::to_string),
            lines: Some((start, end.max(start))),
        }
    }

    /// True if `other` is this artifact or lies entirely inside it.
    ///
    /// A whole-file id covers every span of that file. A symbol id covers
    /// the same symbol and its nested members (`Class` covers `Class.method`).
    pub fn covers(&self, other: &ArtifactId) -> bool {
        if self.path != other.path {
            return false;
        }
        if let Some(sym) = &self.symbol {
            return match &other.symbol {
                Some(o) => o == sym || o.starts_with(&format!("{sym}.")),
                None => lines_contain(self.lines, other.lines),
            };
        }
        match self.lines {
            None => true,
            Some(_) => lines_contain(self.lines, other.lines),
        }
    }
}

fn lines_contain(outer: Option<(u32, u32)>, inner: Option<(u32, u32)>) -> bool {
    match (outer, inner) {
        (Some(a), Some(b)) => a.0 <= b.0 && b.1 <= a.1,
        _ => false,
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(sym) = &self.symbol {
            write!(f, ":{}", sym)?;
        }
        if let Some((start, end)) = self.lines {
            write!(f, "#L{}-{}", start, end)?;
        }
        Ok(())
    }
}

impl FromStr for ArtifactId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty artifact id");
        }

        let (head, lines) = match s.rfind("#L") {
            Some(pos) => {
                let range = &s[pos + 2..];
                let (a, b) = range
                    .split_once('-')
                    .ok_or_else(|| anyhow::anyhow!("malformed line range in '{}'", s))?;
                let start: u32 = a.parse()?;
                let end: u32 = b.parse()?;
                (&s[..pos], Some((start, end)))
            }
            None => (s, None),
        };

        let target = TargetReference::parse(head);
        Ok(ArtifactId {
            path: target.path,
            symbol: target.symbol,
            lines,
        })
    }
}

/// What kind of content an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Code,
    Documentation,
    WspProtocol,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Code => "code",
            ArtifactKind::Documentation => "documentation",
            ArtifactKind::WspProtocol => "wsp_protocol",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ArtifactKind::Code),
            "documentation" => Ok(ArtifactKind::Documentation),
            "wsp_protocol" => Ok(ArtifactKind::WspProtocol),
            other => anyhow::bail!("unknown artifact kind: {}", other),
        }
    }
}

/// One embedded unit of the index.
#[derive(Debug, Clone)]
pub struct IndexedArtifact {
    pub id: ArtifactId,
    /// SHA-256 hex of the span text; drives change detection.
    pub content_hash: String,
    pub embedding: Vec<f32>,
    pub kind: ArtifactKind,
    /// Unix seconds.
    pub last_indexed: i64,
    /// Leading text of the span, used for snippets.
    pub excerpt: String,
    /// Embedding model that produced [`embedding`](Self::embedding).
    pub model: String,
}

/// Where a [`SearchResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    CuratedMapping,
    SemanticEmbedding,
}

impl MatchOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOrigin::CuratedMapping => "curated_mapping",
            MatchOrigin::SemanticEmbedding => "semantic_embedding",
        }
    }
}

/// A ranked candidate, produced per query and discarded after rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub source_artifact_id: String,
    /// Normalized to `[0.0, 1.0]`.
    pub relevance_score: f64,
    pub match_origin: MatchOrigin,
    pub snippet: String,
    /// Curated target that does not resolve to an existing file.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale_reference: bool,
    /// The mapping pattern that produced a curated result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}

/// Result of a module existence check. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleExistenceRecord {
    pub queried_path: String,
    /// Repository-relative location the query resolved to, if any.
    pub resolved_path: Option<String>,
    pub exists: bool,
    pub has_readme: bool,
    pub has_tests: bool,
    /// Companion documents found next to the module (README, INTERFACE, ModLog).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<String>,
}

impl ModuleExistenceRecord {
    pub fn missing(queried_path: &str) -> Self {
        Self {
            queried_path: queried_path.to_string(),
            resolved_path: None,
            exists: false,
            has_readme: false,
            has_tests: false,
            docs: Vec::new(),
        }
    }
}
