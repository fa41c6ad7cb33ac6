//! Result composer: turns a ranked list into a bounded, structured report.
//!
//! A [`Report`] has three sections: an existence advisory (present only when
//! the query names an existing module), the ranked results with their origin
//! tags, and a footer listing any degraded services. It serializes to JSON
//! as-is and renders to text through [`Report::render_text`].
//!
//! An empty result list is reported as [`Outcome::NoKnownAnswer`]; total
//! failure never reaches the composer (it is a
//! [`HoloError::InfrastructureFailure`](crate::error::HoloError)).

use serde::Serialize;
use std::fmt::Write;

use crate::models::{ModuleExistenceRecord, SearchResult};

/// Default per-result snippet cap, in characters.
pub const DEFAULT_SNIPPET_CHARS: usize = 200;

/// A backing service that was skipped or failed during this query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum Degradation {
    /// No embedding provider configured.
    SemanticDisabled,
    /// Embedding provider or vector store returned an error.
    SemanticUnavailable { reason: String },
    /// Embedding query exceeded the configured timeout.
    SemanticTimeout { timeout_ms: u64 },
    /// Mapping table could not be loaded.
    CuratedUnavailable { reason: String },
}

impl Degradation {
    pub fn note(&self) -> String {
        match self {
            Degradation::SemanticDisabled => {
                "semantic search disabled (no embedding provider configured); curated-mapping-only results shown".to_string()
            }
            Degradation::SemanticUnavailable { reason } => format!(
                "semantic search unavailable ({}); curated-mapping-only results shown",
                reason
            ),
            Degradation::SemanticTimeout { timeout_ms } => format!(
                "semantic search timed out after {} ms; curated-mapping-only results shown",
                timeout_ms
            ),
            Degradation::CuratedUnavailable { reason } => format!(
                "curated mappings unavailable ({}); semantic-only results shown",
                reason
            ),
        }
    }
}

/// Whether the query produced any candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Results,
    NoKnownAnswer,
}

/// Mandatory "read the docs first" notice for modules that already exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistenceAdvisory {
    pub message: String,
    pub modules: Vec<ModuleExistenceRecord>,
}

pub const ADVISORY_MESSAGE: &str =
    "Existing module found. Read its documentation (README, INTERFACE, ModLog) before creating new code; extend it instead of duplicating it.";

/// Rendering bounds.
#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    pub limit: usize,
    pub snippet_chars: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

/// The composed answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub query: String,
    pub limit: usize,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<ExistenceAdvisory>,
    pub results: Vec<SearchResult>,
    pub degraded: Vec<Degradation>,
}

/// Assemble a [`Report`], applying the result-count and snippet bounds.
pub fn compose(
    query: &str,
    modules: Vec<ModuleExistenceRecord>,
    mut results: Vec<SearchResult>,
    degraded: Vec<Degradation>,
    opts: ComposeOptions,
) -> Report {
    results.truncate(opts.limit);
    for r in &mut results {
        r.snippet = truncate_snippet(&r.snippet, opts.snippet_chars);
    }

    let existing: Vec<ModuleExistenceRecord> = modules.into_iter().filter(|m| m.exists).collect();
    let advisory = if existing.is_empty() {
        None
    } else {
        Some(ExistenceAdvisory {
            message: ADVISORY_MESSAGE.to_string(),
            modules: existing,
        })
    };

    let outcome = if results.is_empty() {
        Outcome::NoKnownAnswer
    } else {
        Outcome::Results
    };

    Report {
        query: query.to_string(),
        limit: opts.limit,
        outcome,
        advisory,
        results,
        degraded,
    }
}

/// Flatten whitespace and cap `text` at `max_chars` characters.
///
/// Truncated snippets end in `...`, which counts toward the cap.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    if max_chars <= 3 {
        return flat.chars().take(max_chars).collect();
    }
    let mut out: String = flat.chars().take(max_chars - 3).collect();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    out
}

impl Report {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Human-readable rendering. Identical reports render byte-identically.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "HoloIndex search: \"{}\"", self.query);
        let _ = writeln!(out);

        if let Some(advisory) = &self.advisory {
            let _ = writeln!(out, "[ADVISORY] {}", advisory.message);
            for m in &advisory.modules {
                let location = m.resolved_path.as_deref().unwrap_or(&m.queried_path);
                let _ = writeln!(
                    out,
                    "  - {}  (README: {}, tests: {})",
                    location,
                    yes_no(m.has_readme),
                    yes_no(m.has_tests)
                );
                if !m.docs.is_empty() {
                    let _ = writeln!(out, "    read first: {}", m.docs.join(", "));
                }
            }
            let _ = writeln!(out);
        }

        match self.outcome {
            Outcome::NoKnownAnswer => {
                let _ = writeln!(
                    out,
                    "No known answer: nothing in the curated mappings or the semantic index matched this query."
                );
            }
            Outcome::Results => {
                let _ = writeln!(
                    out,
                    "Results ({} shown, limit {}):",
                    self.results.len(),
                    self.limit
                );
                for (i, r) in self.results.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "{}. [{:.2}] {:<18} {}",
                        i + 1,
                        r.relevance_score,
                        r.match_origin.as_str(),
                        r.source_artifact_id
                    );
                    if let Some(pattern) = &r.matched_pattern {
                        let _ = writeln!(out, "    mapping: \"{}\"", pattern);
                    }
                    if r.stale_reference {
                        let _ = writeln!(
                            out,
                            "    warning: stale reference (target not found on disk)"
                        );
                    }
                    if !r.snippet.is_empty() {
                        let _ = writeln!(out, "    excerpt: \"{}\"", r.snippet);
                    }
                }
            }
        }

        if !self.degraded.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Notes:");
            for d in &self.degraded {
                let _ = writeln!(out, "  - {}", d.note());
            }
        }

        out
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
