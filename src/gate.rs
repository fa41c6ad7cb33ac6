//! Module existence gate.
//!
//! Answers "does this module already exist, and does it have docs and
//! tests?" before anyone writes new code. Accepts dotted module notation
//! (`modules.communication.livechat`) or a repository path
//! (`modules/communication/livechat`).
//!
//! Resolution never leaves the allow-listed roots (`gate.roots`):
//! - `..` segments, absolute paths and NUL bytes are rejected outright;
//! - every hit is canonicalized and must still lie under a canonical root,
//!   so a symlink cannot point the gate elsewhere.
//!
//! A bare single-segment name is also looked up one level deep
//! (`<root>/<domain>/<name>`), matching the `modules/<domain>/<module>`
//! layout.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use holo_index_core::models::{normalize_rel_path, ModuleExistenceRecord};
use holo_index_core::HoloError;

use crate::config::Config;

const DOC_NAMES: &[&str] = &["readme.md", "readme", "interface.md", "modlog.md"];
const TEST_DIRS: &[&str] = &["tests", "test"];
/// Query tokens checked per search.
const MAX_QUERY_CANDIDATES: usize = 8;

/// Filesystem-backed module gate over a fixed set of roots.
#[derive(Debug, Clone)]
pub struct ModuleGate {
    project_root: PathBuf,
    /// `(relative root, canonical absolute root)`; roots that do not exist
    /// are dropped.
    roots: Vec<(String, PathBuf)>,
}

impl ModuleGate {
    pub fn new(project_root: &Path, roots: &[PathBuf]) -> Self {
        let project_root = project_root
            .canonicalize()
            .unwrap_or_else(|_| project_root.to_path_buf());
        let roots = roots
            .iter()
            .filter_map(|r| {
                let abs = if r.is_absolute() {
                    r.clone()
                } else {
                    project_root.join(r)
                };
                let canonical = abs.canonicalize().ok()?;
                let rel = canonical
                    .strip_prefix(&project_root)
                    .map(|p| normalize_rel_path(&p.to_string_lossy()))
                    .unwrap_or_default();
                Some((rel, canonical))
            })
            .collect();
        Self {
            project_root,
            roots,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.project.root, &config.gate.roots)
    }

    /// Check one module path.
    pub fn check_module(&self, raw: &str) -> Result<ModuleExistenceRecord, HoloError> {
        let segments = parse_module_path(raw)?;
        let queried = raw.trim().to_string();

        for candidate in self.candidates(&segments) {
            if let Some(record) = self.inspect(&queried, &candidate) {
                return Ok(record);
            }
        }
        Ok(ModuleExistenceRecord::missing(&queried))
    }

    /// Gate records for path-like tokens in a free-text query.
    ///
    /// Tokens that are not valid module paths are skipped; only modules
    /// that exist are returned, deduplicated by location.
    pub fn check_query(&self, query: &str) -> Vec<ModuleExistenceRecord> {
        let mut seen = BTreeSet::new();
        let mut records = Vec::new();
        for token in query_candidates(query) {
            match self.check_module(&token) {
                Ok(record) if record.exists => {
                    let key = record.resolved_path.clone().unwrap_or_default();
                    if seen.insert(key) {
                        records.push(record);
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(token = %token, error = %e, "skipping gate candidate"),
            }
        }
        records
    }

    /// Absolute paths to try, in priority order.
    fn candidates(&self, segments: &[String]) -> Vec<PathBuf> {
        let joined = segments.join("/");
        let mut out = Vec::new();

        for (rel_root, abs_root) in &self.roots {
            // Path written from the project root, e.g. `modules/x/y`.
            if !rel_root.is_empty() {
                if let Some(rest) = joined.strip_prefix(&format!("{}/", rel_root)) {
                    out.push(abs_root.join(rest));
                }
            }
            // Path written relative to the root, e.g. `x/y`.
            out.push(abs_root.join(&joined));

            if segments.len() == 1 {
                let mut domains: Vec<PathBuf> = std::fs::read_dir(abs_root)
                    .map(|rd| {
                        rd.filter_map(|e| e.ok())
                            .map(|e| e.path())
                            .filter(|p| p.is_dir())
                            .collect()
                    })
                    .unwrap_or_default();
                domains.sort();
                out.extend(domains.into_iter().map(|d| d.join(&segments[0])));
            }
        }
        out
    }

    fn inspect(&self, queried: &str, candidate: &Path) -> Option<ModuleExistenceRecord> {
        let canonical = candidate.canonicalize().ok()?;
        if !self.roots.iter().any(|(_, root)| canonical.starts_with(root)) {
            debug!(path = %canonical.display(), "candidate escapes gate roots");
            return None;
        }

        let module_dir = if canonical.is_dir() {
            canonical.clone()
        } else {
            canonical.parent()?.to_path_buf()
        };

        let docs = self.companion_docs(&module_dir);
        let has_readme = docs.iter().any(|d| {
            let name = d.rsplit('/').next().unwrap_or(d).to_ascii_lowercase();
            name == "readme.md" || name == "readme"
        });
        let has_tests = TEST_DIRS.iter().any(|t| module_dir.join(t).is_dir());

        Some(ModuleExistenceRecord {
            queried_path: queried.to_string(),
            resolved_path: Some(self.relative(&canonical)),
            exists: true,
            has_readme,
            has_tests,
            docs,
        })
    }

    fn companion_docs(&self, module_dir: &Path) -> Vec<String> {
        let mut docs: Vec<String> = std::fs::read_dir(module_dir)
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter(|e| e.path().is_file())
                    .filter(|e| {
                        let name = e.file_name().to_string_lossy().to_ascii_lowercase();
                        DOC_NAMES.contains(&name.as_str())
                    })
                    .map(|e| self.relative(&e.path()))
                    .collect()
            })
            .unwrap_or_default();
        docs.sort();
        docs
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.project_root).unwrap_or(path);
        normalize_rel_path(&rel.to_string_lossy())
    }
}

/// Validate a module path and split it into segments.
///
/// Slash paths are split on `/` (or `\`). Without a slash, dots separate
/// segments, except that a trailing known source/doc extension stays on
/// the last segment (`livechat_core.py`).
pub fn parse_module_path(raw: &str) -> Result<Vec<String>, HoloError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HoloError::invalid_path(raw, "empty path"));
    }
    if trimmed.contains('\0') {
        return Err(HoloError::invalid_path(raw, "contains NUL byte"));
    }

    let unified = trimmed.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(HoloError::invalid_path(raw, "absolute paths are not allowed"));
    }

    let segments: Vec<&str> = if unified.contains('/') {
        unified.split('/').collect()
    } else {
        split_dotted(&unified)
    };

    let mut out = Vec::with_capacity(segments.len());
    for (i, seg) in segments.iter().enumerate() {
        match *seg {
            ".." => return Err(HoloError::invalid_path(raw, "path traversal is not allowed")),
            "." => continue,
            "" if i + 1 == segments.len() && i > 0 => continue,
            "" => return Err(HoloError::invalid_path(raw, "empty path segment")),
            s => out.push(s.to_string()),
        }
    }
    if out.is_empty() {
        return Err(HoloError::invalid_path(raw, "empty path"));
    }
    Ok(out)
}

fn has_drive_prefix(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

fn split_dotted(s: &str) -> Vec<&str> {
    const KEEP_EXT: &[&str] = &["py", "rs", "ts", "tsx", "js", "jsx", "md", "txt", "json", "toml"];
    if s.contains("..") {
        // Surfaces as a traversal / empty-segment error.
        return s.split('.').map(|p| if p.is_empty() { ".." } else { p }).collect();
    }
    let mut parts: Vec<&str> = s.split('.').collect();
    if parts.len() >= 2 {
        let last = parts[parts.len() - 1];
        if KEEP_EXT.contains(&last.to_ascii_lowercase().as_str()) {
            let ext_start = s.len() - last.len() - 1;
            let head = &s[..ext_start];
            let stem_start = head.rfind('.').map(|i| i + 1).unwrap_or(0);
            parts.truncate(parts.len() - 2);
            parts.push(&s[stem_start..]);
        }
    }
    parts
}

/// Path-like or identifier-like tokens worth checking for a query.
pub fn query_candidates(query: &str) -> Vec<String> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_][A-Za-z0-9_./\\-]*").expect("static regex")
    });

    let mut seen = BTreeSet::new();
    re.find_iter(query)
        .map(|m| m.as_str().trim_end_matches(['.', '/', '\\']).to_string())
        .filter(|t| {
            let path_like = t.contains('/') || t.contains('\\') || t.contains('.');
            let ident_like = t.len() >= 4 && t.contains('_');
            path_like || ident_like
        })
        .filter(|t| seen.insert(t.clone()))
        .take(MAX_QUERY_CANDIDATES)
        .collect()
}

/// Run `holo check-module`.
pub fn run_check_module(config: &Config, path: &str, json: bool) -> anyhow::Result<()> {
    let gate = ModuleGate::from_config(config);
    let record = gate.check_module(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    if record.exists {
        println!(
            "module exists: {}",
            record.resolved_path.as_deref().unwrap_or(&record.queried_path)
        );
        println!("  README: {}", if record.has_readme { "yes" } else { "no" });
        println!("  tests:  {}", if record.has_tests { "yes" } else { "no" });
        if !record.docs.is_empty() {
            println!("  read first: {}", record.docs.join(", "));
        }
    } else {
        println!("module not found: {}", record.queried_path);
    }
    Ok(())
}
