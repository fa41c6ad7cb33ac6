//! TOML configuration.
//!
//! Every section has defaults, so an empty file is a valid configuration
//! (disabled embeddings, curated-mapping-only search). Relative paths are
//! resolved against `project.root`.
//!
//! ```toml
//! [project]
//! root = "."
//!
//! [db]
//! path = "./data/holo.sqlite"
//!
//! [mappings]
//! path = "./holo_mappings.toml"
//! fuzzy_threshold = 0.3
//!
//! [embedding]
//! provider = "ollama"            # disabled | openai | ollama | local
//! model = "nomic-embed-text"
//! dims = 768
//! endpoint = "http://localhost:11434"
//!
//! [search]
//! default_limit = 5
//! candidate_k = 10
//! timeout_ms = 3000
//! snippet_chars = 200
//!
//! [index]
//! roots = ["modules", "WSP_framework"]
//!
//! [gate]
//! roots = ["modules"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use holo_index_core::composer::DEFAULT_SNIPPET_CHARS;
use holo_index_core::mapping::DEFAULT_FUZZY_THRESHOLD;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub mappings: MappingsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    /// Repository root. Everything HoloIndex reads is resolved inside it.
    #[serde(default = "default_project_root")]
    pub root: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_project_root(),
        }
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/holo.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct MappingsConfig {
    /// Curated mapping file (`.toml` or `.json`).
    #[serde(default = "default_mappings_path")]
    pub path: PathBuf,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for MappingsConfig {
    fn default() -> Self {
        Self {
            path: default_mappings_path(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

fn default_mappings_path() -> PathBuf {
    PathBuf::from("./holo_mappings.toml")
}
fn default_fuzzy_threshold() -> f64 {
    DEFAULT_FUZZY_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Service base URL. Defaults per provider.
    #[serde(default, alias = "url")]
    pub endpoint: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            endpoint: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Nearest neighbors requested from the embedding index.
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    /// Upper bound on the semantic branch (embed + nearest-neighbor query).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            candidate_k: default_candidate_k(),
            timeout_ms: default_timeout_ms(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_limit() -> usize {
    5
}
fn default_candidate_k() -> usize {
    10
}
fn default_timeout_ms() -> u64 {
    3000
}
fn default_snippet_chars() -> usize {
    DEFAULT_SNIPPET_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directories under `project.root` to index.
    #[serde(default = "default_index_roots")]
    pub roots: Vec<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Files larger than this are skipped.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Documentation chunk size, in characters.
    #[serde(default = "default_doc_chunk_chars")]
    pub doc_chunk_chars: usize,
    /// Stored excerpt length, in characters.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            roots: default_index_roots(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: default_max_file_bytes(),
            doc_chunk_chars: default_doc_chunk_chars(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_index_roots() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}
fn default_include_globs() -> Vec<String> {
    [
        "**/*.py", "**/*.rs", "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.md",
        "**/*.txt", "**/*.rst",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_max_file_bytes() -> u64 {
    1_000_000
}
fn default_doc_chunk_chars() -> usize {
    2800
}
fn default_excerpt_chars() -> usize {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct GateConfig {
    /// Allow-listed directories (relative to `project.root`) that module
    /// paths may resolve into.
    #[serde(default = "default_gate_roots")]
    pub roots: Vec<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            roots: default_gate_roots(),
        }
    }
}

fn default_gate_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("modules")]
}

impl Config {
    /// Configuration used when no config file is available.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Resolve a configured path against `project.root`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project.root.join(path)
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.db.path)
    }

    pub fn mappings_path(&self) -> PathBuf {
        self.resolve(&self.mappings.path)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // A relative project root is relative to the config file's directory.
    if config.project.root.is_relative() {
        if let Some(dir) = path.parent() {
            config.project.root = dir.join(&config.project.root);
        }
    }

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.mappings.fuzzy_threshold) {
        bail!("mappings.fuzzy_threshold must be in [0.0, 1.0]");
    }

    if config.search.default_limit < 1 {
        bail!("search.default_limit must be >= 1");
    }
    if config.search.candidate_k < 1 {
        bail!("search.candidate_k must be >= 1");
    }
    if config.search.timeout_ms < 1 {
        bail!("search.timeout_ms must be >= 1");
    }
    if config.search.snippet_chars < 10 {
        bail!("search.snippet_chars must be >= 10");
    }

    if config.index.doc_chunk_chars == 0 {
        bail!("index.doc_chunk_chars must be > 0");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}
