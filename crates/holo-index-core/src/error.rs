//! Error taxonomy for the retrieval pipeline.
//!
//! Only conditions that prevent a report from being produced at all are
//! errors. Degraded services and stale mapping references are carried as
//! annotations on the [`Report`](crate::composer::Report) instead.

/// Fatal errors surfaced to the caller of `search` / `check_module`.
#[derive(Debug, thiserror::Error)]
pub enum HoloError {
    /// Empty or malformed query. Not retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Path rejected by the module gate (traversal, absolute, empty).
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Neither the curated mapping table nor the embedding index could be
    /// reached, so no result can be produced.
    #[error(
        "search infrastructure unavailable (curated mappings: {curated}; semantic index: {semantic}); retry once the services are reachable"
    )]
    InfrastructureFailure { curated: String, semantic: String },
}

impl HoloError {
    pub fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        HoloError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the system.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            HoloError::InvalidInput(_) | HoloError::InvalidPath { .. }
        )
    }
}

pub type HoloResult<T> = Result<T, HoloError>;
