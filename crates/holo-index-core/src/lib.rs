//! # HoloIndex Core
//!
//! Shared retrieval logic for HoloIndex: data model, curated mapping table,
//! token-Jaccard fuzzy scoring, artifact store abstraction, relevance
//! ranking, and report composition.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Anything that
//! touches the disk (module gate, mapping file loading, indexing) or the
//! network (embedding providers) lives in the `holo-index` app crate and
//! reaches the core through the [`store::ArtifactStore`],
//! [`embedding::EmbeddingProvider`] and [`mapping::ReferenceResolver`] traits.

pub mod composer;
pub mod embedding;
pub mod error;
pub mod fuzzy;
pub mod mapping;
pub mod models;
pub mod ranker;
pub mod store;

pub use error::HoloError;
