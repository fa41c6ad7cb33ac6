//! # HoloIndex
//!
//! Semantic code retrieval for a large modular repository: answers a
//! natural-language query with a short, ranked list of code locations,
//! putting human-curated answers ahead of embedding similarity and warning
//! when the query names a module that already exists.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Module gate  │   │   Curated    │   │  Embedding   │
//! │ (filesystem) │   │   mappings   │   │ index (SQL)  │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  └────────┬─────────┘
//!        │                           ▼
//!        │                    ┌──────────────┐
//!        │                    │    Ranker    │
//!        │                    └──────┬───────┘
//!        └──────────────┬────────────┘
//!                       ▼
//!                ┌──────────────┐
//!                │   Composer   │──▶ text / JSON report
//!                └──────────────┘
//! ```
//!
//! The pure pipeline pieces (models, fuzzy matching, mapping table, ranker,
//! composer, store trait) live in `holo-index-core`; this crate adds the
//! I/O: configuration, SQLite, embedding providers, the filesystem gate,
//! the indexer, and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! holo init                                   # database + mapping template
//! holo index                                  # embed the repository
//! holo search "fix livechat polling"          # ranked results
//! holo check-module communication/livechat    # existence gate
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite artifact store |
//! | [`embedding`] | Embedding providers |
//! | [`spans`] | Splitting files into indexable spans |
//! | [`indexer`] | Building the embedding index |
//! | [`mappings`] | Mapping file loading and hot reload |
//! | [`gate`] | Module existence gate |
//! | [`search`] | Search orchestration |
//! | [`stats`] | Index statistics |
//! | [`exit`] | Process exit codes |
//! | [`logging`] | Tracing setup |
//! | [`runtime`] | CLI runtime with bounded shutdown |

pub mod config;
pub mod db;
pub mod embedding;
pub mod exit;
pub mod gate;
pub mod indexer;
pub mod logging;
pub mod mappings;
pub mod migrate;
pub mod runtime;
pub mod search;
pub mod spans;
pub mod sqlite_store;
pub mod stats;
