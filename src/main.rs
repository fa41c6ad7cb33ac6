//! # HoloIndex CLI (`holo`)
//!
//! The `holo` binary is the primary interface for HoloIndex. It provides
//! commands for database initialization, indexing, search, module existence
//! checks, and curated mapping maintenance.
//!
//! ## Usage
//!
//! ```bash
//! holo --config ./holo.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `holo init` | Create the database and a mapping file template |
//! | `holo index` | Embed new and changed files |
//! | `holo search "<query>"` | Ranked results with existence advisory |
//! | `holo check-module <path>` | Does this module already exist? |
//! | `holo mappings list` | Show curated mappings |
//! | `holo mappings validate` | Report mappings whose target is gone |
//! | `holo stats` | Index and mapping health |
//!
//! ## Exit codes
//!
//! `0` success (an empty result list is success), `1` configuration or I/O
//! error, `2` invalid query or path, `3` search infrastructure unavailable,
//! `130` interrupted.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use holo_index::config::{self, Config};
use holo_index::indexer::{self, IndexOptions};
use holo_index::{exit, gate, logging, mappings, migrate, runtime, search, stats};

/// HoloIndex: find where code already lives before writing new code.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "holo",
    about = "HoloIndex: semantic code retrieval with curated mappings and module existence checks",
    version,
    long_about = "HoloIndex answers natural-language questions about a repository with a short, \
    ranked list of code locations. Human-curated mappings always rank above embedding similarity, \
    and queries that name an existing module get a read-the-docs-first advisory."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./holo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and the curated mapping file.
    ///
    /// Idempotent: an existing mapping file is left untouched.
    Init,

    /// Build or refresh the embedding index.
    ///
    /// Only files whose content changed since the last run are re-embedded.
    Index {
        /// Show counts without embedding or writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Keep artifacts of files that no longer exist.
        #[arg(long)]
        keep_stale: bool,
    },

    /// Search for code relevant to a natural-language query.
    Search {
        /// The query text.
        query: String,

        /// Maximum number of results (defaults to `search.default_limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check whether a module already exists.
    ///
    /// Accepts slash or dotted paths (`communication/livechat`,
    /// `modules.communication.livechat`) or a bare module name. Works
    /// without a config file.
    CheckModule {
        /// Module path.
        path: String,

        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect the curated mapping table.
    Mappings {
        #[command(subcommand)]
        action: MappingsAction,
    },

    /// Show index and mapping statistics.
    Stats,
}

#[derive(Subcommand)]
enum MappingsAction {
    /// List all mappings and whether their targets exist.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Report mappings whose target no longer exists.
    Validate {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    logging::init_tracing();
    let cli = Cli::parse();

    let outcome = runtime::block_on_with_grace(
        async move {
            tokio::select! {
                result = run(cli) => match result {
                    Ok(()) => ExitCode::SUCCESS,
                    Err(e) => {
                        eprintln!("Error: {:#}", e);
                        ExitCode::from(exit::exit_code(&e))
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("Interrupted.");
                    ExitCode::from(exit::INTERRUPTED)
                }
            }
        },
        runtime::SHUTDOWN_GRACE,
    );
    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit::OTHER_ERROR)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // check-module works without a config file
    let cfg = match &cli.command {
        Commands::CheckModule { .. } if !cli.config.exists() => Config::minimal(),
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db_path().display());

            let mappings_path = cfg.mappings_path();
            if mappings_path.exists() {
                println!("Mapping file present: {}", mappings_path.display());
            } else {
                if let Some(parent) = mappings_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&mappings_path, mappings::MAPPING_TEMPLATE)?;
                println!("Created mapping file: {}", mappings_path.display());
            }
        }
        Commands::Index {
            dry_run,
            keep_stale,
        } => {
            indexer::run_index(
                &cfg,
                IndexOptions {
                    dry_run,
                    keep_stale,
                },
            )
            .await?;
        }
        Commands::Search { query, limit, json } => {
            search::run_search(&cfg, &query, limit, json).await?;
        }
        Commands::Mappings { action } => match action {
            MappingsAction::List { json } => mappings::run_list(&cfg, json)?,
            MappingsAction::Validate { json } => mappings::run_validate(&cfg, json)?,
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::CheckModule { path, json } => {
            gate::run_check_module(&cfg, &path, json)?;
        }
    }

    Ok(())
}
