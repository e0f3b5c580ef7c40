//! # Recall Harness CLI (`recall`)
//!
//! The `recall` binary is the interface to the knowledge base. It
//! provides commands for database initialization, artifact
//! consolidation, search, context assembly, manual saves, commit
//! reasoning, and status.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite index and run schema migrations |
//! | `recall consolidate` | Mine session artifacts into knowledge entries |
//! | `recall search "<query>"` | Search the knowledge base |
//! | `recall list` | List recent knowledge entries |
//! | `recall assemble` | Print a budgeted context digest |
//! | `recall save "<text>"` | Save a knowledge entry by hand |
//! | `recall reasoning generate` | Capture reasoning for a commit |
//! | `recall reasoning recall` | Search past commit reasoning |
//! | `recall status` | Show document, index, and backlog counts |

mod assemble;
mod config;
mod consolidate;
mod db;
mod docs;
mod extract;
mod migrate;
mod models;
mod reasoning;
mod scan;
mod search;
mod semantic;
mod signals;
mod status;
mod store;
mod synonym;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Recall Harness CLI — a local-first knowledge consolidation and hybrid
/// retrieval engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file falls back to defaults with every optional
/// feature disabled.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall Harness — consolidate session artifacts into searchable knowledge",
    version,
    long_about = "Recall Harness mines session artifacts (handoff logs, commit reasoning, \
    resolution ledgers, project notes) into durable knowledge entries stored as markdown \
    documents plus a SQLite FTS5 index, and assembles a budgeted context digest for the \
    next session."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./recall.toml`. Store, knowledge-directory, artifact,
    /// and semantic-tier settings are read from this file.
    #[arg(long, global = true, default_value = "./recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database.
    ///
    /// Creates the SQLite file, all tables, the FTS5 virtual tables with
    /// their sync triggers, and seeds the default synonym vocabulary.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Consolidate session artifacts into knowledge entries.
    ///
    /// Scans handoff logs, commit-reasoning documents, resolution
    /// ledgers, and the project notes document; classifies candidates;
    /// drops duplicates; and writes accepted entries to the authoritative
    /// documents and the index.
    Consolidate {
        /// Classify and count without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the knowledge base.
    ///
    /// Keyword mode expands query terms through the synonym table and
    /// ranks with FTS5. Hybrid mode merges vector-index results in front
    /// when the semantic tier is enabled and reachable, and degrades to
    /// keyword results otherwise.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `keyword` (FTS5), `semantic` (vector), or `hybrid` (merged).
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Filter results to one entry kind: `pitfall`, `pattern`, or `decision`.
        #[arg(long)]
        kind: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// List recent knowledge entries.
    List {
        /// Filter to one entry kind: `pitfall`, `pattern`, or `decision`.
        #[arg(long)]
        kind: Option<String>,
    },

    /// Print a budgeted context digest for the current working tree.
    ///
    /// Combines platform pitfalls, knowledge related to recent branch and
    /// file activity, recent discoveries, and the last session summary
    /// under a hard character budget.
    Assemble,

    /// Save a knowledge entry by hand.
    Save {
        /// The knowledge to record.
        text: String,

        /// Entry title; defaults to the first 60 characters of the text.
        #[arg(long)]
        title: Option<String>,

        /// Entry kind: `pitfall`, `pattern`, or `decision` (default).
        #[arg(long)]
        kind: Option<String>,

        /// Platform tag; defaults to the detected platform.
        #[arg(long)]
        platform: Option<String>,
    },

    /// Manage commit reasoning records.
    Reasoning {
        #[command(subcommand)]
        action: ReasoningAction,
    },

    /// Show document, index, and backlog counts.
    Status,
}

/// Reasoning subcommands.
#[derive(Subcommand)]
enum ReasoningAction {
    /// Capture the reasoning record for a commit.
    ///
    /// Writes the reasoning document (branch, message, failed build
    /// attempts, changed files), a persistent copy, and indexes the
    /// record for later recall.
    Generate {
        /// Full hash of the commit.
        commit: String,
        /// The commit message.
        message: String,
    },

    /// Search past reasoning records by keyword.
    Recall {
        /// Case-insensitive keyword to look for.
        keyword: String,
        /// Maximum number of records to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Consolidate { dry_run } => {
            consolidate::run_consolidate(&cfg, dry_run).await?;
        }
        Commands::Search {
            query,
            mode,
            kind,
            limit,
        } => {
            search::run_search(&cfg, &query, &mode, kind, limit).await?;
        }
        Commands::List { kind } => {
            search::run_list(&cfg, kind).await?;
        }
        Commands::Assemble => {
            assemble::run_assemble(&cfg).await?;
        }
        Commands::Save {
            text,
            title,
            kind,
            platform,
        } => {
            consolidate::run_save(&cfg, &text, title, kind, platform).await?;
        }
        Commands::Reasoning { action } => match action {
            ReasoningAction::Generate { commit, message } => {
                reasoning::run_generate(&cfg, &commit, &message).await?;
            }
            ReasoningAction::Recall { keyword, limit } => {
                reasoning::run_recall(&cfg, &keyword, limit).await?;
            }
        },
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}
