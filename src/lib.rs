//! # Recall Harness
//!
//! A local-first knowledge consolidation and hybrid retrieval engine.
//!
//! Recall Harness mines the artifacts a development session leaves behind
//! (handoff logs, commit-reasoning documents, resolution ledgers, project
//! notes) into durable knowledge entries, stores them in two
//! representations at once — human-readable markdown documents as the
//! source of truth and a SQLite FTS5 index derived from them — and
//! assembles a budgeted context digest for the next session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Artifacts   │──▶│ Consolidator │──▶│  Markdown docs │
//! │ handoffs,    │   │ classify +   │   │ (authoritative)│
//! │ reasoning,   │   │ dedup        │   └───────┬───────┘
//! │ ledgers      │   └──────┬───────┘           │ derived
//! └──────────────┘          │           ┌───────▼───────┐
//!                           └──────────▶│ SQLite + FTS5 │
//!                                       │ (+ vector idx)│
//!                                       └───────┬───────┘
//!                              ┌────────────────┤
//!                              ▼                ▼
//!                        ┌──────────┐    ┌──────────┐
//!                        │  search  │    │ assemble │
//!                        │ (hybrid) │    │ (digest) │
//!                        └──────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init                    # create the index database
//! recall consolidate             # mine artifacts into knowledge
//! recall search "auth crash"     # synonym-expanded keyword search
//! recall search "flaky ci" --mode hybrid
//! recall assemble                # budgeted digest for a new session
//! recall status                  # what's indexed, what's pending
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | SQLite index, degrade-to-empty on failure |
//! | [`docs`] | Authoritative markdown documents |
//! | [`scan`] | Artifact-source scanners |
//! | [`consolidate`] | Classification, dedup, dual write |
//! | [`synonym`] | Query-term expansion |
//! | [`search`] | Keyword, semantic, and hybrid search |
//! | [`semantic`] | Optional vector-index adapter |
//! | [`assemble`] | Budgeted context digest |
//! | [`signals`] | Platform, branch, and file-activity signals |
//! | [`reasoning`] | Commit reasoning records |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and synonym seeding |

pub mod assemble;
pub mod config;
pub mod consolidate;
pub mod db;
pub mod docs;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod reasoning;
pub mod scan;
pub mod search;
pub mod semantic;
pub mod signals;
pub mod status;
pub mod store;
pub mod synonym;
