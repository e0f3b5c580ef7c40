//! Schema creation for the project-local knowledge store.
//!
//! All statements are idempotent so `recall init` (and every startup path
//! that calls [`run_migrations`]) is safe to invoke repeatedly. The FTS5
//! virtual tables use the external-content pattern and are kept in sync
//! with their base tables via insert/delete triggers, which makes the
//! whole index a derived, rebuildable copy of the authoritative documents.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Default synonym vocabulary seeded at schema creation.
///
/// Read-mostly; `INSERT OR IGNORE` keeps re-initialization from clobbering
/// terms a user has overridden.
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("auth", "login,signin,authentication,oauth"),
    ("crash", "abort,panic,segfault,exception"),
    ("db", "database,sqlite,storage"),
    ("config", "configuration,settings,toml"),
    ("deploy", "deployment,release,ship"),
    ("test", "testing,spec,assertion"),
    ("async", "concurrent,await,tokio"),
    ("perf", "performance,latency,slow"),
    ("ui", "interface,frontend,view"),
    ("net", "network,http,request"),
    ("error", "failure,fault,bug"),
    ("cache", "caching,memoize,store"),
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            platform TEXT,
            title TEXT NOT NULL,
            problem TEXT,
            solution TEXT,
            source_project TEXT,
            source_session TEXT,
            created_at TEXT NOT NULL,
            file_path TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let knowledge_fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='knowledge_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !knowledge_fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE knowledge_fts USING fts5(
                title, problem, solution, content=knowledge, content_rowid=rowid,
                tokenize='porter unicode61', prefix='2 3'
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS knowledge_ai AFTER INSERT ON knowledge BEGIN
            INSERT INTO knowledge_fts(rowid, title, problem, solution)
            VALUES (new.rowid, new.title, new.problem, new.solution);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS knowledge_ad AFTER DELETE ON knowledge BEGIN
            INSERT INTO knowledge_fts(knowledge_fts, rowid, title, problem, solution)
            VALUES ('delete', old.rowid, old.title, old.problem, old.solution);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reasoning (
            commit_hash TEXT PRIMARY KEY,
            branch TEXT,
            commit_message TEXT,
            failed_attempts TEXT,
            decisions TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let reasoning_fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='reasoning_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !reasoning_fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE reasoning_fts USING fts5(
                commit_message, failed_attempts, decisions,
                content=reasoning, content_rowid=rowid,
                tokenize='porter unicode61'
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS reasoning_ai AFTER INSERT ON reasoning BEGIN
            INSERT INTO reasoning_fts(rowid, commit_message, failed_attempts, decisions)
            VALUES (new.rowid, new.commit_message, new.failed_attempts, new.decisions);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS reasoning_ad AFTER DELETE ON reasoning BEGIN
            INSERT INTO reasoning_fts(reasoning_fts, rowid, commit_message, failed_attempts, decisions)
            VALUES ('delete', old.rowid, old.commit_message, old.failed_attempts, old.decisions);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS synonyms (
            term TEXT PRIMARY KEY,
            expansions TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_summaries (
            id TEXT PRIMARY KEY,
            project TEXT NOT NULL,
            request TEXT,
            completed TEXT,
            next_steps TEXT,
            decisions TEXT,
            created_at TEXT NOT NULL,
            created_at_epoch INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observations (
            id TEXT PRIMARY KEY,
            project TEXT NOT NULL,
            kind TEXT,
            content TEXT,
            created_at TEXT NOT NULL,
            created_at_epoch INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_knowledge_kind ON knowledge(kind)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_knowledge_created_at ON knowledge(created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_summaries_project ON session_summaries(project, created_at_epoch DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observations_project ON observations(project, created_at_epoch DESC)",
    )
    .execute(pool)
    .await?;

    for (term, expansions) in DEFAULT_SYNONYMS {
        sqlx::query("INSERT OR IGNORE INTO synonyms (term, expansions) VALUES (?, ?)")
            .bind(term)
            .bind(expansions)
            .execute(pool)
            .await?;
    }

    Ok(())
}
