//! The project-local knowledge store.
//!
//! Wraps a SQLite pool and owns the indexed rows and FTS postings derived
//! from the authoritative documents. Every operation degrades rather than
//! raises: if the store cannot be opened, reads return empty sets and
//! writes report [`UpsertOutcome::Unavailable`], so upstream components
//! (hybrid search, the context assembler) always complete.

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{
    EntryKind, KnowledgeEntry, Observation, ReasoningRecord, SessionSummary,
};

/// Result of a knowledge upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// An entry with the same id already exists; nothing was written.
    DuplicateIgnored,
    /// The store could not be reached; nothing was written.
    Unavailable,
}

pub struct Store {
    pool: Option<SqlitePool>,
}

impl Store {
    /// Open the store and ensure the schema exists.
    ///
    /// Never fails: an unreachable database yields a store whose every
    /// operation returns an empty or failure value.
    pub async fn open(config: &Config) -> Store {
        match db::connect(config).await {
            Ok(pool) => {
                if migrate::create_schema(&pool).await.is_err() {
                    pool.close().await;
                    return Store { pool: None };
                }
                Store { pool: Some(pool) }
            }
            Err(_) => Store { pool: None },
        }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }

    pub async fn upsert_knowledge(&self, entry: &KnowledgeEntry) -> UpsertOutcome {
        let Some(pool) = &self.pool else {
            return UpsertOutcome::Unavailable;
        };

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO knowledge
                (id, kind, platform, title, problem, solution,
                 source_project, source_session, created_at, file_path)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.kind.as_str())
        .bind(&entry.platform)
        .bind(&entry.title)
        .bind(&entry.problem)
        .bind(&entry.solution)
        .bind(&entry.source_project)
        .bind(&entry.source_session)
        .bind(&entry.created_at)
        .bind(&entry.file_path)
        .execute(pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => UpsertOutcome::Inserted,
            Ok(_) => UpsertOutcome::DuplicateIgnored,
            Err(_) => UpsertOutcome::Unavailable,
        }
    }

    /// Full-text query over the knowledge index.
    ///
    /// The query is expected to already carry any synonym expansion.
    /// The kind filter is applied inside the query so a filtered search
    /// still fills its limit. Malformed MATCH syntax or zero hits both
    /// yield an empty vector.
    pub async fn query_knowledge(
        &self,
        match_query: &str,
        limit: i64,
        kind: Option<EntryKind>,
    ) -> Vec<KnowledgeEntry> {
        let Some(pool) = &self.pool else {
            return Vec::new();
        };
        if match_query.trim().is_empty() {
            return Vec::new();
        }

        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    r#"
                    SELECT k.id, k.kind, k.platform, k.title, k.problem, k.solution,
                           k.source_project, k.source_session, k.created_at, k.file_path
                    FROM knowledge k
                    JOIN knowledge_fts f ON k.rowid = f.rowid
                    WHERE knowledge_fts MATCH ? AND k.kind = ?
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(match_query)
                .bind(kind.as_str())
                .bind(limit)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT k.id, k.kind, k.platform, k.title, k.problem, k.solution,
                           k.source_project, k.source_session, k.created_at, k.file_path
                    FROM knowledge k
                    JOIN knowledge_fts f ON k.rowid = f.rowid
                    WHERE knowledge_fts MATCH ?
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(match_query)
                .bind(limit)
                .fetch_all(pool)
                .await
            }
        };

        match rows {
            Ok(rows) => rows.iter().filter_map(row_to_knowledge).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn list_knowledge(&self, kind: Option<EntryKind>) -> Vec<KnowledgeEntry> {
        let Some(pool) = &self.pool else {
            return Vec::new();
        };

        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    r#"
                    SELECT id, kind, platform, title, problem, solution,
                           source_project, source_session, created_at, file_path
                    FROM knowledge WHERE kind = ?
                    ORDER BY created_at DESC LIMIT 50
                    "#,
                )
                .bind(kind.as_str())
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, kind, platform, title, problem, solution,
                           source_project, source_session, created_at, file_path
                    FROM knowledge
                    ORDER BY created_at DESC LIMIT 50
                    "#,
                )
                .fetch_all(pool)
                .await
            }
        };

        match rows {
            Ok(rows) => rows.iter().filter_map(row_to_knowledge).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Replace-on-conflict: regenerating reasoning for the same commit
    /// overwrites the previous record.
    pub async fn upsert_reasoning(&self, record: &ReasoningRecord) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO reasoning
                (commit_hash, branch, commit_message, failed_attempts, decisions, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.commit_hash)
        .bind(&record.branch)
        .bind(&record.commit_message)
        .bind(&record.failed_attempts)
        .bind(&record.decisions)
        .bind(&record.created_at)
        .execute(pool)
        .await
        .is_ok()
    }

    pub async fn query_reasoning(&self, match_query: &str, limit: i64) -> Vec<ReasoningRecord> {
        let Some(pool) = &self.pool else {
            return Vec::new();
        };
        if match_query.trim().is_empty() {
            return Vec::new();
        }

        let rows = sqlx::query(
            r#"
            SELECT r.commit_hash, r.branch, r.commit_message,
                   r.failed_attempts, r.decisions, r.created_at
            FROM reasoning r
            JOIN reasoning_fts f ON r.rowid = f.rowid
            WHERE reasoning_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(match_query)
        .bind(limit)
        .fetch_all(pool)
        .await;

        match rows {
            Ok(rows) => rows
                .iter()
                .map(|row| ReasoningRecord {
                    commit_hash: row.get("commit_hash"),
                    branch: row.get::<Option<String>, _>("branch").unwrap_or_default(),
                    commit_message: row
                        .get::<Option<String>, _>("commit_message")
                        .unwrap_or_default(),
                    failed_attempts: row
                        .get::<Option<String>, _>("failed_attempts")
                        .unwrap_or_default(),
                    decisions: row.get::<Option<String>, _>("decisions").unwrap_or_default(),
                    created_at: row.get("created_at"),
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn save_session_summary(&self, summary: &SessionSummary) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };

        sqlx::query(
            r#"
            INSERT INTO session_summaries
                (id, project, request, completed, next_steps, decisions,
                 created_at, created_at_epoch)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&summary.id)
        .bind(&summary.project)
        .bind(&summary.request)
        .bind(&summary.completed)
        .bind(&summary.next_steps)
        .bind(&summary.decisions)
        .bind(&summary.created_at)
        .bind(summary.created_at_epoch)
        .execute(pool)
        .await
        .is_ok()
    }

    /// Most recent summary for the project, by epoch timestamp.
    pub async fn latest_session_summary(&self, project: &str) -> Option<SessionSummary> {
        let pool = self.pool.as_ref()?;

        let row = sqlx::query(
            r#"
            SELECT id, project, request, completed, next_steps, decisions,
                   created_at, created_at_epoch
            FROM session_summaries
            WHERE project = ?
            ORDER BY created_at_epoch DESC
            LIMIT 1
            "#,
        )
        .bind(project)
        .fetch_optional(pool)
        .await
        .ok()??;

        Some(SessionSummary {
            id: row.get("id"),
            project: row.get("project"),
            request: row.get::<Option<String>, _>("request").unwrap_or_default(),
            completed: row.get::<Option<String>, _>("completed").unwrap_or_default(),
            next_steps: row.get::<Option<String>, _>("next_steps").unwrap_or_default(),
            decisions: row.get::<Option<String>, _>("decisions").unwrap_or_default(),
            created_at: row.get("created_at"),
            created_at_epoch: row.get("created_at_epoch"),
        })
    }

    pub async fn record_observation(&self, obs: &Observation) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };

        sqlx::query(
            r#"
            INSERT INTO observations (id, project, kind, content, created_at, created_at_epoch)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&obs.id)
        .bind(&obs.project)
        .bind(&obs.kind)
        .bind(&obs.content)
        .bind(&obs.created_at)
        .bind(obs.created_at_epoch)
        .execute(pool)
        .await
        .is_ok()
    }

    pub async fn recent_observations(&self, project: &str, limit: i64) -> Vec<Observation> {
        let Some(pool) = &self.pool else {
            return Vec::new();
        };

        let rows = sqlx::query(
            r#"
            SELECT id, project, kind, content, created_at, created_at_epoch
            FROM observations
            WHERE project = ?
            ORDER BY created_at_epoch DESC
            LIMIT ?
            "#,
        )
        .bind(project)
        .bind(limit)
        .fetch_all(pool)
        .await;

        match rows {
            Ok(rows) => rows
                .iter()
                .map(|row| Observation {
                    id: row.get("id"),
                    project: row.get("project"),
                    kind: row.get::<Option<String>, _>("kind").unwrap_or_default(),
                    content: row.get::<Option<String>, _>("content").unwrap_or_default(),
                    created_at: row.get("created_at"),
                    created_at_epoch: row.get("created_at_epoch"),
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Load the synonym table for query expansion.
    pub async fn synonyms(&self) -> HashMap<String, Vec<String>> {
        let Some(pool) = &self.pool else {
            return HashMap::new();
        };

        let rows = sqlx::query("SELECT term, expansions FROM synonyms")
            .fetch_all(pool)
            .await;

        match rows {
            Ok(rows) => rows
                .iter()
                .map(|row| {
                    let term: String = row.get("term");
                    let expansions: String = row.get("expansions");
                    let list = expansions
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                    (term.to_lowercase(), list)
                })
                .collect(),
            Err(_) => HashMap::new(),
        }
    }

    pub async fn knowledge_counts(&self) -> HashMap<String, i64> {
        let Some(pool) = &self.pool else {
            return HashMap::new();
        };

        let rows = sqlx::query("SELECT kind, COUNT(*) AS n FROM knowledge GROUP BY kind")
            .fetch_all(pool)
            .await;

        match rows {
            Ok(rows) => rows
                .iter()
                .map(|row| (row.get::<String, _>("kind"), row.get::<i64, _>("n")))
                .collect(),
            Err(_) => HashMap::new(),
        }
    }
}

fn row_to_knowledge(row: &sqlx::sqlite::SqliteRow) -> Option<KnowledgeEntry> {
    let kind: String = row.get("kind");
    Some(KnowledgeEntry {
        id: row.get("id"),
        kind: EntryKind::parse(&kind)?,
        platform: row.get::<Option<String>, _>("platform").unwrap_or_default(),
        title: row.get("title"),
        problem: row.get::<Option<String>, _>("problem").unwrap_or_default(),
        solution: row.get::<Option<String>, _>("solution").unwrap_or_default(),
        source_project: row
            .get::<Option<String>, _>("source_project")
            .unwrap_or_default(),
        source_session: row
            .get::<Option<String>, _>("source_session")
            .unwrap_or_default(),
        created_at: row.get("created_at"),
        file_path: row.get("file_path"),
    })
}
