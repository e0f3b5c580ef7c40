//! Core data models used throughout Recall Harness.
//!
//! These types represent the knowledge entries, reasoning records, and
//! search results that flow through the consolidation and retrieval
//! pipeline.

use std::collections::BTreeMap;

/// Classification of a consolidated knowledge entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Pitfall,
    Pattern,
    Decision,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Pitfall => "pitfall",
            EntryKind::Pattern => "pattern",
            EntryKind::Decision => "decision",
        }
    }

    pub fn parse(s: &str) -> Option<EntryKind> {
        match s {
            "pitfall" => Some(EntryKind::Pitfall),
            "pattern" => Some(EntryKind::Pattern),
            "decision" => Some(EntryKind::Decision),
            _ => None,
        }
    }
}

/// A consolidated knowledge fact.
///
/// Every entry has two representations: a human-readable authoritative
/// document on disk (the source of truth) and a derived indexed row in
/// SQLite. The consolidator appends the document first; the indexed row
/// is only written when the document accepted the entry.
#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    pub id: String,
    pub kind: EntryKind,
    pub platform: String,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub source_project: String,
    pub source_session: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// Location of the authoritative document copy.
    pub file_path: String,
}

/// Commit-keyed reasoning narrative, replace-on-conflict.
#[derive(Debug, Clone)]
pub struct ReasoningRecord {
    pub commit_hash: String,
    pub branch: String,
    pub commit_message: String,
    pub failed_attempts: String,
    pub decisions: String,
    pub created_at: String,
}

/// Summary of a completed work session, write-once, read by recency.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub project: String,
    pub request: String,
    pub completed: String,
    pub next_steps: String,
    pub decisions: String,
    pub created_at: String,
    /// Epoch seconds, used for recency ordering.
    pub created_at_epoch: i64,
}

/// A free-form observation recorded during a session.
#[derive(Debug, Clone)]
pub struct Observation {
    pub id: String,
    pub project: String,
    pub kind: String,
    pub content: String,
    pub created_at: String,
    pub created_at_epoch: i64,
}

/// Candidate entry produced by an artifact scanner before classification.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub session: String,
    /// Platform inferred from artifact content, when the scanner can tell.
    pub platform: Option<String>,
}

/// A ranked hit returned from keyword, semantic, or hybrid search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub platform: String,
    pub created_at: String,
    pub score: f64,
}

/// A single result from the vector index.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub id: String,
    /// Cosine distance; similarity is `1.0 - distance`.
    pub distance: f64,
    pub metadata: BTreeMap<String, String>,
}

/// Per-type counts reported by a consolidation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub pitfalls: u32,
    pub patterns: u32,
    pub decisions: u32,
    pub skipped_duplicates: u32,
}

impl ConsolidationReport {
    pub fn total(&self) -> u32 {
        self.pitfalls + self.patterns + self.decisions
    }
}

/// Live environment signals feeding the context assembler.
#[derive(Debug, Clone, Default)]
pub struct ContextSignals {
    pub platform: String,
    pub project: String,
    pub branch_keywords: Vec<String>,
    pub file_keywords: Vec<String>,
}

impl ContextSignals {
    /// Union of branch and file keywords, deduplicated, branch first.
    pub fn all_keywords(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for kw in self.branch_keywords.iter().chain(self.file_keywords.iter()) {
            if !seen.contains(kw) {
                seen.push(kw.clone());
            }
        }
        seen
    }
}

/// The assembled session-start context digest.
#[derive(Debug, Clone, Default)]
pub struct ContextDigest {
    pub digest: String,
    pub sources: Vec<String>,
    pub total_chars: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_round_trip() {
        for kind in [EntryKind::Pitfall, EntryKind::Pattern, EntryKind::Decision] {
            assert_eq!(EntryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntryKind::parse("note"), None);
    }

    #[test]
    fn test_signals_keyword_union_dedups() {
        let signals = ContextSignals {
            branch_keywords: vec!["auth".into(), "token".into()],
            file_keywords: vec!["token".into(), "session".into()],
            ..Default::default()
        };
        assert_eq!(signals.all_keywords(), vec!["auth", "token", "session"]);
    }
}
