//! Knowledge consolidation pipeline.
//!
//! Scans the artifact sources, classifies each candidate into exactly one
//! entry kind by its source (handoff errors and project-notes pitfalls →
//! pitfall, commit reasoning → pattern, resolved ledger questions →
//! decision), deduplicates pitfalls against their platform's
//! authoritative document, and writes accepted entries to both
//! representations: document first, indexed row second, vector mirror
//! last (and only when the semantic tier is enabled; a mirror failure is
//! non-fatal).
//!
//! Dry-run mode performs classification and dedup checks against an
//! in-memory shadow of the documents and skips all writes; the shadow is
//! also consulted during real runs, so the two modes count identically
//! from the same starting state.

use anyhow::Result;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

use crate::config::Config;
use crate::docs;
use crate::models::{Candidate, ConsolidationReport, EntryKind, KnowledgeEntry};
use crate::scan;
use crate::semantic::SemanticSearch;
use crate::signals;
use crate::store::Store;

pub struct Consolidator<'a> {
    config: &'a Config,
    store: &'a Store,
    semantic: &'a SemanticSearch,
    dry_run: bool,
    project: String,
    platform: String,
    now: String,
    now_millis: u64,
    /// In-memory view of each platform's pitfalls document, updated as
    /// candidates are accepted so a later duplicate within the same run
    /// is caught in both dry and real runs.
    shadow: HashMap<String, String>,
    report: ConsolidationReport,
}

impl<'a> Consolidator<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a Store,
        semantic: &'a SemanticSearch,
        dry_run: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            config,
            store,
            semantic,
            dry_run,
            project: signals::project_name(config),
            platform: signals::current_platform(config),
            now: now.to_rfc3339(),
            now_millis: now.timestamp_millis().max(0) as u64,
            shadow: HashMap::new(),
            report: ConsolidationReport::default(),
        }
    }

    /// Run every scanner and consolidate the results.
    pub async fn run(mut self) -> Result<ConsolidationReport> {
        for candidate in scan::scan_handoffs(self.config) {
            self.ingest(candidate, EntryKind::Pitfall).await?;
        }
        for candidate in scan::scan_project_notes(self.config) {
            self.ingest(candidate, EntryKind::Pitfall).await?;
        }
        for candidate in scan::scan_reasoning(self.config) {
            self.ingest(candidate, EntryKind::Pattern).await?;
        }
        for candidate in scan::scan_ledgers(self.config) {
            self.ingest(candidate, EntryKind::Decision).await?;
        }
        Ok(self.report)
    }

    async fn ingest(&mut self, candidate: Candidate, kind: EntryKind) -> Result<()> {
        let platform = candidate
            .platform
            .clone()
            .unwrap_or_else(|| self.platform.clone());

        if kind == EntryKind::Pitfall && self.is_pitfall_duplicate(&platform, &candidate) {
            self.report.skipped_duplicates += 1;
            return Ok(());
        }

        let mut entry = KnowledgeEntry {
            id: docs::generate_id(kind, &candidate.title, self.now_millis),
            kind,
            platform,
            title: candidate.title,
            problem: candidate.problem,
            solution: candidate.solution,
            source_project: self.project.clone(),
            source_session: candidate.session,
            created_at: self.now.clone(),
            file_path: String::new(),
        };

        if kind == EntryKind::Pitfall {
            self.remember_in_shadow(&entry);
        }

        if !self.dry_run {
            // Authoritative document first; the indexed row is derived
            // and only written when the document accepted the entry.
            if !docs::write_entry(&self.config.knowledge.dir, &mut entry)? {
                self.report.skipped_duplicates += 1;
                return Ok(());
            }
            self.store.upsert_knowledge(&entry).await;
            if self.config.semantic.is_enabled() {
                self.mirror(&entry).await;
            }
        }

        match kind {
            EntryKind::Pitfall => self.report.pitfalls += 1,
            EntryKind::Pattern => self.report.patterns += 1,
            EntryKind::Decision => self.report.decisions += 1,
        }
        Ok(())
    }

    fn is_pitfall_duplicate(&mut self, platform: &str, candidate: &Candidate) -> bool {
        let content = self.shadow.entry(platform.to_string()).or_insert_with(|| {
            std::fs::read_to_string(docs::pitfalls_path(&self.config.knowledge.dir, platform))
                .unwrap_or_default()
        });
        docs::is_duplicate(content, &candidate.title, &candidate.problem)
    }

    fn remember_in_shadow(&mut self, entry: &KnowledgeEntry) {
        let content = self.shadow.entry(entry.platform.clone()).or_default();
        content.push_str("\n### ");
        content.push_str(&entry.title);
        content.push('\n');
        content.push_str(&entry.problem);
        content.push('\n');
    }

    async fn mirror(&self, entry: &KnowledgeEntry) {
        let text = format!("{} {} {}", entry.title, entry.problem, entry.solution);
        let mut metadata = BTreeMap::new();
        metadata.insert("kind".to_string(), entry.kind.as_str().to_string());
        metadata.insert("title".to_string(), entry.title.clone());
        metadata.insert("platform".to_string(), entry.platform.clone());
        metadata.insert("project".to_string(), entry.source_project.clone());
        metadata.insert("created_at".to_string(), entry.created_at.clone());
        self.semantic.upsert(&entry.id, &text, metadata).await;
    }
}

/// Save one knowledge entry directly, outside the scanning pipeline.
///
/// Used by the `recall save` manual entry point. The same dual-write
/// order applies.
pub async fn save_manual(
    config: &Config,
    store: &Store,
    semantic: &SemanticSearch,
    text: &str,
    title: Option<String>,
    kind: EntryKind,
    platform: Option<String>,
) -> Result<KnowledgeEntry> {
    let now = Utc::now();
    let title = title.unwrap_or_else(|| {
        crate::extract::truncate_chars(crate::extract::first_line(text), 60).to_string()
    });

    let mut entry = KnowledgeEntry {
        id: docs::generate_id(kind, &title, now.timestamp_millis().max(0) as u64),
        kind,
        platform: platform.unwrap_or_else(|| signals::current_platform(config)),
        title,
        problem: crate::extract::truncate_chars(text, scan::MAX_PROBLEM_CHARS).to_string(),
        solution: String::new(),
        source_project: signals::project_name(config),
        source_session: "manual".to_string(),
        created_at: now.to_rfc3339(),
        file_path: String::new(),
    };

    if !docs::write_entry(&config.knowledge.dir, &mut entry)? {
        anyhow::bail!("An entry with this title or content already exists");
    }
    store.upsert_knowledge(&entry).await;

    if config.semantic.is_enabled() {
        let text = format!("{} {} {}", entry.title, entry.problem, entry.solution);
        let mut metadata = BTreeMap::new();
        metadata.insert("kind".to_string(), entry.kind.as_str().to_string());
        metadata.insert("title".to_string(), entry.title.clone());
        metadata.insert("platform".to_string(), entry.platform.clone());
        semantic.upsert(&entry.id, &text, metadata).await;
    }

    Ok(entry)
}

/// CLI entry point for `recall consolidate`.
pub async fn run_consolidate(config: &Config, dry_run: bool) -> Result<()> {
    let store = Store::open(config).await;
    let semantic = SemanticSearch::new(config.semantic.clone());

    let report = Consolidator::new(config, &store, &semantic, dry_run)
        .run()
        .await?;

    if dry_run {
        println!("consolidate (dry-run)");
    } else {
        println!("consolidate");
    }
    println!("  pitfalls: {}", report.pitfalls);
    println!("  patterns: {}", report.patterns);
    println!("  decisions: {}", report.decisions);
    println!("  skipped duplicates: {}", report.skipped_duplicates);
    println!("  total: {}", report.total());
    println!("ok");

    store.close().await;
    Ok(())
}

/// CLI entry point for `recall save`.
pub async fn run_save(
    config: &Config,
    text: &str,
    title: Option<String>,
    kind: Option<String>,
    platform: Option<String>,
) -> Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("Some text to save is required");
    }
    let kind = match kind.as_deref() {
        Some(s) => match EntryKind::parse(s) {
            Some(kind) => kind,
            None => anyhow::bail!("Unknown entry kind: {}. Use pitfall, pattern, or decision.", s),
        },
        None => EntryKind::Decision,
    };

    let store = Store::open(config).await;
    let semantic = SemanticSearch::new(config.semantic.clone());
    let entry = save_manual(config, &store, &semantic, text, title, kind, platform).await?;

    println!("Saved: {}", entry.id);
    println!("  {}", entry.file_path);

    store.close().await;
    Ok(())
}
