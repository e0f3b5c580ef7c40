//! The authoritative knowledge documents.
//!
//! Human-readable, append-only text files under the per-user knowledge
//! directory are the source of truth for every knowledge entry; the
//! SQLite index is derived from them and rebuildable. Layout:
//!
//! ```text
//! <knowledge>/platforms/<platform>/pitfalls.md   one doc per platform
//! <knowledge>/patterns/<id>.md                   one doc per pattern
//! <knowledge>/discoveries/<date>-<slug>.md       one doc per decision
//! ```
//!
//! Only the consolidator and the context assembler touch these files.
//! Appends are read-then-write with no locking; two concurrent writers
//! can lose an append. That limitation is accepted, not handled here.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::extract::{first_line, section, truncate_chars};
use crate::models::{EntryKind, KnowledgeEntry};

/// Title-substring dedup only applies beyond this many characters.
pub const TITLE_DEDUP_MIN_CHARS: usize = 10;
/// Problem-prefix dedup only applies beyond this many characters.
pub const PROBLEM_DEDUP_MIN_CHARS: usize = 20;
/// Length of the problem prefix compared against the existing document.
pub const PROBLEM_DEDUP_PREFIX: usize = 50;

pub fn slug(title: &str, max: usize) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
        if out.len() >= max {
            break;
        }
    }
    out.trim_matches('-').to_string()
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Stable entry id derived from kind, title, and creation time.
pub fn generate_id(kind: EntryKind, title: &str, epoch_millis: u64) -> String {
    format!("{}-{}-{}", kind.as_str(), slug(title, 40), base36(epoch_millis))
}

pub fn pitfalls_path(knowledge_dir: &Path, platform: &str) -> PathBuf {
    knowledge_dir
        .join("platforms")
        .join(platform)
        .join("pitfalls.md")
}

pub fn patterns_dir(knowledge_dir: &Path) -> PathBuf {
    knowledge_dir.join("patterns")
}

pub fn discoveries_dir(knowledge_dir: &Path) -> PathBuf {
    knowledge_dir.join("discoveries")
}

/// Fuzzy duplicate check against an existing authoritative document.
///
/// A candidate is a duplicate when its lower-cased title appears in the
/// document and is longer than [`TITLE_DEDUP_MIN_CHARS`], or when the
/// first [`PROBLEM_DEDUP_PREFIX`] characters of its lower-cased problem
/// text appear and the problem is longer than [`PROBLEM_DEDUP_MIN_CHARS`].
/// Short titles and problems are accepted even when literally contained:
/// they are too generic to prove sameness.
pub fn is_duplicate(existing: &str, title: &str, problem: &str) -> bool {
    let existing = existing.to_lowercase();
    let title = title.to_lowercase();
    let problem = problem.to_lowercase();

    if title.chars().count() > TITLE_DEDUP_MIN_CHARS && existing.contains(&title) {
        return true;
    }
    if problem.chars().count() > PROBLEM_DEDUP_MIN_CHARS
        && existing.contains(truncate_chars(&problem, PROBLEM_DEDUP_PREFIX))
    {
        return true;
    }
    false
}

/// Write the authoritative copy of an entry, setting `entry.file_path`.
///
/// Pitfalls append to the platform's shared document (creating it with a
/// header on first write) and re-check for duplicates right before the
/// append; patterns and decisions get one file each. Returns `false` when
/// the append was suppressed as a duplicate.
pub fn write_entry(knowledge_dir: &Path, entry: &mut KnowledgeEntry) -> Result<bool> {
    let date = truncate_chars(&entry.created_at, 10);

    let (path, content) = match entry.kind {
        EntryKind::Pitfall => {
            let path = pitfalls_path(knowledge_dir, &entry.platform);
            let block = format!(
                "\n### {}\n**Source**: {}, {}\n**Problem**: {}\n**Solution**: {}\n",
                entry.title, entry.source_project, date, entry.problem, entry.solution
            );
            let content = match std::fs::read_to_string(&path) {
                Ok(existing) => {
                    if is_duplicate(&existing, &entry.title, &entry.problem) {
                        return Ok(false);
                    }
                    existing + &block
                }
                Err(_) => format!("# {} Pitfalls\n{}", entry.platform.to_uppercase(), block),
            };
            (path, content)
        }
        EntryKind::Pattern => {
            let path = patterns_dir(knowledge_dir).join(format!("{}.md", entry.id));
            let content = format!(
                "# Pattern: {}\n\n## Problem\n{}\n\n## Solution\n{}\n\n## Source\n{}, {}\n",
                entry.title, entry.problem, entry.solution, entry.source_project, date
            );
            (path, content)
        }
        EntryKind::Decision => {
            let name = format!("{}-{}.md", date, slug(&entry.title, 40));
            let path = discoveries_dir(knowledge_dir).join(name);
            let content = format!(
                "# Discovery: {}\nDate: {}\nProject: {}\n\n## What\n{}\n\n## Resolution\n{}\n",
                entry.title, date, entry.source_project, entry.problem, entry.solution
            );
            (path, content)
        }
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    entry.file_path = path.display().to_string();
    Ok(true)
}

/// Load the platform's pitfalls document, capped at `max_chars`.
///
/// When truncation is needed, back up to the last complete `\n### ` entry
/// boundary so the digest never ends mid-entry.
pub fn load_pitfalls(knowledge_dir: &Path, platform: &str, max_chars: usize) -> String {
    let path = pitfalls_path(knowledge_dir, platform);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return String::new();
    };

    if content.chars().count() <= max_chars {
        return content;
    }

    let truncated = truncate_chars(&content, max_chars);
    match truncated.rfind("\n### ") {
        Some(pos) if pos > 0 => truncated[..pos].to_string(),
        _ => truncated.to_string(),
    }
}

/// A discovery document summarized for the digest.
#[derive(Debug, Clone)]
pub struct DiscoverySummary {
    pub title: String,
    pub what: String,
}

/// The `limit` most recently modified discovery documents newer than
/// `max_age`, newest first.
pub fn recent_discoveries(
    knowledge_dir: &Path,
    max_age: std::time::Duration,
    limit: usize,
) -> Vec<DiscoverySummary> {
    let dir = discoveries_dir(knowledge_dir);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut files: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .filter_map(|e| {
            let mtime = e.metadata().ok()?.modified().ok()?;
            (mtime > cutoff).then_some((mtime, e.path()))
        })
        .collect();

    files.sort_by(|a, b| b.0.cmp(&a.0));
    files.truncate(limit);

    files
        .into_iter()
        .filter_map(|(_, path)| {
            let content = std::fs::read_to_string(&path).ok()?;
            let title = content
                .lines()
                .find_map(|l| l.strip_prefix("# Discovery: "))
                .unwrap_or_else(|| {
                    path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
                })
                .trim()
                .to_string();
            let what = section(&content, "What")
                .map(|s| first_line(s).to_string())
                .unwrap_or_default();
            Some(DiscoverySummary { title, what })
        })
        .collect()
}

/// Count `### ` entry headings across all platform pitfalls documents.
pub fn count_pitfall_entries(knowledge_dir: &Path) -> usize {
    let platforms = knowledge_dir.join("platforms");
    let Ok(entries) = std::fs::read_dir(&platforms) else {
        return 0;
    };

    entries
        .flatten()
        .filter_map(|e| std::fs::read_to_string(e.path().join("pitfalls.md")).ok())
        .map(|content| content.lines().filter(|l| l.starts_with("### ")).count())
        .sum()
}

/// Count `.md` files in a knowledge subdirectory.
pub fn count_documents(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .count()
}
