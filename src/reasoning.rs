//! Commit reasoning records.
//!
//! `generate` captures the why of a commit right after it happens: the
//! branch, the message, the build attempts that failed along the way
//! (drained from the branch attempts journal), and the changed files.
//! The record lives in three places: the working copy under the
//! reasoning directory, a persistent copy meant to be committed, and a
//! row in the store's reasoning index. `recall` searches all of them.

use anyhow::{bail, Result};
use chrono::Utc;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::extract::{first_line, section, subsection, truncate_chars};
use crate::models::ReasoningRecord;
use crate::signals;
use crate::store::Store;

const MAX_FAILED_ATTEMPTS: usize = 5;
const SHORT_HASH_CHARS: usize = 8;
const CONTEXT_CHARS: usize = 200;

/// One line of the branch attempts journal.
#[derive(Debug, Deserialize)]
struct Attempt {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    command: String,
    #[serde(default)]
    error: String,
}

fn attempts_path(config: &Config, branch: &str) -> PathBuf {
    let base = config
        .artifacts
        .reasoning_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.artifacts.reasoning_dir.clone());
    base.join("branches")
        .join(branch.replace('/', "-"))
        .join("attempts.jsonl")
}

fn read_attempts(path: &Path) -> Vec<Attempt> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

fn tried_section(attempts: &[Attempt]) -> String {
    if attempts.is_empty() {
        return "_No build attempts recorded._\n".to_string();
    }

    let failures: Vec<&Attempt> = attempts.iter().filter(|a| a.kind == "build_fail").collect();

    let mut out = String::new();
    if !failures.is_empty() {
        out.push_str("### Failed attempts\n");
        let start = failures.len().saturating_sub(MAX_FAILED_ATTEMPTS);
        for attempt in &failures[start..] {
            let cmd: Vec<&str> = attempt.command.split_whitespace().take(3).collect();
            let cmd = if cmd.is_empty() {
                "unknown".to_string()
            } else {
                cmd.join(" ")
            };
            let err = first_line(&attempt.error);
            let err = if err.is_empty() { "unknown error" } else { err };
            out.push_str(&format!("- `{}...`: {}\n", cmd, truncate_chars(err, 100)));
        }
        out.push('\n');
    }

    out.push_str("### Summary\n");
    if failures.is_empty() {
        out.push_str("Build passed on first try.\n");
    } else {
        out.push_str(&format!(
            "Build passed after **{} failed attempt(s)**.\n",
            failures.len()
        ));
    }
    out
}

fn changed_files(commit: &str) -> String {
    let listing = signals::git(&["diff-tree", "--no-commit-id", "--name-only", "-r", commit]);
    match listing {
        Some(files) if !files.is_empty() => files
            .lines()
            .map(|f| format!("- {}\n", f))
            .collect::<String>(),
        _ => "- (unable to determine)\n".to_string(),
    }
}

/// Generate the reasoning record for a commit.
///
/// Writes `<reasoning-dir>/<commit>/reasoning.md`, a persistent copy
/// under the reasoning artifacts directory, and indexes the record into
/// the store. The attempts journal is drained so the next commit starts
/// clean. Store indexing failure is non-fatal.
pub async fn generate(
    config: &Config,
    store: &Store,
    commit: &str,
    message: &str,
) -> Result<PathBuf> {
    if commit.trim().is_empty() {
        bail!("A commit hash is required");
    }
    if message.trim().is_empty() {
        bail!("A commit message is required");
    }

    let branch = signals::current_branch();
    let short = truncate_chars(commit, SHORT_HASH_CHARS).to_string();
    let attempts_file = attempts_path(config, &branch);
    let attempts = read_attempts(&attempts_file);

    let content = format!(
        "# Commit: {}\n\n## Branch\n{}\n\n## What was committed\n{}\n\n## What was tried\n\n{}\n## Files changed\n{}",
        short,
        branch,
        message,
        tried_section(&attempts),
        changed_files(commit)
    );

    let dir = config.artifacts.reasoning_dir.join(commit);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("reasoning.md");
    std::fs::write(&path, &content)?;

    let persistent_dir = &config.artifacts.persistent_reasoning_dir;
    std::fs::create_dir_all(persistent_dir)?;
    std::fs::write(
        persistent_dir.join(format!("{}-reasoning.md", short)),
        &content,
    )?;

    if !attempts.is_empty() {
        // Drained, not deleted: the journal file keeps accumulating
        // entries for the next commit.
        let _ = std::fs::write(&attempts_file, "");
    }

    let failed = subsection(&content, "Failed attempts")
        .unwrap_or("")
        .to_string();
    store
        .upsert_reasoning(&ReasoningRecord {
            commit_hash: commit.to_string(),
            branch: branch.clone(),
            commit_message: message.to_string(),
            failed_attempts: failed,
            decisions: format!("branch:{} | {}", branch, message),
            created_at: Utc::now().to_rfc3339(),
        })
        .await;

    Ok(path)
}

/// One recalled reasoning record.
#[derive(Debug, Clone)]
pub struct RecallMatch {
    pub commit: String,
    pub message: String,
    pub context: String,
}

fn file_match(content: &str, keyword: &str) -> Option<String> {
    let needle = keyword.to_lowercase();
    let lines: Vec<&str> = content.lines().collect();
    let hit = lines.iter().position(|l| l.to_lowercase().contains(&needle))?;

    let from = hit.saturating_sub(1);
    let to = (hit + 2).min(lines.len());
    let context = lines[from..to].join("\n");
    Some(truncate_chars(context.trim(), CONTEXT_CHARS).to_string())
}

fn message_of(content: &str) -> String {
    section(content, "What was committed")
        .map(|s| first_line(s).to_string())
        .unwrap_or_default()
}

/// Search reasoning records by keyword.
///
/// Scans the per-commit reasoning files and the persistent copies
/// case-insensitively, then widens with an FTS query of the reasoning
/// index; results are deduplicated by short hash.
pub async fn recall(config: &Config, store: &Store, keyword: &str, limit: usize) -> Vec<RecallMatch> {
    let mut matches: Vec<RecallMatch> = Vec::new();
    let push = |m: RecallMatch, matches: &mut Vec<RecallMatch>| {
        if !matches.iter().any(|x| x.commit == m.commit) {
            matches.push(m);
        }
    };

    if let Ok(entries) = std::fs::read_dir(&config.artifacts.reasoning_dir) {
        for entry in entries.flatten() {
            if matches.len() >= limit {
                break;
            }
            let commit = entry.file_name().to_string_lossy().to_string();
            let Ok(content) = std::fs::read_to_string(entry.path().join("reasoning.md")) else {
                continue;
            };
            let Some(context) = file_match(&content, keyword) else {
                continue;
            };
            push(
                RecallMatch {
                    commit: truncate_chars(&commit, SHORT_HASH_CHARS).to_string(),
                    message: message_of(&content),
                    context,
                },
                &mut matches,
            );
        }
    }

    if let Ok(entries) = std::fs::read_dir(&config.artifacts.persistent_reasoning_dir) {
        for entry in entries.flatten() {
            if matches.len() >= limit {
                break;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(short) = name.strip_suffix("-reasoning.md") else {
                continue;
            };
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let Some(context) = file_match(&content, keyword) else {
                continue;
            };
            push(
                RecallMatch {
                    commit: short.to_string(),
                    message: message_of(&content),
                    context,
                },
                &mut matches,
            );
        }
    }

    if matches.len() < limit {
        for record in store.query_reasoning(keyword, limit as i64).await {
            if matches.len() >= limit {
                break;
            }
            push(
                RecallMatch {
                    commit: truncate_chars(&record.commit_hash, SHORT_HASH_CHARS).to_string(),
                    message: record.commit_message,
                    context: record.failed_attempts,
                },
                &mut matches,
            );
        }
    }

    matches
}

/// CLI entry point for `recall reasoning generate`.
pub async fn run_generate(config: &Config, commit: &str, message: &str) -> Result<()> {
    let store = Store::open(config).await;
    let path = generate(config, &store, commit, message).await?;
    println!("Generated: {}", path.display());
    store.close().await;
    Ok(())
}

/// CLI entry point for `recall reasoning recall`.
pub async fn run_recall(config: &Config, keyword: &str, limit: usize) -> Result<()> {
    if keyword.trim().is_empty() {
        bail!("A search keyword is required");
    }

    let store = Store::open(config).await;
    let matches = recall(config, &store, keyword, limit).await;
    store.close().await;

    if matches.is_empty() {
        println!("No reasoning records match '{}'.", keyword);
        return Ok(());
    }
    for m in &matches {
        println!("{} {}", m.commit, m.message);
        if !m.context.is_empty() {
            for line in m.context.lines() {
                println!("    {}", line);
            }
        }
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.store.path = root.join("context.db");
        config.knowledge.dir = root.join("knowledge");
        config.artifacts.reasoning_dir = root.join("recall/commits");
        config.artifacts.persistent_reasoning_dir = root.join("thoughts/reasoning");
        config
    }

    #[tokio::test]
    async fn test_generate_writes_both_copies() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let store = Store::open(&config).await;

        let path = generate(&config, &store, "abc123def456", "add retry logic")
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Commit: abc123de\n"));
        assert!(content.contains("## What was committed\nadd retry logic"));
        assert!(content.contains("_No build attempts recorded._"));
        assert!(content.contains("## Files changed"));

        let persistent = config
            .artifacts
            .persistent_reasoning_dir
            .join("abc123de-reasoning.md");
        assert_eq!(std::fs::read_to_string(persistent).unwrap(), content);
        store.close().await;
    }

    #[tokio::test]
    async fn test_generate_rejects_blank_arguments() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let store = Store::open(&config).await;

        assert!(generate(&config, &store, "", "msg").await.is_err());
        assert!(generate(&config, &store, "abc", "  ").await.is_err());
        // No partial state was written
        assert!(!config.artifacts.reasoning_dir.exists());
        store.close().await;
    }

    #[tokio::test]
    async fn test_generate_drains_attempts_journal() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let store = Store::open(&config).await;

        let branch = signals::current_branch();
        let journal = attempts_path(&config, &branch);
        std::fs::create_dir_all(journal.parent().unwrap()).unwrap();
        let mut lines = String::new();
        for i in 0..7 {
            lines.push_str(&format!(
                "{{\"type\":\"build_fail\",\"command\":\"cargo test --all-features\",\"error\":\"failure {}\"}}\n",
                i
            ));
        }
        lines.push_str("{\"type\":\"build_pass\",\"command\":\"cargo test\"}\n");
        std::fs::write(&journal, lines).unwrap();

        let path = generate(&config, &store, "abc123def456", "fix the build")
            .await
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        // Only the last five failures survive
        assert!(content.contains("### Failed attempts"));
        assert!(!content.contains("failure 0"));
        assert!(!content.contains("failure 1"));
        assert!(content.contains("failure 2"));
        assert!(content.contains("failure 6"));
        assert!(content.contains("- `cargo test --all-features...`: failure 6"));
        assert!(content.contains("Build passed after **7 failed attempt(s)**."));

        assert_eq!(std::fs::read_to_string(&journal).unwrap(), "");
        store.close().await;
    }

    #[tokio::test]
    async fn test_recall_matches_files_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let store = Store::open(&config).await;

        generate(&config, &store, "abc123def456", "Refactor the Retry Path")
            .await
            .unwrap();

        let matches = recall(&config, &store, "retry", 5).await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].commit, "abc123de");
        assert_eq!(matches[0].message, "Refactor the Retry Path");
        assert!(matches[0].context.to_lowercase().contains("retry"));

        assert!(recall(&config, &store, "nonexistent", 5).await.is_empty());
        store.close().await;
    }

    #[test]
    fn test_tried_section_empty_command() {
        let attempts = vec![Attempt {
            kind: "build_fail".to_string(),
            command: String::new(),
            error: String::new(),
        }];
        let out = tried_section(&attempts);
        assert!(out.contains("- `unknown...`: unknown error"));
    }
}
