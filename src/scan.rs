//! Artifact-source scanners.
//!
//! Each scanner reads one kind of unstructured session artifact and
//! produces [`Candidate`] entries for the consolidator. A missing
//! directory, a missing section, or an empty section yields no candidates
//! rather than an error: artifacts are best-effort evidence, not inputs
//! under our control.

use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::extract::{fenced_blocks, first_line, resolved_item, section, subsection, titled_blocks, truncate_chars};
use crate::models::Candidate;

/// Minimum length for a fenced error block to be worth keeping.
const MIN_ERROR_CHARS: usize = 10;
/// Problem text is bounded at ingestion.
pub const MAX_PROBLEM_CHARS: usize = 300;

/// Infer a platform tag from artifact content markers.
pub fn platform_from_content(content: &str) -> &'static str {
    let lower = content.to_lowercase();
    if lower.contains(".swift") || lower.contains("swiftui") || lower.contains("xcode") {
        "ios"
    } else if lower.contains(".kt") || lower.contains("kotlin") || lower.contains("gradle") {
        "android"
    } else if lower.contains(".tsx") || lower.contains(".jsx") || lower.contains("react") {
        "web"
    } else {
        "general"
    }
}

/// Scan handoff logs for fenced error blocks.
///
/// Layout: `<handoffs>/<session>/auto-handoff-*.md`, each with an
/// `## Errors Encountered` section. Sections reading `No errors.` and
/// blocks under [`MIN_ERROR_CHARS`] are skipped.
pub fn scan_handoffs(config: &Config) -> Vec<Candidate> {
    let base = &config.artifacts.handoffs_dir;
    if !base.exists() {
        return Vec::new();
    }

    let mut candidates = Vec::new();

    for entry in WalkDir::new(base)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with("auto-handoff-") || !name.ends_with(".md") {
            continue;
        }
        let session = entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let Some(errors) = section(&content, "Errors Encountered") else {
            continue;
        };
        if errors.is_empty() || errors == "No errors." {
            continue;
        }

        let platform = platform_from_content(&content);
        for block in fenced_blocks(errors) {
            if block.chars().count() < MIN_ERROR_CHARS {
                continue;
            }
            let headline = truncate_chars(first_line(&block), 80);
            candidates.push(Candidate {
                title: format!("Error: {}", headline),
                problem: truncate_chars(&block, MAX_PROBLEM_CHARS).to_string(),
                solution: "See handoff log for context".to_string(),
                session: session.clone(),
                platform: Some(platform.to_string()),
            });
        }
    }

    candidates
}

/// Scan commit-reasoning documents.
///
/// Failed attempts take priority: when a commit carries a non-empty
/// `### Failed attempts` section it becomes an anti-pattern candidate and
/// the commit contributes nothing else. Otherwise a commit with a message
/// and changed-file evidence yields a decision-shaped candidate.
pub fn scan_reasoning(config: &Config) -> Vec<Candidate> {
    let dir = &config.artifacts.reasoning_dir;
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut candidates = Vec::new();

    for entry in entries.flatten() {
        let commit = entry.file_name().to_string_lossy().to_string();
        let path = entry.path().join("reasoning.md");
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };

        let short = truncate_chars(&commit, 8).to_string();
        let message = section(&content, "What was committed")
            .map(|s| first_line(s).to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| short.clone());

        if let Some(failed) = subsection(&content, "Failed attempts") {
            if !failed.is_empty() {
                candidates.push(Candidate {
                    title: format!("Failed approach: {}", truncate_chars(&message, 60)),
                    problem: truncate_chars(failed, MAX_PROBLEM_CHARS).to_string(),
                    solution: format!("Resolved in commit {}", short),
                    session: short,
                    platform: None,
                });
                continue;
            }
        }

        let files = section(&content, "Files changed").unwrap_or("");
        if !message.is_empty() && !files.is_empty() {
            candidates.push(Candidate {
                title: format!("Decision: {}", truncate_chars(&message, 60)),
                problem: format!("Files: {}", truncate_chars(files, 200)),
                solution: message,
                session: short,
                platform: None,
            });
        }
    }

    candidates
}

/// Scan resolution ledgers for resolved open questions.
pub fn scan_ledgers(config: &Config) -> Vec<Candidate> {
    let dir = &config.artifacts.ledgers_dir;
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut candidates = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "md") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Some(questions) = section(&content, "Open Questions") else {
            continue;
        };

        let ledger = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        for line in questions.lines() {
            let Some(question) = resolved_item(line) else {
                continue;
            };
            candidates.push(Candidate {
                title: format!("Decision: {}", truncate_chars(&question, 60)),
                problem: question.clone(),
                solution: "Resolved during development".to_string(),
                session: ledger.clone(),
                platform: None,
            });
        }
    }

    candidates
}

/// Scan the optional project notes document for Known Pitfalls entries.
pub fn scan_project_notes(config: &Config) -> Vec<Candidate> {
    let path = &config.artifacts.project_notes;
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let Some(pitfalls) = section(&content, "Known Pitfalls") else {
        return Vec::new();
    };

    let session = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project-notes")
        .to_string();

    titled_blocks(pitfalls)
        .into_iter()
        .map(|(title, body)| Candidate {
            title,
            problem: truncate_chars(&body, MAX_PROBLEM_CHARS).to_string(),
            solution: "See project notes".to_string(),
            session: session.clone(),
            platform: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config_in(root: &Path) -> Config {
        let mut config = Config::default();
        config.artifacts.handoffs_dir = root.join("handoffs");
        config.artifacts.ledgers_dir = root.join("ledgers");
        config.artifacts.reasoning_dir = root.join("commits");
        config.artifacts.project_notes = root.join("PROJECT.md");
        config.store.path = root.join("context.db");
        config.knowledge.dir = root.join("knowledge");
        config
    }

    fn write(path: PathBuf, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_handoffs_extracts_error_blocks() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        write(
            config.artifacts.handoffs_dir.join("s1/auto-handoff-001.md"),
            "# Handoff\n\n## Errors Encountered\n```\nTypeError: cannot read null\n  at loader.tsx:10\n```\n\n## Next\nok\n",
        );
        // A handoff with no errors contributes nothing
        write(
            config.artifacts.handoffs_dir.join("s2/auto-handoff-002.md"),
            "# Handoff\n\n## Errors Encountered\nNo errors.\n",
        );

        let found = scan_handoffs(&config);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Error: TypeError: cannot read null");
        assert_eq!(found[0].session, "s1");
        // .tsx marker in the stack trace implies web
        assert_eq!(found[0].platform.as_deref(), Some("web"));
    }

    #[test]
    fn test_scan_handoffs_skips_tiny_blocks_and_missing_section() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        write(
            config.artifacts.handoffs_dir.join("s1/auto-handoff-001.md"),
            "## Errors Encountered\n```\nshort\n```\n",
        );
        write(
            config.artifacts.handoffs_dir.join("s1/auto-handoff-002.md"),
            "## Summary\nno error section at all\n",
        );
        assert!(scan_handoffs(&config).is_empty());
    }

    #[test]
    fn test_scan_reasoning_prefers_failed_attempts() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        write(
            config.artifacts.reasoning_dir.join("abc12345def/reasoning.md"),
            "# Commit\n\n## What was committed\nadd retry logic\n\n## What was tried\n\n### Failed attempts\n- `cargo test...`: flaky timeout\n\n### Summary\nPassed after 1 failed attempt.\n\n## Files changed\n- src/retry.rs\n",
        );
        write(
            config.artifacts.reasoning_dir.join("fedcba98765/reasoning.md"),
            "# Commit\n\n## What was committed\nrename module\n\n## Files changed\n- src/lib.rs\n",
        );

        let mut found = scan_reasoning(&config);
        found.sort_by(|a, b| a.title.cmp(&b.title));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Decision: rename module");
        assert_eq!(found[0].solution, "rename module");
        assert_eq!(found[1].title, "Failed approach: add retry logic");
        assert!(found[1].problem.contains("flaky timeout"));
        assert_eq!(found[1].solution, "Resolved in commit abc12345");
    }

    #[test]
    fn test_scan_reasoning_no_files_no_candidate() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        write(
            config.artifacts.reasoning_dir.join("aaa/reasoning.md"),
            "## What was committed\nmessage only\n",
        );
        assert!(scan_reasoning(&config).is_empty());
    }

    #[test]
    fn test_scan_ledgers_only_resolved_items() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        write(
            config.artifacts.ledgers_dir.join("TASK-42.md"),
            "# Ledger\n\n## Open Questions\n- [ ] Still open question\n- [x] Use WAL mode for the store?\n- ~~Keep the legacy schema~~\n",
        );

        let found = scan_ledgers(&config);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Decision: Use WAL mode for the store?");
        assert_eq!(found[0].solution, "Resolved during development");
        assert_eq!(found[1].title, "Decision: Keep the legacy schema");
        assert_eq!(found[0].session, "TASK-42");
    }

    #[test]
    fn test_scan_project_notes() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        write(
            config.artifacts.project_notes.clone(),
            "# Project\n\n## Known Pitfalls\n\n### Simulator clock drift\nThe simulator clock lags behind wall time.\n\n### Build cache poisoning\nStale artifacts survive clean builds.\n\n## Conventions\nirrelevant\n",
        );

        let found = scan_project_notes(&config);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Simulator clock drift");
        assert!(found[0].problem.contains("lags behind"));
        assert_eq!(found[0].solution, "See project notes");
    }

    #[test]
    fn test_missing_sources_yield_empty() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        assert!(scan_handoffs(&config).is_empty());
        assert!(scan_reasoning(&config).is_empty());
        assert!(scan_ledgers(&config).is_empty());
        assert!(scan_project_notes(&config).is_empty());
    }
}
