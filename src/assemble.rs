//! The context assembler.
//!
//! Builds a compact digest of the knowledge most likely to matter for the
//! current working tree, under hard character budgets so the digest can
//! be injected into a bounded context window. Four sections, each omitted
//! when empty: platform pitfalls, keyword-related knowledge, recent
//! discoveries, and the last session summary.

use std::time::Duration;

use crate::config::Config;
use crate::docs;
use crate::extract::truncate_chars;
use crate::models::{ContextDigest, ContextSignals};
use crate::signals;
use crate::store::Store;

pub const TOTAL_BUDGET: usize = 2500;
pub const PITFALLS_BUDGET: usize = 600;
pub const RELATED_BUDGET: usize = 500;
pub const DISCOVERIES_BUDGET: usize = 400;
pub const SESSION_BUDGET: usize = 500;

const DISCOVERY_MAX_AGE: Duration = Duration::from_secs(7 * 86_400);
const DISCOVERY_LIMIT: usize = 3;

/// Assemble the digest for the given signals.
pub async fn assemble(config: &Config, store: &Store, signals: &ContextSignals) -> ContextDigest {
    let mut sections: Vec<String> = Vec::new();
    let mut sources: Vec<String> = Vec::new();

    let pitfalls = docs::load_pitfalls(&config.knowledge.dir, &signals.platform, PITFALLS_BUDGET);
    if !pitfalls.is_empty() {
        sections.push(format!(
            "### Known Pitfalls ({})\n{}",
            signals.platform,
            pitfalls.trim_end()
        ));
        sources.push(format!("pitfalls:{}", signals.platform));
    }

    let keywords = signals.all_keywords();
    if !keywords.is_empty() {
        let related = related_section(store, &keywords).await;
        if !related.is_empty() {
            sections.push(format!("### Related Knowledge\n{}", related));
            sources.push("knowledge".to_string());
        }
    }

    let discoveries = discoveries_section(config);
    if !discoveries.is_empty() {
        sections.push(format!("### Recent Discoveries\n{}", discoveries));
        sources.push("discoveries".to_string());
    }

    let session = session_section(store, &signals.project).await;
    if !session.is_empty() {
        sections.push(format!("### Last Session\n{}", session));
        sources.push("session".to_string());
    }

    if sections.is_empty() {
        return ContextDigest {
            digest: String::new(),
            sources: Vec::new(),
            total_chars: 0,
        };
    }

    let digest = format!("## Relevant Knowledge\n\n{}", sections.join("\n\n"));
    let digest = trim_to_budget(&digest, TOTAL_BUDGET);
    let total_chars = digest.chars().count();

    ContextDigest {
        digest,
        sources,
        total_chars,
    }
}

/// Knowledge entries matching the activity keywords, one line each,
/// appended while the next line still fits the budget.
async fn related_section(store: &Store, keywords: &[String]) -> String {
    let query = keywords.join(" OR ");
    let entries = store.query_knowledge(&query, 10, None).await;

    let mut out = String::new();
    for entry in entries {
        let line = format!(
            "- [{}] {}: {}",
            entry.kind.as_str(),
            entry.title,
            truncate_chars(&entry.problem, 80)
        );
        if out.chars().count() + line.chars().count() + 1 > RELATED_BUDGET {
            break;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn discoveries_section(config: &Config) -> String {
    let recent =
        docs::recent_discoveries(&config.knowledge.dir, DISCOVERY_MAX_AGE, DISCOVERY_LIMIT);

    let mut out = String::new();
    for discovery in recent {
        let line = if discovery.what.is_empty() {
            format!("- {}", discovery.title)
        } else {
            format!("- {}: {}", discovery.title, truncate_chars(&discovery.what, 80))
        };
        if out.chars().count() + line.chars().count() + 1 > DISCOVERIES_BUDGET {
            break;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

async fn session_section(store: &Store, project: &str) -> String {
    let Some(summary) = store.latest_session_summary(project).await else {
        return String::new();
    };

    let mut out = String::new();
    for (label, value) in [
        ("Request", &summary.request),
        ("Completed", &summary.completed),
        ("Next", &summary.next_steps),
    ] {
        if value.is_empty() {
            continue;
        }
        let line = format!("{}: {}", label, truncate_chars(value, 120));
        if out.chars().count() + line.chars().count() + 1 > SESSION_BUDGET {
            break;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Hard-truncate to `budget` characters, then back up to the last newline
/// when it falls in the final fifth of the budget so the digest does not
/// end mid-line.
fn trim_to_budget(digest: &str, budget: usize) -> String {
    if digest.chars().count() <= budget {
        return digest.to_string();
    }
    let cut = truncate_chars(digest, budget);
    match cut.rfind('\n') {
        Some(pos) if cut[..pos].chars().count() * 10 >= budget * 8 => cut[..pos].to_string(),
        _ => cut.to_string(),
    }
}

/// CLI entry point for `recall assemble`.
pub async fn run_assemble(config: &Config) -> anyhow::Result<()> {
    let signals = signals::collect(config);
    let store = Store::open(config).await;
    let digest = assemble(config, &store, &signals).await;
    store.close().await;

    if digest.digest.is_empty() {
        println!("No relevant knowledge.");
        return Ok(());
    }
    println!("{}", digest.digest);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionSummary;
    use tempfile::TempDir;

    fn config_in(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.store.path = root.join("context.db");
        config.knowledge.dir = root.join("knowledge");
        config.signals.project = Some("demo".to_string());
        config.signals.platform = Some("ios".to_string());
        config
    }

    fn empty_signals() -> ContextSignals {
        ContextSignals {
            platform: "ios".to_string(),
            project: "demo".to_string(),
            branch_keywords: Vec::new(),
            file_keywords: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_all_sections_empty_yields_empty_digest() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let store = Store::open(&config).await;

        let digest = assemble(&config, &store, &empty_signals()).await;
        assert!(digest.digest.is_empty());
        assert!(digest.sources.is_empty());
        assert_eq!(digest.total_chars, 0);
        store.close().await;
    }

    #[tokio::test]
    async fn test_pitfalls_and_session_sections() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());

        let path = docs::pitfalls_path(&config.knowledge.dir, "ios");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "# IOS Pitfalls\n\n### Simulator drift\nclock lags\n").unwrap();

        let store = Store::open(&config).await;
        store
            .save_session_summary(&SessionSummary {
                id: "s1".to_string(),
                project: "demo".to_string(),
                request: "add retry logic".to_string(),
                completed: "retry module".to_string(),
                next_steps: "wire into the client".to_string(),
                decisions: String::new(),
                created_at: "2026-01-05T12:00:00Z".to_string(),
                created_at_epoch: 1_767_614_400,
            })
            .await;

        let digest = assemble(&config, &store, &empty_signals()).await;
        assert!(digest.digest.starts_with("## Relevant Knowledge"));
        assert!(digest.digest.contains("### Known Pitfalls (ios)"));
        assert!(digest.digest.contains("Simulator drift"));
        assert!(digest.digest.contains("Request: add retry logic"));
        assert_eq!(digest.sources, vec!["pitfalls:ios", "session"]);
        assert_eq!(digest.total_chars, digest.digest.chars().count());
        store.close().await;
    }

    #[tokio::test]
    async fn test_related_section_requires_keywords() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let store = Store::open(&config).await;
        store
            .upsert_knowledge(&crate::models::KnowledgeEntry {
                id: "p1".to_string(),
                kind: crate::models::EntryKind::Pitfall,
                platform: "ios".to_string(),
                title: "Gateway timeout on retry".to_string(),
                problem: "the gateway drops slow retries".to_string(),
                solution: "raise the deadline".to_string(),
                source_project: "demo".to_string(),
                source_session: "s1".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
                file_path: "/tmp/p.md".to_string(),
            })
            .await;

        // No keywords: the matching entry is not consulted
        let without = assemble(&config, &store, &empty_signals()).await;
        assert!(!without.digest.contains("Gateway timeout"));

        let mut signals = empty_signals();
        signals.branch_keywords = vec!["gateway".to_string()];
        let with = assemble(&config, &store, &signals).await;
        assert!(with.digest.contains("### Related Knowledge"));
        assert!(with.digest.contains("- [pitfall] Gateway timeout on retry:"));
        assert_eq!(with.sources, vec!["knowledge"]);
        store.close().await;
    }

    #[test]
    fn test_trim_to_budget_backs_up_to_newline() {
        // Lines land a newline inside the final fifth of the budget
        let text = format!("{}\n{}", "a".repeat(90), "b".repeat(30));
        let trimmed = trim_to_budget(&text, 100);
        assert_eq!(trimmed, "a".repeat(90));

        // Newline too early: hard cut stands
        let text = format!("{}\n{}", "a".repeat(20), "b".repeat(200));
        let trimmed = trim_to_budget(&text, 100);
        assert_eq!(trimmed.chars().count(), 100);

        // Under budget: untouched
        assert_eq!(trim_to_budget("short", 100), "short");
    }

    #[test]
    fn test_discoveries_section_caps_lines() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        let dir = docs::discoveries_dir(&config.knowledge.dir);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..5 {
            std::fs::write(
                dir.join(format!("2026-01-0{}-thing-{}.md", i + 1, i)),
                format!("# Discovery: Thing {}\n\n## What\ndetail {}\n", i, i),
            )
            .unwrap();
        }

        let section = discoveries_section(&config);
        // Only the three most recent files contribute
        assert_eq!(section.lines().count(), 3);
        assert!(section.starts_with("- Thing "));
    }
}
