//! Knowledge base status overview.
//!
//! Summarizes what the authoritative documents hold, what the index
//! knows, and how much unconsolidated material is waiting in the
//! artifact sources. Used by `recall status` to answer "is consolidation
//! keeping up" at a glance.

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::Config;
use crate::docs;
use crate::extract::section;
use crate::store::Store;

/// Handoff files whose Errors section carries actual errors.
fn pending_handoffs(config: &Config) -> usize {
    let base = &config.artifacts.handoffs_dir;
    if !base.exists() {
        return 0;
    }

    WalkDir::new(base)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with("auto-handoff-") && name.ends_with(".md")
        })
        .filter(|e| {
            std::fs::read_to_string(e.path())
                .ok()
                .and_then(|content| {
                    section(&content, "Errors Encountered")
                        .map(|errors| !errors.is_empty() && errors != "No errors.")
                })
                .unwrap_or(false)
        })
        .count()
}

/// Reasoning documents that recorded failed attempts.
fn pending_reasoning(config: &Config) -> usize {
    let Ok(entries) = std::fs::read_dir(&config.artifacts.reasoning_dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter(|e| {
            std::fs::read_to_string(e.path().join("reasoning.md"))
                .map(|content| content.contains("### Failed attempts"))
                .unwrap_or(false)
        })
        .count()
}

/// Run the status command: inspect documents, index, and sources.
pub async fn run_status(config: &Config) -> Result<()> {
    let knowledge_dir = &config.knowledge.dir;

    let pitfalls = docs::count_pitfall_entries(knowledge_dir);
    let patterns = docs::count_documents(&docs::patterns_dir(knowledge_dir));
    let discoveries = docs::count_documents(&docs::discoveries_dir(knowledge_dir));

    let store = Store::open(config).await;
    let indexed: i64 = store.knowledge_counts().await.values().sum();

    println!("Recall Harness — Status");
    println!("=======================");
    println!();
    println!("  Knowledge dir:  {}", knowledge_dir.display());
    println!("  Store:          {}", config.store.path.display());
    println!(
        "  Semantic tier:  {}",
        if config.semantic.is_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();
    println!("  Pitfalls:       {}", pitfalls);
    println!("  Patterns:       {}", patterns);
    println!("  Discoveries:    {}", discoveries);
    println!("  Indexed rows:   {}", indexed);
    println!();
    println!("  Pending handoffs:  {}", pending_handoffs(config));
    println!("  Pending reasoning: {}", pending_reasoning(config));
    println!();

    store.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.artifacts.handoffs_dir = root.join("handoffs");
        config.artifacts.reasoning_dir = root.join("commits");
        config.store.path = root.join("context.db");
        config.knowledge.dir = root.join("knowledge");
        config
    }

    fn write(path: std::path::PathBuf, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_pending_handoffs_ignores_clean_logs() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        write(
            config.artifacts.handoffs_dir.join("s1/auto-handoff-001.md"),
            "## Errors Encountered\n```\nboom goes the build\n```\n",
        );
        write(
            config.artifacts.handoffs_dir.join("s2/auto-handoff-001.md"),
            "## Errors Encountered\nNo errors.\n",
        );
        assert_eq!(pending_handoffs(&config), 1);
    }

    #[test]
    fn test_pending_reasoning_requires_failed_attempts() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        write(
            config.artifacts.reasoning_dir.join("aaa/reasoning.md"),
            "## What was tried\n\n### Failed attempts\n- boom\n",
        );
        write(
            config.artifacts.reasoning_dir.join("bbb/reasoning.md"),
            "## What was tried\n\n### Summary\nBuild passed on first try.\n",
        );
        assert_eq!(pending_reasoning(&config), 1);
        assert_eq!(pending_handoffs(&config), 0);
    }
}
