//! Environment signals: platform, project, and recent-activity keywords.
//!
//! Signals steer the context assembler toward what the current working
//! tree is about. Every probe is best-effort: a missing git binary, a
//! detached repo state, or a bare directory just produces fewer signals.

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

use crate::config::Config;
use crate::models::ContextSignals;

const MAX_DIFF_FILES: usize = 10;
const MAX_FILE_KEYWORDS: usize = 5;

/// Resolve the active platform tag.
///
/// Config override first, then project-file markers in the working
/// directory, then `general`.
pub fn current_platform(config: &Config) -> String {
    if let Some(platform) = &config.signals.platform {
        if !platform.is_empty() {
            return platform.clone();
        }
    }
    platform_from_dir(Path::new("."))
}

fn platform_from_dir(dir: &Path) -> String {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return "general".to_string();
    };

    let mut has_package_json = false;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name == "package.swift" || name.ends_with(".xcodeproj") {
            return "ios".to_string();
        }
        if name == "build.gradle" || name == "build.gradle.kts" || name == "settings.gradle" {
            return "android".to_string();
        }
        if name == "package.json" {
            has_package_json = true;
        }
    }
    if has_package_json {
        return "web".to_string();
    }
    "general".to_string()
}

/// Resolve the project name: config override, else the working
/// directory's name.
pub fn project_name(config: &Config) -> String {
    if let Some(project) = &config.signals.project {
        if !project.is_empty() {
            return project.clone();
        }
    }
    std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The checked-out branch name, or `detached` when git cannot say.
pub fn current_branch() -> String {
    git(&["branch", "--show-current"])
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| "detached".to_string())
}

/// Keywords from the current branch name.
///
/// Common flow prefixes and `TASK-<n>-` ticket ids carry no meaning and
/// are stripped before splitting.
pub fn branch_keywords() -> Vec<String> {
    let Some(branch) = git(&["branch", "--show-current"]) else {
        return Vec::new();
    };
    keywords_from_branch(&branch)
}

fn keywords_from_branch(branch: &str) -> Vec<String> {
    let mut name = branch;
    for prefix in ["feature/", "bugfix/", "hotfix/", "release/"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest;
            break;
        }
    }
    let name = strip_ticket_id(name);

    name.split(['-', '_', '/'])
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 2 && !w.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Strip a leading `TASK-<digits>-` ticket id, case-insensitively.
fn strip_ticket_id(name: &str) -> &str {
    let is_ticket = name
        .get(..5)
        .map_or(false, |p| p.eq_ignore_ascii_case("TASK-"));
    if !is_ticket {
        return name;
    }
    let rest = &name[5..];
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return name;
    }
    rest[digits..].strip_prefix('-').unwrap_or(&rest[digits..])
}

/// Keywords from recently changed file names.
pub fn file_keywords() -> Vec<String> {
    let Some(diff) = git(&["diff", "--name-only", "HEAD~3"]) else {
        return Vec::new();
    };
    keywords_from_files(diff.lines())
}

fn keywords_from_files<'a>(files: impl Iterator<Item = &'a str>) -> Vec<String> {
    const EXCLUDED: [&str; 5] = ["index", "main", "app", "test", "spec"];

    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for file in files.take(MAX_DIFF_FILES) {
        let stem = Path::new(file.trim())
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        for word in stem.split(['-', '_', '.']) {
            let word = word.to_lowercase();
            if word.chars().count() <= 3 || EXCLUDED.contains(&word.as_str()) {
                continue;
            }
            if seen.insert(word.clone()) {
                keywords.push(word);
            }
            if keywords.len() >= MAX_FILE_KEYWORDS {
                return keywords;
            }
        }
    }

    keywords
}

/// Gather all signals for one assembler invocation.
pub fn collect(config: &Config) -> ContextSignals {
    ContextSignals {
        platform: current_platform(config),
        project: project_name(config),
        branch_keywords: branch_keywords(),
        file_keywords: file_keywords(),
    }
}
