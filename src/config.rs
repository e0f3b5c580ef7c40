use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Project-local SQLite database holding the derived index.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".recall/cache/context.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// Per-user directory holding the authoritative knowledge documents.
    #[serde(default = "default_knowledge_dir")]
    pub dir: PathBuf,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: default_knowledge_dir(),
        }
    }
}

fn default_knowledge_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".recall")
        .join("knowledge")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsConfig {
    /// Session handoff logs, one subdirectory per session.
    #[serde(default = "default_handoffs_dir")]
    pub handoffs_dir: PathBuf,
    /// Resolution ledgers with Open Questions sections.
    #[serde(default = "default_ledgers_dir")]
    pub ledgers_dir: PathBuf,
    /// Commit-reasoning documents, one subdirectory per commit.
    #[serde(default = "default_reasoning_dir")]
    pub reasoning_dir: PathBuf,
    /// Git-tracked copies of reasoning documents.
    #[serde(default = "default_persistent_reasoning_dir")]
    pub persistent_reasoning_dir: PathBuf,
    /// Optional project-level notes document with a Known Pitfalls section.
    #[serde(default = "default_project_notes")]
    pub project_notes: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            handoffs_dir: default_handoffs_dir(),
            ledgers_dir: default_ledgers_dir(),
            reasoning_dir: default_reasoning_dir(),
            persistent_reasoning_dir: default_persistent_reasoning_dir(),
            project_notes: default_project_notes(),
        }
    }
}

fn default_handoffs_dir() -> PathBuf {
    PathBuf::from("thoughts/handoffs")
}
fn default_ledgers_dir() -> PathBuf {
    PathBuf::from("thoughts/ledgers")
}
fn default_reasoning_dir() -> PathBuf {
    PathBuf::from(".git/recall/commits")
}
fn default_persistent_reasoning_dir() -> PathBuf {
    PathBuf::from("thoughts/reasoning")
}
fn default_project_notes() -> PathBuf {
    PathBuf::from("PROJECT.md")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SemanticConfig {
    /// Feature tier: 0 disables the vector index entirely, 1+ enables it.
    #[serde(default)]
    pub tier: u8,
    /// Base URL of the vector-index service.
    #[serde(default = "default_semantic_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Per-call timeout; a timeout degrades like any other failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            tier: 0,
            url: default_semantic_url(),
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SemanticConfig {
    pub fn is_enabled(&self) -> bool {
        self.tier > 0
    }
}

fn default_semantic_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_collection() -> String {
    "recall_knowledge".to_string()
}
fn default_timeout_secs() -> u64 {
    3
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    /// Capture session summaries for the Last Session digest section.
    #[serde(default)]
    pub capture_summaries: bool,
    /// Minutes between periodic observation captures; 0 disables.
    #[serde(default)]
    pub capture_interval_minutes: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SignalsConfig {
    /// Override the detected platform tag (e.g. `ios`, `android`, `web`).
    #[serde(default)]
    pub platform: Option<String>,
    /// Project name override; defaults to the working directory basename.
    #[serde(default)]
    pub project: Option<String>,
}

/// Load configuration from a TOML file.
///
/// A missing file is not an error: the defaults apply and every optional
/// feature (semantic tier, session capture) stays disabled.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.semantic.is_enabled() {
        if config.semantic.url.is_empty() {
            anyhow::bail!("semantic.url must be set when semantic.tier > 0");
        }
        if config.semantic.timeout_secs == 0 {
            anyhow::bail!("semantic.timeout_secs must be > 0");
        }
    }

    Ok(config)
}
