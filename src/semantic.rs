//! Optional semantic retrieval over an external vector index.
//!
//! The underlying client is an opaque capability (the [`VectorIndex`]
//! trait) rather than a dependency on one service's shape. The shipped
//! implementation, [`HttpVectorIndex`], talks to a local Chroma-style
//! vector service over REST; the service computes embeddings itself, so
//! this module never handles raw vectors.
//!
//! [`SemanticSearch`] wraps the capability in a three-state machine:
//! `Uninitialized -> Available | Unavailable`. The transition is attempted
//! lazily on first use and at most once per process. Any failure during
//! initialization (disabled tier, missing service, connection error,
//! timeout) parks the adapter in `Unavailable` for the rest of the process
//! lifetime, and all operations become no-ops returning empty or false.
//! Callers interpret result distances as cosine distance and convert to a
//! similarity score via `1.0 - distance`.

use async_trait::async_trait;
use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::SemanticConfig;
use crate::models::SemanticHit;

/// Default number of entries per upsert call during bulk mirroring.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One entry destined for the vector index.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// Opaque vector-index capability: upsert, query, delete, count.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()>;
    async fn query(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&BTreeMap<String, String>>,
    ) -> Result<Vec<SemanticHit>>;
    async fn delete(&self, ids: &[String]) -> Result<()>;
    async fn count(&self) -> Result<u64>;
}

enum AdapterState {
    Uninitialized,
    Available(Box<dyn VectorIndex>),
    Unavailable,
}

/// Lazily-initialized wrapper around the vector index.
pub struct SemanticSearch {
    config: SemanticConfig,
    state: Mutex<AdapterState>,
}

impl SemanticSearch {
    pub fn new(config: SemanticConfig) -> Self {
        Self {
            config,
            state: Mutex::new(AdapterState::Uninitialized),
        }
    }

    /// An adapter that is permanently unavailable.
    pub fn disabled() -> Self {
        Self {
            config: SemanticConfig::default(),
            state: Mutex::new(AdapterState::Unavailable),
        }
    }

    /// An adapter backed by a caller-supplied index, already available.
    /// Used by tests and embedders that bring their own client.
    pub fn with_index(index: Box<dyn VectorIndex>) -> Self {
        Self {
            config: SemanticConfig::default(),
            state: Mutex::new(AdapterState::Available(index)),
        }
    }

    /// Attempt the one-time state transition; true when available.
    pub async fn ensure_initialized(&self) -> bool {
        let mut state = self.state.lock().await;
        if let AdapterState::Uninitialized = *state {
            *state = if !self.config.is_enabled() {
                AdapterState::Unavailable
            } else {
                match HttpVectorIndex::connect(&self.config).await {
                    Ok(index) => AdapterState::Available(Box::new(index)),
                    Err(_) => AdapterState::Unavailable,
                }
            };
        }
        matches!(*state, AdapterState::Available(_))
    }

    pub async fn upsert(&self, id: &str, text: &str, metadata: BTreeMap<String, String>) -> bool {
        if !self.ensure_initialized().await {
            return false;
        }
        let entry = VectorEntry {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
        };
        let state = self.state.lock().await;
        match &*state {
            AdapterState::Available(index) => index.upsert(std::slice::from_ref(&entry)).await.is_ok(),
            _ => false,
        }
    }

    /// Upsert in batches; returns the number of entries accepted.
    pub async fn upsert_batch(&self, entries: &[VectorEntry], batch_size: usize) -> usize {
        if entries.is_empty() || !self.ensure_initialized().await {
            return 0;
        }
        let batch_size = batch_size.max(1);
        let state = self.state.lock().await;
        let AdapterState::Available(index) = &*state else {
            return 0;
        };

        let mut total = 0;
        for batch in entries.chunks(batch_size) {
            if index.upsert(batch).await.is_ok() {
                total += batch.len();
            }
        }
        total
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&BTreeMap<String, String>>,
    ) -> Vec<SemanticHit> {
        if !self.ensure_initialized().await {
            return Vec::new();
        }
        let state = self.state.lock().await;
        match &*state {
            AdapterState::Available(index) => {
                index.query(query, limit, filter).await.unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    pub async fn count(&self) -> u64 {
        if !self.ensure_initialized().await {
            return 0;
        }
        let state = self.state.lock().await;
        match &*state {
            AdapterState::Available(index) => index.count().await.unwrap_or(0),
            _ => 0,
        }
    }

    pub async fn delete(&self, ids: &[String]) -> bool {
        if !self.ensure_initialized().await {
            return false;
        }
        let state = self.state.lock().await;
        match &*state {
            AdapterState::Available(index) => index.delete(ids).await.is_ok(),
            _ => false,
        }
    }
}

// ============ HTTP implementation ============

/// REST client for a Chroma-style vector service.
///
/// The collection is created (or opened) with cosine distance during
/// [`HttpVectorIndex::connect`]; embeddings are computed server-side from
/// the submitted document text.
pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    collection_id: String,
}

impl HttpVectorIndex {
    pub async fn connect(config: &SemanticConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config.url.trim_end_matches('/').to_string();
        let response = client
            .post(format!("{}/api/v1/collections", base_url))
            .json(&json!({
                "name": config.collection,
                "metadata": { "hnsw:space": "cosine" },
                "get_or_create": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Vector service returned {}", response.status());
        }

        let body: Value = response.json().await?;
        let collection_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Vector service response missing collection id"))?
            .to_string();

        Ok(Self {
            client,
            base_url,
            collection_id,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{}",
            self.base_url, self.collection_id, suffix
        )
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let documents: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let metadatas: Vec<&BTreeMap<String, String>> =
            entries.iter().map(|e| &e.metadata).collect();

        let response = self
            .client
            .post(self.collection_url("upsert"))
            .json(&json!({
                "ids": ids,
                "documents": documents,
                "metadatas": metadatas,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Upsert failed with {}", response.status());
        }
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        limit: usize,
        filter: Option<&BTreeMap<String, String>>,
    ) -> Result<Vec<SemanticHit>> {
        let mut request = json!({
            "query_texts": [text],
            "n_results": limit,
        });
        if let Some(filter) = filter {
            if !filter.is_empty() {
                request["where"] = json!(filter);
            }
        }

        let response = self
            .client
            .post(self.collection_url("query"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Query failed with {}", response.status());
        }

        let body: Value = response.json().await?;
        let Some(ids) = body.get("ids").and_then(|v| v.get(0)).and_then(|v| v.as_array()) else {
            return Ok(Vec::new());
        };

        let distances = body.get("distances").and_then(|v| v.get(0));
        let metadatas = body.get("metadatas").and_then(|v| v.get(0));

        let hits = ids
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                let id = id.as_str()?.to_string();
                let distance = distances
                    .and_then(|d| d.get(i))
                    .and_then(|d| d.as_f64())
                    .unwrap_or(1.0);
                let metadata = metadatas
                    .and_then(|m| m.get(i))
                    .and_then(|m| m.as_object())
                    .map(|obj| {
                        obj.iter()
                            .filter_map(|(k, v)| {
                                v.as_str().map(|s| (k.clone(), s.to_string()))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Some(SemanticHit {
                    id,
                    distance,
                    metadata,
                })
            })
            .collect();

        Ok(hits)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let response = self
            .client
            .post(self.collection_url("delete"))
            .json(&json!({ "ids": ids }))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Delete failed with {}", response.status());
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .get(self.collection_url("count"))
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Count failed with {}", response.status());
        }
        let count: u64 = response.json().await?;
        Ok(count)
    }
}
