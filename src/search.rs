//! Keyword, semantic, and hybrid retrieval over the knowledge store.
//!
//! Keyword search shapes the query (synonym expansion, result projection)
//! and delegates ranking to the FTS5 relevance function. Hybrid search
//! merges semantic and keyword hits with a fixed, deliberately simple
//! policy: semantic hits first in their returned order scored by
//! `1 - distance`, then keyword-only hits at a constant fallback score.
//! The fallback constant is not normalized against the semantic score
//! distribution; downstream consumers depend on the exact merge order.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::{EntryKind, SearchHit, SemanticHit};
use crate::semantic::SemanticSearch;
use crate::store::Store;
use crate::synonym;

/// Score assigned to hits that only matched the keyword channel.
pub const KEYWORD_FALLBACK_SCORE: f64 = 0.5;

/// Synonym-expanded full-text search.
///
/// Ranking is the FTS5 rank; the projection keeps only the fields the
/// digest and CLI need. The kind filter rides down into the store query
/// so a filtered search fills its limit instead of post-filtering an
/// already-capped result set.
pub async fn keyword_search(
    store: &Store,
    query: &str,
    limit: i64,
    kind_filter: Option<EntryKind>,
) -> Vec<SearchHit> {
    let table = store.synonyms().await;
    let expanded = synonym::expand(query, &table);

    store
        .query_knowledge(&expanded, limit, kind_filter)
        .await
        .into_iter()
        .map(|entry| SearchHit {
            id: entry.id,
            kind: entry.kind.as_str().to_string(),
            title: entry.title,
            platform: entry.platform,
            created_at: entry.created_at,
            score: KEYWORD_FALLBACK_SCORE,
        })
        .collect()
}

/// Merge semantic and keyword hits into one ranked, deduplicated list.
///
/// Semantic hits enter first in their returned order with score
/// `1 - distance`; keyword-only hits follow in their returned order at
/// [`KEYWORD_FALLBACK_SCORE`]; the result is truncated to `limit`.
pub fn merge_hybrid(
    semantic: &[SemanticHit],
    keyword: &[SearchHit],
    limit: usize,
) -> Vec<SearchHit> {
    let mut merged: Vec<SearchHit> = Vec::new();

    for hit in semantic {
        if merged.iter().any(|m| m.id == hit.id) {
            continue;
        }
        let meta = |key: &str| hit.metadata.get(key).cloned().unwrap_or_default();
        merged.push(SearchHit {
            id: hit.id.clone(),
            kind: meta("kind"),
            title: meta("title"),
            platform: meta("platform"),
            created_at: meta("created_at"),
            score: 1.0 - hit.distance,
        });
    }

    for hit in keyword {
        if merged.iter().any(|m| m.id == hit.id) {
            continue;
        }
        let mut hit = hit.clone();
        hit.score = KEYWORD_FALLBACK_SCORE;
        merged.push(hit);
    }

    merged.truncate(limit);
    merged
}

/// Hybrid retrieval: semantic when available, exactly the keyword output
/// otherwise.
pub async fn hybrid_search(
    store: &Store,
    semantic: &SemanticSearch,
    query: &str,
    limit: i64,
    kind_filter: Option<EntryKind>,
) -> Vec<SearchHit> {
    let keyword_hits = keyword_search(store, query, limit, kind_filter).await;

    if !semantic.ensure_initialized().await {
        return keyword_hits;
    }

    let filter = kind_filter.map(|kind| {
        let mut f = std::collections::BTreeMap::new();
        f.insert("kind".to_string(), kind.as_str().to_string());
        f
    });
    let semantic_hits = semantic.search(query, limit as usize, filter.as_ref()).await;

    merge_hybrid(&semantic_hits, &keyword_hits, limit as usize)
}

/// CLI entry point for `recall search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    mode: &str,
    kind: Option<String>,
    limit: Option<i64>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    match mode {
        "keyword" | "semantic" | "hybrid" => {}
        _ => bail!(
            "Unknown search mode: {}. Use keyword, semantic, or hybrid.",
            mode
        ),
    }

    let kind_filter = match kind.as_deref() {
        Some(s) => match EntryKind::parse(s) {
            Some(kind) => Some(kind),
            None => bail!("Unknown entry kind: {}. Use pitfall, pattern, or decision.", s),
        },
        None => None,
    };

    let limit = limit.unwrap_or(10);
    let store = Store::open(config).await;
    let semantic = SemanticSearch::new(config.semantic.clone());

    let hits = match mode {
        "keyword" => keyword_search(&store, query, limit, kind_filter).await,
        "semantic" => {
            let filter = kind_filter.map(|kind| {
                let mut f = std::collections::BTreeMap::new();
                f.insert("kind".to_string(), kind.as_str().to_string());
                f
            });
            let semantic_hits = semantic.search(query, limit as usize, filter.as_ref()).await;
            merge_hybrid(&semantic_hits, &[], limit as usize)
        }
        _ => hybrid_search(&store, &semantic, query, limit, kind_filter).await,
    };

    if hits.is_empty() {
        println!("No results.");
        store.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] [{}] {}", i + 1, hit.score, hit.kind, hit.title);
        if !hit.platform.is_empty() {
            println!("    platform: {}", hit.platform);
        }
        if !hit.created_at.is_empty() {
            println!("    created: {}", &hit.created_at[..hit.created_at.len().min(10)]);
        }
        println!("    id: {}", hit.id);
        println!();
    }

    store.close().await;
    Ok(())
}

/// CLI entry point for `recall list`.
pub async fn run_list(config: &Config, kind: Option<String>) -> Result<()> {
    let kind_filter = match kind.as_deref() {
        Some(s) => match EntryKind::parse(s) {
            Some(kind) => Some(kind),
            None => bail!("Unknown entry kind: {}. Use pitfall, pattern, or decision.", s),
        },
        None => None,
    };

    let store = Store::open(config).await;
    let entries = store.list_knowledge(kind_filter).await;

    if entries.is_empty() {
        println!("No entries.");
        store.close().await;
        return Ok(());
    }

    for entry in &entries {
        println!(
            "[{}] [{}] {}",
            entry.kind.as_str(),
            entry.platform,
            entry.title
        );
        println!("    {} ({})", entry.id, &entry.created_at[..entry.created_at.len().min(10)]);
    }
    println!();
    println!("{} entries", entries.len());

    store.close().await;
    Ok(())
}
