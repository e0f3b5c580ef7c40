//! Synonym-based query expansion.
//!
//! Rewrites a whitespace-delimited query so that each known term becomes
//! an OR-disjunction of itself and its expansions, e.g. with the default
//! table `"auth crash"` becomes `"(auth OR login OR ...) (crash OR ...)"`.
//! FTS5 treats adjacent groups as an implicit AND, so every original
//! concept must still be satisfied, but each may be satisfied by any of
//! its synonyms. Unknown terms pass through unchanged.

use std::collections::HashMap;

pub fn expand(query: &str, table: &HashMap<String, Vec<String>>) -> String {
    query
        .split_whitespace()
        .map(|term| expand_term(term, table))
        .collect::<Vec<_>>()
        .join(" ")
}

fn expand_term(term: &str, table: &HashMap<String, Vec<String>>) -> String {
    match table.get(&term.to_lowercase()) {
        Some(expansions) if !expansions.is_empty() => {
            let mut parts = vec![term.to_string()];
            parts.extend(expansions.iter().cloned());
            format!("({})", parts.join(" OR "))
        }
        _ => term.to_string(),
    }
}
