//! The Retrieval Engine — "Tag-Walker": hybrid Anchor (weighted full-text)
//! and Neighbor-Walk (tag traversal) search over the Compound/Molecule/Atom
//! graph (`spec.md` §4.G).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;

use crate::config::Config;
use crate::persistence::{Backend, MoleculeRecord};

/// Number of top-anchor molecules whose tags/buckets get harvested for
/// the Neighbor-Walk phase.
const TAG_HARVEST_K: usize = 10;
/// Soft timeout: retrieval tries to finish within this window.
const SOFT_TIMEOUT: Duration = Duration::from_millis(200);
/// Hard timeout: whichever phase is running is cut short here.
const HARD_TIMEOUT: Duration = Duration::from_secs(2);
const ARCHIVE_DECAY: f64 = 0.5;
const RECENT_BOOST: f64 = 1.1;
const RECENT_WINDOW_MS: i64 = 14 * 24 * 60 * 60 * 1000;

/// A ranked result carrying everything needed to rehydrate surrounding
/// context (`spec.md` §4.G step 7).
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub source_path: String,
    pub compound_id: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub tags: Vec<String>,
    pub timestamp_ms: i64,
    pub score: f64,
}

/// The full response to a `search()` call, including the truncation flag
/// set when the hard timeout cut a phase short (`spec.md` §5).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub truncated: bool,
}

/// Sanitize a raw query string for the FTS index: strip characters that
/// would otherwise crash the parser (`spec.md` §4.G step 1).
#[must_use]
pub fn sanitize_query(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|term| term.chars().filter(|c| c.is_alphanumeric() || *c == '_' || *c == '#').collect::<String>())
        .filter(|term: &String| !term.is_empty())
        .collect()
}

pub struct RetrievalEngine {
    backend: Arc<dyn Backend>,
    config: Config,
}

impl RetrievalEngine {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Self {
        Self { backend, config }
    }

    /// Run the Anchor + Neighbor-Walk search within `budget_bytes` (or the
    /// configured default).
    ///
    /// Each phase is timed independently against [`HARD_TIMEOUT`] so a slow
    /// Neighbor-Walk can never discard an Anchor phase that already
    /// finished: a hard-timeout on the Anchor phase returns an empty,
    /// truncated response, but a hard-timeout on Neighbor-Walk falls back
    /// to the Anchor results alone, still marked `truncated` (`spec.md` §5).
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, budget_bytes: Option<usize>, now_ms: i64) -> SearchResponse {
        let budget = budget_bytes.unwrap_or(self.config.retrieval_budget_bytes);
        let terms = sanitize_query(query);
        let anchor_budget = (budget as f64 * self.config.retrieval_anchor_fraction) as usize;

        let started = Instant::now();
        let anchor = match tokio::time::timeout(HARD_TIMEOUT, async {
            tokio::time::timeout(SOFT_TIMEOUT, self.anchor_phase(&terms, anchor_budget, now_ms))
                .await
                .unwrap_or_default()
        })
        .await
        {
            Ok(anchor) => anchor,
            Err(_) => return SearchResponse { results: Vec::new(), truncated: true },
        };

        let anchor_bytes: usize = anchor.iter().map(|r| r.content.len()).sum();
        let anchor_ids: Vec<String> = anchor.iter().map(|r| r.id.clone()).collect();
        let harvested_tags = harvest_tags(&anchor, TAG_HARVEST_K);
        let neighbor_budget = budget.saturating_sub(anchor_bytes);

        let remaining = HARD_TIMEOUT.saturating_sub(started.elapsed());
        match tokio::time::timeout(
            remaining,
            self.neighbor_phase(&harvested_tags, &terms, &anchor_ids, neighbor_budget, now_ms),
        )
        .await
        {
            Ok(neighbor) => {
                let mut results = anchor;
                results.extend(neighbor);
                SearchResponse { results, truncated: false }
            }
            Err(_) => SearchResponse { results: anchor, truncated: true },
        }
    }

    async fn anchor_phase(&self, terms: &[String], budget_bytes: usize, now_ms: i64) -> Vec<SearchResult> {
        if terms.is_empty() {
            return Vec::new();
        }
        let scored = match self.backend.search_anchor(terms, 200).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "anchor phase failed, returning empty set");
                return Vec::new();
            }
        };

        let mut scored: Vec<(MoleculeRecord, f64)> = scored
            .into_iter()
            .map(|(record, score)| {
                let decayed = apply_time_ladder(score, &record, now_ms);
                (record, decayed)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        take_within_budget(scored, budget_bytes)
    }

    async fn neighbor_phase(
        &self,
        tags: &[String],
        query_terms: &[String],
        exclude_ids: &[String],
        budget_bytes: usize,
        now_ms: i64,
    ) -> Vec<SearchResult> {
        if tags.is_empty() || budget_bytes == 0 {
            return Vec::new();
        }
        let candidates = match self.backend.search_by_tags(tags, exclude_ids, 200).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "neighbor-walk phase failed, returning empty set");
                return Vec::new();
            }
        };

        // Anchor/Neighbor disjointness: exclude anything containing a
        // query term the Anchor phase would have matched (invariant 7).
        let filtered: Vec<MoleculeRecord> = candidates
            .into_iter()
            .filter(|r| !query_terms.iter().any(|t| r.content.to_ascii_lowercase().contains(&t.to_ascii_lowercase())))
            .collect();

        let mut scored: Vec<(MoleculeRecord, f64)> = filtered
            .into_iter()
            .map(|record| {
                let overlap = tags.iter().filter(|t| record.tags.iter().any(|rt| rt.eq_ignore_ascii_case(t))).count() as f64;
                let score = apply_time_ladder(overlap, &record, now_ms);
                (record, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(b.0.timestamp_ms.cmp(&a.0.timestamp_ms)));

        take_within_budget(scored, budget_bytes)
    }
}

fn apply_time_ladder(score: f64, record: &MoleculeRecord, now_ms: i64) -> f64 {
    let mut scored = score;
    if record.tags.iter().any(|t| t.eq_ignore_ascii_case("#Archive")) {
        scored *= ARCHIVE_DECAY;
    }
    if now_ms.saturating_sub(record.timestamp_ms) <= RECENT_WINDOW_MS {
        scored *= RECENT_BOOST;
    }
    scored
}

fn harvest_tags(anchor: &[SearchResult], k: usize) -> Vec<String> {
    let mut tags: Vec<String> = anchor.iter().take(k).flat_map(|r| r.tags.clone()).collect();
    tags.sort();
    tags.dedup();
    tags
}

fn take_within_budget(scored: Vec<(MoleculeRecord, f64)>, budget_bytes: usize) -> Vec<SearchResult> {
    let mut out = Vec::new();
    let mut used = 0usize;
    for (record, score) in scored {
        if used >= budget_bytes && !out.is_empty() {
            break;
        }
        used += record.content.len();
        out.push(SearchResult {
            id: record.id,
            content: record.content,
            source_path: record.source_path,
            compound_id: record.compound_id,
            start_byte: record.start_byte,
            end_byte: record.end_byte,
            tags: record.tags,
            timestamp_ms: record.timestamp_ms,
            score,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_query_strips_operators() {
        let terms = sanitize_query("rust AND \"compiler\" OR (panic!)");
        assert_eq!(terms, vec!["rust", "AND", "compiler", "OR", "panic"]);
    }

    #[test]
    fn sanitize_query_keeps_hashtags() {
        let terms = sanitize_query("#rust tooling");
        assert_eq!(terms, vec!["#rust", "tooling"]);
    }

    fn record(id: &str, content: &str, tags: &[&str], timestamp_ms: i64) -> MoleculeRecord {
        MoleculeRecord {
            id: id.to_string(),
            content: content.to_string(),
            source_path: "inbox/x.md".to_string(),
            timestamp_ms,
            signature: 0,
            provenance: "internal".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            compound_id: "mem_x".to_string(),
            start_byte: 0,
            end_byte: content.len(),
        }
    }

    #[test]
    fn archive_tag_decays_score() {
        let archived = record("a", "old stuff", &["#Archive"], 0);
        let fresh = record("b", "new stuff", &[], 0);
        let archived_score = apply_time_ladder(1.0, &archived, 0);
        let fresh_score = apply_time_ladder(1.0, &fresh, 0);
        assert!(archived_score < fresh_score);
    }

    #[test]
    fn recent_timestamp_gets_boosted() {
        let now = 10_000_000_000;
        let recent = record("a", "x", &[], now - 1000);
        let old = record("b", "x", &[], 0);
        assert!(apply_time_ladder(1.0, &recent, now) > apply_time_ladder(1.0, &old, now));
    }

    #[test]
    fn take_within_budget_stops_after_exceeding() {
        let scored = vec![
            (record("a", &"x".repeat(100), &[], 0), 3.0),
            (record("b", &"y".repeat(100), &[], 0), 2.0),
            (record("c", &"z".repeat(100), &[], 0), 1.0),
        ];
        let out = take_within_budget(scored, 150);
        assert_eq!(out.len(), 2);
    }
}
