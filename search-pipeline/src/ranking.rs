use std::{cmp::Ordering, collections::HashSet};

use common::storage::types::item::Item;

/// A row returned by either candidate path, carrying the item plus its
/// cosine similarity against the query embedding.
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    pub item: Item,
    pub similarity: f32,
}

/// Final ranked entry with the blended score in [0,1].
#[derive(Debug, Clone)]
pub struct RankedItem {
    pub item: Item,
    pub score: f32,
}

/// Weights used to blend semantic and keyword signals.
///
/// The defaults are empirically chosen; any configuration must keep the
/// precedence exact/substring match > all-tokens match > partial match >
/// pure semantic.
#[derive(Debug, Clone, Copy)]
pub struct RankingWeights {
    pub semantic: f32,
    pub keyword: f32,
    /// Keyword score when the query is a substring of the name (or vice versa).
    pub substring_score: f32,
    /// Scale applied to the fraction of query tokens found in the name.
    pub overlap_scale: f32,
    /// Additive boost when the full query appears inside the name.
    pub substring_boost: f32,
    /// Additive boost when every query token matched the name.
    pub full_match_boost: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        // Pure vector similarity under-ranks exact name matches for short
        // queries; the keyword term and boosts correct for that without
        // discarding semantic ranking for longer queries.
        Self {
            semantic: 0.7,
            keyword: 0.3,
            substring_score: 0.5,
            overlap_scale: 0.2,
            substring_boost: 0.15,
            full_match_boost: 0.10,
        }
    }
}

pub fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Lowercase query tokens, dropping single-character noise. Length is
/// counted in characters, not bytes, so multi-byte single characters are
/// dropped too.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(ToOwned::to_owned)
        .collect()
}

/// Cosine similarity clamped to [0,1]; zero for mismatched or empty vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }

    clamp_unit(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Merges both candidate lists into one, deduplicated by item identity.
///
/// Vector candidates are merged first, then keyword candidates not already
/// present are appended, so a duplicate keeps its vector-list fields and its
/// merge position.
pub fn merge_candidates(
    vector_candidates: Vec<SearchCandidate>,
    keyword_candidates: Vec<SearchCandidate>,
) -> Vec<SearchCandidate> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut merged = Vec::with_capacity(vector_candidates.len() + keyword_candidates.len());

    for candidate in vector_candidates.into_iter().chain(keyword_candidates) {
        if seen.insert(candidate.item.item_id) {
            merged.push(candidate);
        }
    }

    merged
}

/// Blends semantic and keyword signals into the final ordered result set.
///
/// Ties preserve the merge order (vector-list order before keyword-list
/// order), and re-ranking an already ranked list is a fixed point.
pub fn rank_candidates(
    query: &str,
    vector_candidates: Vec<SearchCandidate>,
    keyword_candidates: Vec<SearchCandidate>,
    limit: usize,
    weights: RankingWeights,
) -> Vec<RankedItem> {
    let merged = merge_candidates(vector_candidates, keyword_candidates);
    let tokens = tokenize_query(query);
    let query_lower = query.to_lowercase();

    let mut ranked: Vec<RankedItem> = merged
        .into_iter()
        .map(|candidate| {
            let score = score_candidate(&candidate, &query_lower, &tokens, weights);
            RankedItem {
                item: candidate.item,
                score,
            }
        })
        .collect();

    // Stable sort keeps the dedup-merge order for equal scores.
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked.truncate(limit);
    ranked
}

fn score_candidate(
    candidate: &SearchCandidate,
    query_lower: &str,
    tokens: &[String],
    weights: RankingWeights,
) -> f32 {
    let semantic = clamp_unit(candidate.similarity);
    let name_lower = candidate.item.name.to_lowercase();

    let matching = tokens
        .iter()
        .filter(|token| name_lower.contains(token.as_str()))
        .count();

    let query_in_name = name_lower.contains(query_lower);
    let name_in_query = query_lower.contains(&name_lower);

    let keyword_score = if query_in_name || name_in_query {
        weights.substring_score
    } else if matching > 0 && !tokens.is_empty() {
        weights.overlap_scale * (matching as f32 / tokens.len() as f32)
    } else {
        0.0
    };

    let mut combined = semantic * weights.semantic + keyword_score * weights.keyword;

    if query_in_name {
        combined = (combined + weights.substring_boost).min(1.0);
    } else if !tokens.is_empty() && matching == tokens.len() {
        combined = (combined + weights.full_match_boost).min(1.0);
    }

    clamp_unit(combined)
}
