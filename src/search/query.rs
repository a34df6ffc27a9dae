//! Query evaluation against an [`InvertedIndex`].

use super::index::InvertedIndex;
use super::tokenize::Tokenizer;
use crate::config::{MatchMode, SearchConfig, TokenMatch};
use crate::types::RecordId;
use ahash::AHashSet;

/// Matching rules applied to every query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub token_match: TokenMatch,
    pub match_mode: MatchMode,
}

impl SearchOptions {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            token_match: config.token_match,
            match_mode: config.match_mode,
        }
    }
}

/// Returns the ids of records matching a query, in registration order.
///
/// The query is tokenized exactly like indexed text. Each distinct query token
/// matches index tokens according to `options.token_match` (prefix by default),
/// and the per-token id sets are unioned (`MatchMode::Any`) or intersected
/// (`MatchMode::All`). A query without tokens matches nothing.
pub fn search(
    index: &InvertedIndex,
    tokenizer: &Tokenizer,
    query: &str,
    options: SearchOptions,
) -> Vec<RecordId> {
    let mut seen = AHashSet::new();
    let tokens: Vec<String> = tokenizer
        .tokenize(query)
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect();

    if tokens.is_empty() || index.is_empty() {
        return vec![];
    }

    let mut per_token = tokens
        .iter()
        .map(|token| index.matching_ids(token, options.token_match));

    let matched: AHashSet<&RecordId> = match options.match_mode {
        MatchMode::Any => per_token.flatten().collect(),
        MatchMode::All => {
            let first = per_token.next().unwrap_or_default();
            per_token.fold(first, |mut acc, ids| {
                acc.retain(|id| ids.contains(id));
                acc
            })
        }
    };

    // Sort by registration order for stable, deterministic results
    let mut ordered: Vec<(u64, &RecordId)> = matched
        .into_iter()
        .filter_map(|id| index.ordinal(id).map(|ordinal| (ordinal, id)))
        .collect();
    ordered.sort_unstable_by_key(|(ordinal, _)| *ordinal);

    ordered.into_iter().map(|(_, id)| id.clone()).collect()
}
