//! Inverted index with a live record table for one collection.

use crate::config::TokenMatch;
use crate::types::{Record, RecordId};
use ahash::{AHashMap, AHashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Result of a successful [`InvertedIndex::add_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The record was new and is now indexed.
    Added,
    /// The record was already indexed with exactly these tokens.
    Unchanged,
}

/// Re-adding a record whose token set differs from the indexed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict(pub RecordId);

#[derive(Debug, Clone)]
struct IndexedRecord {
    /// Registration sequence number, the canonical result ordering
    ordinal: u64,
    record: Record,
    tokens: BTreeSet<String>,
}

/// A searchable token index over the records of one collection.
///
/// Postings are kept in a sorted map so prefix lookups are a range scan.
/// Every id in a posting set is present in the record table; both are updated
/// together by `add_record` and `remove_record`.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    /// Map from token to the ids of records containing it
    postings: BTreeMap<String, AHashSet<RecordId>>,
    /// Live record table
    records: AHashMap<RecordId, IndexedRecord>,
    /// Ids by registration ordinal
    order: BTreeMap<u64, RecordId>,
    next_ordinal: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a record under the given tokens.
    ///
    /// Re-adding an id with the same token set is a no-op. Re-adding it with a
    /// different token set is a [`Conflict`] and leaves the index untouched; the
    /// record must be removed first.
    pub fn add_record(
        &mut self,
        id: RecordId,
        record: Record,
        tokens: BTreeSet<String>,
    ) -> Result<AddOutcome, Conflict> {
        if let Some(existing) = self.records.get(&id) {
            return if existing.tokens == tokens {
                Ok(AddOutcome::Unchanged)
            } else {
                Err(Conflict(id))
            };
        }

        for token in &tokens {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(id.clone());
        }

        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.order.insert(ordinal, id.clone());
        self.records.insert(
            id,
            IndexedRecord {
                ordinal,
                record,
                tokens,
            },
        );

        Ok(AddOutcome::Added)
    }

    /// Removes a record from the table and from every posting set.
    ///
    /// Returns `false` if the id was not indexed.
    pub fn remove_record(&mut self, id: &RecordId) -> bool {
        let Some(removed) = self.records.remove(id) else {
            return false;
        };

        for token in &removed.tokens {
            if let Some(ids) = self.postings.get_mut(token) {
                ids.remove(id);
                if ids.is_empty() {
                    self.postings.remove(token);
                }
            }
        }
        self.order.remove(&removed.ordinal);

        true
    }

    /// Ids indexed under exactly this token.
    pub fn lookup(&self, token: &str) -> AHashSet<&RecordId> {
        self.postings
            .get(token)
            .map(|ids| ids.iter().collect())
            .unwrap_or_default()
    }

    /// Ids of every index token matched by a query token.
    pub fn matching_ids(&self, query_token: &str, mode: TokenMatch) -> AHashSet<&RecordId> {
        match mode {
            TokenMatch::Exact => self.lookup(query_token),
            TokenMatch::Prefix => self
                .postings
                .range::<str, _>((Bound::Included(query_token), Bound::Unbounded))
                .take_while(|(token, _)| token.starts_with(query_token))
                .flat_map(|(_, ids)| ids.iter())
                .collect(),
            TokenMatch::Substring => self
                .postings
                .iter()
                .filter(|(token, _)| token.contains(query_token))
                .flat_map(|(_, ids)| ids.iter())
                .collect(),
        }
    }

    /// All ids in registration order.
    pub fn all_ids(&self) -> Vec<RecordId> {
        self.order.values().cloned().collect()
    }

    /// Registration ordinal of an indexed record.
    pub fn ordinal(&self, id: &RecordId) -> Option<u64> {
        self.records.get(id).map(|r| r.ordinal)
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id).map(|r| &r.record)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct tokens.
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }
}
