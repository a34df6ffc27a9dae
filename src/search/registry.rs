//! The collections owned by one execution context.
//!
//! A `Registry` is the unit both backends wrap: the inline backend keeps one
//! behind a mutex, and every delegated worker owns one outright.

use super::extract::extract;
use super::index::{AddOutcome, Conflict, InvertedIndex};
use super::query::{SearchOptions, search};
use super::tokenize::Tokenizer;
use crate::config::SearchConfig;
use crate::error::{RecordFailure, Result, SearchError};
use crate::types::{FieldDescriptor, IndexResource, Record, RecordId};
use ahash::AHashMap;
use serde_json::Value;
use std::collections::BTreeSet;
use std::collections::hash_map::Entry;

/// Why a single record could not be indexed.
#[derive(Debug)]
enum RecordError {
    MissingId,
    Extraction(anyhow::Error),
    Conflict(RecordId),
}

/// A named collection: its bound descriptor, shared state and index.
#[derive(Debug)]
pub struct Collection {
    descriptor: FieldDescriptor,
    state: Value,
    index: InvertedIndex,
}

impl Collection {
    fn new(descriptor: FieldDescriptor, state: Value) -> Self {
        Self {
            descriptor,
            state,
            index: InvertedIndex::new(),
        }
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Extracts, tokenizes and indexes one record.
    ///
    /// The id is read before extraction so a failure can always name the
    /// record when it has one.
    fn add(
        &mut self,
        tokenizer: &Tokenizer,
        id_field: &str,
        record: Record,
    ) -> std::result::Result<AddOutcome, (Option<RecordId>, RecordError)> {
        let Some(id) = RecordId::from_record(&record, id_field) else {
            return Err((None, RecordError::MissingId));
        };

        let values = match extract(&record, &self.descriptor, &self.state) {
            Ok(values) => values,
            Err(e) => return Err((Some(id), RecordError::Extraction(e))),
        };

        let tokens: BTreeSet<String> = values
            .iter()
            .flat_map(|value| tokenizer.tokenize(value))
            .collect();

        self.index
            .add_record(id, record, tokens)
            .map_err(|Conflict(id)| (Some(id.clone()), RecordError::Conflict(id)))
    }
}

/// Named collections plus the tokenizer and matching rules they share.
#[derive(Debug)]
pub struct Registry {
    collections: AHashMap<String, Collection>,
    tokenizer: Tokenizer,
    options: SearchOptions,
    id_field: String,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            collections: AHashMap::new(),
            tokenizer: Tokenizer::default(),
            options: SearchOptions::default(),
            id_field: SearchConfig::default().id_field,
        }
    }
}

impl Registry {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            collections: AHashMap::new(),
            tokenizer: Tokenizer::from_config(config)?,
            options: SearchOptions::from_config(config),
            id_field: config.id_field.clone(),
        })
    }

    /// Registers the collection if needed, then indexes every record independently.
    ///
    /// Records that fail do not stop the others; all failures are reported
    /// together as one `SearchError::Index` after the batch has been applied.
    pub fn index_resource(&mut self, request: IndexResource) -> Result<()> {
        let IndexResource {
            resource_name,
            resources,
            field_names_or_index_function,
            state,
        } = request;

        let collection = match self.collections.entry(resource_name.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(
                    "Collection '{}' already registered, keeping its bound descriptor",
                    resource_name
                );
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                tracing::info!(
                    "Registering collection '{}' ({:?})",
                    resource_name,
                    field_names_or_index_function
                );
                entry.insert(Collection::new(field_names_or_index_function, state))
            }
        };

        let total = resources.len();
        let mut added = 0usize;
        let mut failures = Vec::new();

        for (position, record) in resources.into_iter().enumerate() {
            match collection.add(&self.tokenizer, &self.id_field, record) {
                Ok(AddOutcome::Added) => added += 1,
                Ok(AddOutcome::Unchanged) => {}
                Err((id, error)) => {
                    let failure = RecordFailure {
                        id,
                        position,
                        reason: describe(&self.id_field, &error),
                    };
                    tracing::warn!("Failed to index {} in '{}'", failure, resource_name);
                    failures.push(failure);
                }
            }
        }

        tracing::debug!(
            "Indexed '{}': {} submitted, {} added, {} failed, {} records total",
            resource_name,
            total,
            added,
            failures.len(),
            collection.index.len()
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SearchError::Index {
                collection: resource_name,
                failures,
            })
        }
    }

    /// Adds one record to a registered collection using its bound descriptor.
    pub fn index_record(&mut self, name: &str, record: Record) -> Result<()> {
        let collection = self
            .collections
            .get_mut(name)
            .ok_or_else(|| SearchError::unknown_collection(name))?;

        match collection.add(&self.tokenizer, &self.id_field, record) {
            Ok(_) => Ok(()),
            Err((_, RecordError::Conflict(id))) => Err(SearchError::DuplicateIndex {
                collection: name.to_string(),
                id,
            }),
            Err((id, error)) => Err(SearchError::Index {
                collection: name.to_string(),
                failures: vec![RecordFailure {
                    id,
                    position: 0,
                    reason: describe(&self.id_field, &error),
                }],
            }),
        }
    }

    /// Evaluates a query against one collection.
    pub fn search(&self, name: &str, query: &str) -> Result<Vec<RecordId>> {
        let collection = self
            .collections
            .get(name)
            .ok_or_else(|| SearchError::unknown_collection(name))?;

        Ok(search(&collection.index, &self.tokenizer, query, self.options))
    }

    /// Removes one record. Returns whether it was present.
    pub fn remove_record(&mut self, name: &str, id: &RecordId) -> Result<bool> {
        let collection = self
            .collections
            .get_mut(name)
            .ok_or_else(|| SearchError::unknown_collection(name))?;

        let removed = collection.index.remove_record(id);
        tracing::debug!("Remove {} from '{}': present={}", id, name, removed);
        Ok(removed)
    }

    /// Drops a collection and its index.
    pub fn remove_collection(&mut self, name: &str) -> Result<()> {
        self.collections
            .remove(name)
            .map(|collection| {
                tracing::info!(
                    "Removed collection '{}' ({} records)",
                    name,
                    collection.index.len()
                );
            })
            .ok_or_else(|| SearchError::unknown_collection(name))
    }

    /// Drops every collection.
    pub fn clear(&mut self) {
        self.collections.clear();
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

fn describe(id_field: &str, error: &RecordError) -> String {
    match error {
        RecordError::MissingId => format!("missing or invalid id field '{}'", id_field),
        RecordError::Extraction(e) => format!("{:#}", e),
        RecordError::Conflict(_) => {
            "already indexed with different content; remove it first".to_string()
        }
    }
}
