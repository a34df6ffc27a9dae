//! Error handling types and utilities.

use crate::types::RecordId;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A specialized Result type for resource-search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors reported by indexing and search operations.
///
/// Every variant owns its data so errors can travel back from a worker thread
/// inside a response message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Search, index or removal against a collection that was never registered.
    #[error("unknown collection '{name}'")]
    UnknownCollection { name: String },

    /// One or more records of an indexing call could not be indexed.
    ///
    /// All other records of the same call were indexed.
    #[error("failed to index {} record(s) in '{collection}': {}", .failures.len(), FailureList(.failures))]
    Index {
        collection: String,
        failures: Vec<RecordFailure>,
    },

    /// A record id was re-added with different token content without being removed first.
    #[error("record {id} is already indexed in '{collection}' with different content")]
    DuplicateIndex { collection: String, id: RecordId },

    /// The worker owning the request's collection has stopped.
    #[error("search worker {worker} is unavailable")]
    WorkerUnavailable { worker: usize },

    /// No response arrived before the configured deadline.
    #[error("request {request_id} timed out after {after:?}")]
    Timeout { request_id: u64, after: Duration },

    /// Invalid configuration or missing runtime support.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SearchError {
    pub(crate) fn unknown_collection(name: impl Into<String>) -> Self {
        Self::UnknownCollection { name: name.into() }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Ids of the records that failed, for `Index` errors.
    ///
    /// Records without a usable id are not listed here; see [`RecordFailure::position`].
    pub fn failed_ids(&self) -> Vec<&RecordId> {
        match self {
            Self::Index { failures, .. } => failures.iter().filter_map(|f| f.id.as_ref()).collect(),
            _ => Vec::new(),
        }
    }
}

/// A single record that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// The record's id, if one could be read from it.
    pub id: Option<RecordId>,
    /// Position of the record in the submitted batch.
    pub position: usize,
    /// Human-readable cause.
    pub reason: String,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "record {} ({})", id, self.reason),
            None => write!(f, "record at position {} ({})", self.position, self.reason),
        }
    }
}

struct FailureList<'a>(&'a [RecordFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}
