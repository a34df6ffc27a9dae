//! Embeddable full-text search over named collections of records.
//!
//! Records are indexed by the tokens of selected string fields (or of an
//! extraction function) and looked up with prefix-matching text queries.
//! Work runs either inline in the caller's context or on a pool of
//! background workers; both sit behind the same [`SearchApi`].

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod search;
pub mod tracing;
pub mod types;
pub mod worker;

pub use api::SearchApi;
pub use backend::{DelegatedBackend, InlineBackend, SearchBackend};
pub use config::{BackendKind, DispatchPolicy, MatchMode, SearchConfig, TokenMatch};
pub use error::{RecordFailure, Result, SearchError};
pub use types::{FieldDescriptor, IndexFn, IndexResource, Record, RecordId};
