//! Indexing and query-matching engine.
//!
//! This module provides tokenization, field extraction, the per-collection
//! inverted index, query evaluation, and the registry that groups collections
//! for one execution context.

// Module declarations
pub mod extract;
pub mod index;
pub mod query;
pub mod registry;
pub mod tokenize;

// Public re-exports (used via lib.rs)
pub use extract::extract;
pub use index::{AddOutcome, Conflict, InvertedIndex};
pub use query::{SearchOptions, search};
pub use registry::{Collection, Registry};
pub use tokenize::{Tokenizer, tokenize};
