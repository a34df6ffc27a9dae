//! Execution backends behind the [`crate::SearchApi`] facade.
//!
//! Both backends do their submission work when a method is called, not when the
//! returned future is first polled, so call order is submission order.

pub mod delegated;
pub mod inline;

pub use delegated::DelegatedBackend;
pub use inline::InlineBackend;

use crate::error::Result;
use crate::types::{IndexResource, Record, RecordId};
use futures::future::BoxFuture;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The asynchronous indexing and search contract shared by all backends.
pub trait SearchBackend: Send + Sync + Debug {
    /// Register a collection on first use and index a batch of its records.
    fn index_resource(&self, request: IndexResource) -> BoxFuture<'_, Result<()>>;

    /// Index one record of a registered collection.
    fn index_record(&self, collection: &str, record: Record) -> BoxFuture<'_, Result<()>>;

    /// Ids of the records matching a query, in registration order.
    fn perform_search(
        &self,
        collection: &str,
        query: &str,
    ) -> BoxFuture<'_, Result<Vec<RecordId>>>;

    /// Remove one record; absent ids are a no-op.
    fn remove_resource(&self, collection: &str, id: RecordId) -> BoxFuture<'_, Result<()>>;

    /// Drop a collection and its index.
    fn remove_collection(&self, collection: &str) -> BoxFuture<'_, Result<()>>;

    /// Release every collection and stop any background work.
    fn terminate(&self) -> BoxFuture<'_, ()>;
}

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
