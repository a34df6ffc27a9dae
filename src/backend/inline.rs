//! Inline backend: synchronous work in the calling context, deferred completion.

use super::{SearchBackend, lock};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::search::Registry;
use crate::types::{IndexResource, Record, RecordId};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Mutex;

/// Executes every operation synchronously inside the call, then returns a
/// future that yields once before resolving.
///
/// The registry lock is only held during the synchronous part, so two calls
/// never interleave their index mutations.
#[derive(Debug)]
pub struct InlineBackend {
    registry: Mutex<Registry>,
}

impl InlineBackend {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            registry: Mutex::new(Registry::new(config)?),
        })
    }

    /// Number of registered collections.
    pub fn collection_count(&self) -> usize {
        lock(&self.registry).len()
    }
}

impl Default for InlineBackend {
    fn default() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
        }
    }
}

/// Wraps an already computed result in a completion that yields once.
fn deferred<T: Send + 'static>(result: T) -> BoxFuture<'static, T> {
    async move {
        tokio::task::yield_now().await;
        result
    }
    .boxed()
}

impl SearchBackend for InlineBackend {
    fn index_resource(&self, request: IndexResource) -> BoxFuture<'_, Result<()>> {
        deferred(lock(&self.registry).index_resource(request))
    }

    fn index_record(&self, collection: &str, record: Record) -> BoxFuture<'_, Result<()>> {
        deferred(lock(&self.registry).index_record(collection, record))
    }

    fn perform_search(
        &self,
        collection: &str,
        query: &str,
    ) -> BoxFuture<'_, Result<Vec<RecordId>>> {
        deferred(lock(&self.registry).search(collection, query))
    }

    fn remove_resource(&self, collection: &str, id: RecordId) -> BoxFuture<'_, Result<()>> {
        deferred(lock(&self.registry).remove_record(collection, &id).map(|_| ()))
    }

    fn remove_collection(&self, collection: &str) -> BoxFuture<'_, Result<()>> {
        deferred(lock(&self.registry).remove_collection(collection))
    }

    fn terminate(&self) -> BoxFuture<'_, ()> {
        let mut registry = lock(&self.registry);
        tracing::debug!("Terminating inline backend ({} collections)", registry.len());
        registry.clear();
        deferred(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use assert2::{check, let_assert};
    use serde_json::json;

    fn documents() -> IndexResource {
        IndexResource::new("documents", vec!["name"]).resources(vec![
            json!({"id": 1, "name": "One"}),
            json!({"id": 2, "name": "Two"}),
        ])
    }

    #[tokio::test]
    async fn test_work_happens_before_first_poll() {
        let backend = InlineBackend::default();

        // Not awaited: the synchronous part already ran
        let pending = backend.index_resource(documents());
        check!(backend.collection_count() == 1);
        pending.await.unwrap();

        let ids = backend.perform_search("documents", "two").await.unwrap();
        check!(ids == vec![RecordId::from(2)]);
    }

    #[tokio::test]
    async fn test_remove_and_terminate() {
        let backend = InlineBackend::default();
        backend.index_resource(documents()).await.unwrap();

        backend
            .remove_resource("documents", RecordId::from(1))
            .await
            .unwrap();
        check!(backend.perform_search("documents", "one").await.unwrap().is_empty());

        backend.terminate().await;
        check!(backend.collection_count() == 0);
        let_assert!(
            Err(SearchError::UnknownCollection { .. }) =
                backend.perform_search("documents", "two").await
        );
    }
}
