//! The public facade: one entry point over whichever backend is configured.

use crate::backend::{DelegatedBackend, InlineBackend, SearchBackend};
use crate::config::{BackendKind, SearchConfig};
use crate::error::Result;
use crate::types::{IndexResource, Record, RecordId};
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;

/// Indexes named collections of records and answers text queries over them.
///
/// Every method performs its submission work before returning, so a caller
/// that does not await an indexing future still sees its effects in any
/// search issued afterwards. Cloning is cheap and clones share the backend.
///
/// ```no_run
/// # async fn demo() -> resource_search::Result<()> {
/// use resource_search::{IndexResource, SearchApi};
/// use serde_json::json;
///
/// let api = SearchApi::new();
/// api.index_resource(
///     IndexResource::new("documents", vec!["name", "description"])
///         .resources(vec![json!({"id": 1, "name": "One", "description": "The first"})]),
/// )
/// .await?;
/// let ids = api.perform_search("documents", "one").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SearchApi {
    backend: Arc<dyn SearchBackend>,
    config: Arc<SearchConfig>,
}

impl SearchApi {
    /// A facade over the inline backend with default settings.
    pub fn new() -> Self {
        Self {
            backend: Arc::new(InlineBackend::default()),
            config: Arc::new(SearchConfig::default()),
        }
    }

    /// Build the backend named by `config.backend`.
    ///
    /// The delegated backend must be built inside a Tokio runtime.
    pub fn from_config(config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn SearchBackend> = match config.backend {
            BackendKind::Inline => Arc::new(InlineBackend::new(&config)?),
            BackendKind::Delegated => Arc::new(DelegatedBackend::spawn(&config)?),
        };
        tracing::debug!("SearchApi created with {:?} backend", config.backend);
        Ok(Self {
            backend,
            config: Arc::new(config),
        })
    }

    /// Load a TOML configuration file and build from it.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Self::from_config(SearchConfig::from_file(path)?)
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            config: Arc::new(SearchConfig::default()),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Register `request.resource_name` on first use and index its records.
    ///
    /// Records that fail are reported together in one `SearchError::Index`;
    /// the others stay indexed.
    pub fn index_resource(&self, request: IndexResource) -> BoxFuture<'_, Result<()>> {
        tracing::trace!(
            "index_resource '{}' ({} records)",
            request.resource_name,
            request.resources.len()
        );
        self.backend.index_resource(request)
    }

    /// Index a single record into an already registered collection.
    pub fn index_record(&self, collection: &str, record: Record) -> BoxFuture<'_, Result<()>> {
        self.backend.index_record(collection, record)
    }

    /// Ids of the records in `collection` matching `query`, in the order they
    /// were first indexed. A query without tokens matches nothing.
    pub fn perform_search(
        &self,
        collection: &str,
        query: &str,
    ) -> BoxFuture<'_, Result<Vec<RecordId>>> {
        tracing::trace!("perform_search '{}' query={:?}", collection, query);
        self.backend.perform_search(collection, query)
    }

    pub fn remove_resource(
        &self,
        collection: &str,
        id: impl Into<RecordId>,
    ) -> BoxFuture<'_, Result<()>> {
        self.backend.remove_resource(collection, id.into())
    }

    pub fn remove_collection(&self, collection: &str) -> BoxFuture<'_, Result<()>> {
        self.backend.remove_collection(collection)
    }

    /// Drop every collection and stop background workers.
    pub fn terminate(&self) -> BoxFuture<'_, ()> {
        self.backend.terminate()
    }
}

impl Default for SearchApi {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use assert2::{check, let_assert};
    use serde_json::json;

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = SearchConfig {
            id_field: String::new(),
            ..SearchConfig::default()
        };
        let_assert!(Err(SearchError::Config(_)) = SearchApi::from_config(config));
    }

    #[tokio::test]
    async fn test_clones_share_backend() {
        let api = SearchApi::new();
        let clone = api.clone();
        api.index_resource(
            IndexResource::new("letters", vec!["name"])
                .resources(vec![json!({"id": "a", "name": "Alpha"})]),
        )
        .await
        .unwrap();

        let ids = clone.perform_search("letters", "al").await.unwrap();
        check!(ids == vec![RecordId::from("a")]);
    }

    #[tokio::test]
    async fn test_from_config_delegated() {
        let api = SearchApi::from_config(SearchConfig::delegated(1)).unwrap();
        check!(api.config().backend == BackendKind::Delegated);
        api.terminate().await;
    }
}
