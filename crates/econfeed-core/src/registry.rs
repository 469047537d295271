//! Routes canonical requests to the client registered for their source.

use std::collections::HashMap;
use std::sync::Arc;

use time::Date;

use crate::cache::{CacheError, CacheStats, CacheStore};
use crate::data_source::{
    SearchRequest, SeriesFetch, SeriesRequest, SourceClient, SourceError, SourceInfo,
};
use crate::http_client::HttpClient;
use crate::sources::client_for;
use crate::{CoreError, IngestConfig, SeriesMetadata, SourceId};

/// Client registry and dispatcher.
///
/// Routing is a pure lookup by [`SourceId`]; there is no fallback between
/// sources because each publishes different series.
pub struct SeriesRegistry {
    clients: HashMap<SourceId, Arc<dyn SourceClient>>,
    cache: CacheStore,
}

impl SeriesRegistry {
    pub fn new(clients: Vec<Arc<dyn SourceClient>>, cache: CacheStore) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.id(), client))
            .collect();
        Self { clients, cache }
    }

    /// Build every enabled source from `config`, sharing one cache and transport.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the config is invalid or the cache database
    /// cannot be opened.
    pub fn from_config(
        config: &IngestConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let cache = if config.cache.enabled {
            CacheStore::open(
                config.cache.resolved_location(),
                config.cache.ttl(),
                config.cache.max_size_bytes(),
            )?
        } else {
            CacheStore::disabled()
        };

        let clients = SourceId::ALL
            .into_iter()
            .filter(|source| config.source_enabled(*source))
            .map(|source| client_for(source, Arc::clone(&http_client), cache.clone(), config))
            .collect();

        let registry = Self::new(clients, cache);
        tracing::debug!(
            sources = registry.clients.len(),
            cache_enabled = registry.cache.is_enabled(),
            "series registry ready"
        );
        Ok(registry)
    }

    /// Register `client`, replacing any client already registered for its source.
    pub fn register(&mut self, client: Arc<dyn SourceClient>) -> Option<Arc<dyn SourceClient>> {
        self.clients.insert(client.id(), client)
    }

    pub fn client(&self, source: SourceId) -> Result<&Arc<dyn SourceClient>, SourceError> {
        self.clients
            .get(&source)
            .ok_or_else(|| SourceError::unknown_source(source))
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Fetch `series_id` from `source` over the inclusive range `start..=end`.
    pub async fn fetch(
        &self,
        source: SourceId,
        series_id: &str,
        start: Date,
        end: Date,
    ) -> Result<SeriesFetch, SourceError> {
        let client = self.client(source)?;
        let request = SeriesRequest::new(source, series_id, start, end)?;
        client.fetch_series(request).await
    }

    pub async fn fetch_request(&self, request: SeriesRequest) -> Result<SeriesFetch, SourceError> {
        self.client(request.source)?.fetch_series(request).await
    }

    pub async fn search(
        &self,
        source: SourceId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SeriesMetadata>, SourceError> {
        let client = self.client(source)?;
        let request = SearchRequest::new(query, limit).map_err(|error| error.with_source(source))?;
        client.search_series(request).await
    }

    pub async fn list_datasets(&self, source: SourceId) -> Result<Vec<String>, SourceError> {
        self.client(source)?.list_datasets().await
    }

    /// Registered sources in canonical order.
    pub fn sources(&self) -> Vec<SourceInfo> {
        let mut sources: Vec<SourceInfo> =
            self.clients.values().map(|client| client.info()).collect();
        sources.sort_by_key(|info| info.id);
        sources
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, CacheError> {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) -> Result<u64, CacheError> {
        let removed = self.cache.clear().await?;
        tracing::info!(removed, "cleared response cache");
        Ok(removed)
    }

    pub async fn clear_expired(&self) -> Result<u64, CacheError> {
        let removed = self.cache.clear_expired().await?;
        tracing::info!(removed, "removed expired cache entries");
        Ok(removed)
    }
}
