//! Generic source client.
//!
//! [`ProviderClient`] owns the fetch pipeline shared by every agency: cache
//! lookup, request building, admission, retried transport, parsing, cache
//! write and stale fallback. A [`SeriesProvider`] plugs in the parts that
//! differ between agencies.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::{CacheRead, CacheStore};
use crate::data_source::{
    Freshness, SearchRequest, SeriesFetch, SeriesRequest, SourceClient, SourceError,
    SourceFuture, SourceInfo,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::policy::SourcePolicy;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::{IngestConfig, Observation, SeriesMetadata, SourceId};

/// Agency-specific request building and response parsing.
pub trait SeriesProvider: Send + Sync + 'static {
    fn id(&self) -> SourceId;

    /// Shape of a valid series id, quoted in format errors.
    fn series_id_format(&self) -> &'static str;

    /// Build the HTTP request for `req`.
    ///
    /// # Errors
    ///
    /// Returns a format error for a malformed series id or a missing required
    /// API key. No network call is made in that case.
    fn build_request(
        &self,
        req: &SeriesRequest,
        api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError>;

    /// Error message carried inside a success response, if any.
    fn detect_error(&self, body: &str) -> Option<String>;

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError>;

    /// Static catalog of well-known series.
    fn catalog(&self) -> Vec<SeriesMetadata>;
}

/// Cached, rate-limited, retried client for one agency.
pub struct ProviderClient<P> {
    provider: P,
    http_client: Arc<dyn HttpClient>,
    cache: CacheStore,
    limiter: RateLimiter,
    retry: RetryPolicy,
    policy: SourcePolicy,
    api_key: Option<String>,
    request_timeout_ms: u64,
    deadline: Option<Duration>,
}

impl<P: SeriesProvider> ProviderClient<P> {
    /// Client with the provider's anonymous quota and the default retry policy.
    pub fn new(provider: P, http_client: Arc<dyn HttpClient>, cache: CacheStore) -> Self {
        let policy = SourcePolicy::default_for(provider.id());
        let limiter = RateLimiter::new(policy.effective_limit(false, None), policy.quota_window);
        Self {
            provider,
            http_client,
            cache,
            limiter,
            retry: RetryPolicy::default(),
            policy,
            api_key: None,
            request_timeout_ms: 10_000,
            deadline: None,
        }
    }

    /// Client configured from `config`: key, quota, retry, timeouts.
    pub fn from_config(
        provider: P,
        http_client: Arc<dyn HttpClient>,
        cache: CacheStore,
        config: &IngestConfig,
    ) -> Self {
        let source = provider.id();
        let api_key = config.api_key(source);
        let policy = SourcePolicy::default_for(source);
        let limiter = if config.rate_limit.enabled {
            let limit =
                policy.effective_limit(api_key.is_some(), config.rate_limit_override(source));
            RateLimiter::new(limit, policy.quota_window)
        } else {
            RateLimiter::unlimited()
        };

        Self {
            provider,
            http_client,
            cache,
            limiter,
            retry: config.retry.policy(),
            policy,
            api_key,
            request_timeout_ms: config.request_timeout_ms,
            deadline: config.fetch_deadline(),
        }
    }

    /// Set the API key and switch to the keyed quota.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.limiter = RateLimiter::new(
            self.policy.effective_limit(true, None),
            self.policy.quota_window,
        );
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Bound admission, retries and parsing of one fetch.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn fetch(&self, req: SeriesRequest) -> Result<SeriesFetch, SourceError> {
        let source = self.provider.id();
        if req.source != source {
            return Err(SourceError::internal(format!(
                "request for '{}' sent to the {source} client",
                req.source
            ))
            .with_context(req.source, req.series_id));
        }

        let key = req.cache_key();
        if let Some(hit) = self.cache.get(&key, CacheRead::Fresh).await {
            match self.provider.parse(&req.series_id, &hit.payload) {
                Ok(observations) => {
                    tracing::debug!(
                        source = %source,
                        series_id = %req.series_id,
                        observations = observations.len(),
                        "served from cache"
                    );
                    return Ok(self.result(&req, Freshness::Cached, observations));
                }
                Err(error) => tracing::warn!(
                    source = %source,
                    series_id = %req.series_id,
                    key = %key,
                    error = %error,
                    "skipping corrupt cache entry"
                ),
            }
        }

        let live = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.fetch_live(&req, &key))
                .await
                .unwrap_or_else(|_| {
                    Err(SourceError::transport(format!(
                        "fetch did not complete within {} ms",
                        deadline.as_millis()
                    )))
                }),
            None => self.fetch_live(&req, &key).await,
        };

        match live {
            Ok(observations) => Ok(self.result(&req, Freshness::Live, observations)),
            Err(error) if error.allows_stale_fallback() => {
                self.stale_fallback(&req, &key, error).await
            }
            Err(error) => Err(error.with_context(source, req.series_id)),
        }
    }

    async fn fetch_live(
        &self,
        req: &SeriesRequest,
        key: &str,
    ) -> Result<Vec<Observation>, SourceError> {
        let source = self.provider.id();
        let request = self
            .provider
            .build_request(req, self.api_key.as_deref())?
            .with_timeout_ms(self.request_timeout_ms);

        self.limiter.admit().await;

        let started = Instant::now();
        let body = self
            .retry
            .execute_when(|| self.attempt(request.clone()), SourceError::retryable)
            .await?;
        let observations = self.provider.parse(&req.series_id, &body)?;
        self.cache.set(key, source, &body).await;

        tracing::info!(
            source = %source,
            series_id = %req.series_id,
            observations = observations.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "fetched series"
        );
        Ok(observations)
    }

    /// One transport attempt. Non-success statuses and error envelopes are failures.
    async fn attempt(&self, request: HttpRequest) -> Result<String, SourceError> {
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| SourceError::transport(format!("request failed: {error}")))?;

        if !response.is_success() {
            return Err(SourceError::transport(format!(
                "provider returned HTTP status {}",
                response.status
            )));
        }
        if let Some(message) = self.provider.detect_error(&response.body) {
            return Err(SourceError::provider(message));
        }
        Ok(response.body)
    }

    async fn stale_fallback(
        &self,
        req: &SeriesRequest,
        key: &str,
        error: SourceError,
    ) -> Result<SeriesFetch, SourceError> {
        let source = self.provider.id();
        let Some(entry) = self.cache.get(key, CacheRead::AllowStale).await else {
            return Err(error.with_context(source, req.series_id.clone()));
        };

        match self.provider.parse(&req.series_id, &entry.payload) {
            Ok(observations) => {
                tracing::warn!(
                    source = %source,
                    series_id = %req.series_id,
                    stored_at_ms = entry.stored_at_ms,
                    error = %error,
                    "live fetch failed; serving stale cached data"
                );
                Ok(self.result(req, Freshness::Stale, observations))
            }
            Err(parse_error) => {
                tracing::warn!(
                    source = %source,
                    series_id = %req.series_id,
                    error = %parse_error,
                    "stale cache entry is unreadable"
                );
                Err(error.with_context(source, req.series_id.clone()))
            }
        }
    }

    fn result(
        &self,
        req: &SeriesRequest,
        freshness: Freshness,
        observations: Vec<Observation>,
    ) -> SeriesFetch {
        SeriesFetch {
            source: self.provider.id(),
            series_id: req.series_id.clone(),
            freshness,
            observations,
        }
    }
}

impl<P: SeriesProvider> SourceClient for ProviderClient<P> {
    fn id(&self) -> SourceId {
        self.provider.id()
    }

    fn fetch_series<'a>(&'a self, req: SeriesRequest) -> SourceFuture<'a, SeriesFetch> {
        Box::pin(async move { self.fetch(req).await })
    }

    fn search_series<'a>(&'a self, req: SearchRequest) -> SourceFuture<'a, Vec<SeriesMetadata>> {
        Box::pin(async move {
            Ok(self
                .provider
                .catalog()
                .into_iter()
                .filter(|entry| entry.matches(&req.query))
                .take(req.limit)
                .collect())
        })
    }

    fn list_datasets<'a>(&'a self) -> SourceFuture<'a, Vec<String>> {
        Box::pin(async move {
            let datasets: BTreeSet<String> = self
                .provider
                .catalog()
                .into_iter()
                .map(|entry| entry.dataset)
                .collect();
            Ok(datasets.into_iter().collect())
        })
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            id: self.provider.id(),
            has_api_key: self.api_key.is_some(),
            key_required: self.policy.key_required,
            limit_per_window: self.limiter.limit(),
            window_seconds: self.limiter.window().as_secs(),
            series_id_format: self.provider.series_id_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::parse::{parse_json, split_series_id};
    use crate::retry::Backoff;
    use crate::testing::RecordingHttpClient;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::tempdir;

    /// Minimal provider: `{"rows": [["2020-01", "1.5"], ...]}`, errors under `"fault"`.
    struct Toy;

    impl SeriesProvider for Toy {
        fn id(&self) -> SourceId {
            SourceId::Fred
        }

        fn series_id_format(&self) -> &'static str {
            "name"
        }

        fn build_request(
            &self,
            req: &SeriesRequest,
            _api_key: Option<&str>,
        ) -> Result<HttpRequest, SourceError> {
            let parts = split_series_id(&req.series_id, 1, 1, "name")?;
            Ok(HttpRequest::get(format!("https://toy.test/{}", parts[0])))
        }

        fn detect_error(&self, body: &str) -> Option<String> {
            let root: serde_json::Value = serde_json::from_str(body).ok()?;
            root.get("fault").and_then(|fault| fault.as_str()).map(str::to_owned)
        }

        fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
            let root = parse_json(body)?;
            let rows = root
                .get("rows")
                .and_then(|rows| rows.as_array())
                .ok_or_else(|| SourceError::parse("missing rows"))?;
            Ok(rows
                .iter()
                .filter_map(|row| {
                    let period = row.get(0)?.as_str()?;
                    let value = row.get(1).map_or(f64::NAN, crate::parse::parse_value);
                    crate::parse::observation(series_id, period, value)
                })
                .collect())
        }

        fn catalog(&self) -> Vec<SeriesMetadata> {
            vec![
                SeriesMetadata::new("GDP", "Gross Domestic Product", "nipa", "Quarterly", "USD"),
                SeriesMetadata::new("UNRATE", "Unemployment Rate", "labor", "Monthly", "%"),
                SeriesMetadata::new("PAYEMS", "All Employees", "labor", "Monthly", "Thousands"),
            ]
        }
    }

    const GOOD: &str = r#"{"rows": [["2020-01", "1.5"], ["2020-02", "."]]}"#;

    fn request(series_id: &str) -> SeriesRequest {
        SeriesRequest::parse(SourceId::Fred, series_id, "2020-01-01", "2020-12-31")
            .expect("valid request")
    }

    fn cache(temp: &tempfile::TempDir) -> (CacheStore, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(1_700_000_000_000));
        let clock = Arc::clone(&now);
        let cache = CacheStore::open(
            temp.path().join("cache.duckdb"),
            Duration::from_secs(3_600),
            0,
        )
        .expect("cache open")
        .with_clock(move || clock.load(Ordering::SeqCst));
        (cache, now)
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            enabled: true,
            max_retries,
            backoff: Backoff::Fixed {
                delay: Duration::from_millis(10),
            },
        }
    }

    fn client(http: Arc<RecordingHttpClient>, cache: CacheStore) -> ProviderClient<Toy> {
        ProviderClient::new(Toy, http, cache)
            .with_rate_limiter(RateLimiter::unlimited())
            .with_retry(fast_retry(2))
    }

    #[tokio::test(start_paused = true)]
    async fn second_fetch_within_ttl_is_served_from_cache() {
        let temp = tempdir().expect("tempdir");
        let (cache, _) = cache(&temp);
        let http = Arc::new(RecordingHttpClient::replying(GOOD));
        let client = client(Arc::clone(&http), cache);

        let first = client.fetch_series(request("GDP")).await.expect("live");
        let second = client.fetch_series(request("GDP")).await.expect("cached");

        assert_eq!(first.freshness, Freshness::Live);
        assert_eq!(second.freshness, Freshness::Cached);
        assert_eq!(second.observations.len(), 2);
        assert_eq!(first.observations[0], second.observations[0]);
        assert!(second.observations[1].is_missing());
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_series_id_fails_without_network_or_admission() {
        let temp = tempdir().expect("tempdir");
        let (cache, _) = cache(&temp);
        let http = Arc::new(RecordingHttpClient::replying(GOOD));
        let client = ProviderClient::new(Toy, http.clone(), cache)
            .with_rate_limiter(RateLimiter::new(1, Duration::from_secs(60)));

        let error = client
            .fetch_series(request("a:b"))
            .await
            .expect_err("format error");

        assert_eq!(error.kind(), SourceErrorKind::Format);
        assert_eq!(error.source_id(), Some(SourceId::Fred));
        assert_eq!(http.calls(), 0);
        assert_eq!(client.rate_limiter().snapshot().count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_falls_back_to_stale_entry() {
        let temp = tempdir().expect("tempdir");
        let (cache, now) = cache(&temp);
        let http = Arc::new(RecordingHttpClient::scripted(vec![
            Ok(HttpResponse::ok_json(GOOD)),
            Err(HttpError::new("connection reset")),
        ]));
        let client = client(Arc::clone(&http), cache);

        client.fetch_series(request("GDP")).await.expect("live");
        now.fetch_add(7_200_000, Ordering::SeqCst);
        let stale = client.fetch_series(request("GDP")).await.expect("stale");

        assert_eq!(stale.freshness, Freshness::Stale);
        assert_eq!(stale.observations.len(), 2);
        assert_eq!(http.calls(), 1 + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_envelope_is_retried_and_reported_with_context() {
        let temp = tempdir().expect("tempdir");
        let (cache, _) = cache(&temp);
        let http = Arc::new(RecordingHttpClient::replying(r#"{"fault": "quota exceeded"}"#));
        let client = client(Arc::clone(&http), cache);

        let error = client
            .fetch_series(request("GDP"))
            .await
            .expect_err("no cache to fall back on");

        assert_eq!(error.kind(), SourceErrorKind::Provider);
        assert_eq!(error.series_id(), Some("GDP"));
        assert!(error.message().contains("quota exceeded"));
        assert_eq!(http.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn parse_error_is_not_retried_and_does_not_overwrite_cache() {
        let temp = tempdir().expect("tempdir");
        let (cache, now) = cache(&temp);
        let http = Arc::new(RecordingHttpClient::scripted(vec![
            Ok(HttpResponse::ok_json(GOOD)),
            Ok(HttpResponse::ok_json("<html>maintenance</html>")),
        ]));
        let client = client(Arc::clone(&http), cache.clone());

        client.fetch_series(request("GDP")).await.expect("live");
        now.fetch_add(7_200_000, Ordering::SeqCst);
        let stale = client.fetch_series(request("GDP")).await.expect("stale");

        assert_eq!(stale.freshness, Freshness::Stale);
        assert_eq!(http.calls(), 2);
        let entry = cache
            .get(&request("GDP").cache_key(), CacheRead::AllowStale)
            .await
            .expect("entry kept");
        assert_eq!(entry.payload, GOOD);
    }

    #[tokio::test(start_paused = true)]
    async fn non_success_status_without_cache_is_a_transport_error() {
        let http = Arc::new(RecordingHttpClient::scripted(vec![Ok(
            HttpResponse::with_status(503, "busy"),
        )]));
        let client = client(Arc::clone(&http), CacheStore::disabled());

        let error = client
            .fetch_series(request("GDP"))
            .await
            .expect_err("transport error");

        assert_eq!(error.kind(), SourceErrorKind::Transport);
        assert!(error.message().contains("503"));
        assert_eq!(http.calls(), 3);
    }

    struct StalledHttpClient;

    impl HttpClient for StalledHttpClient {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(HttpResponse::ok_json(GOOD))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_bounds_a_stalled_fetch() {
        let client = ProviderClient::new(Toy, Arc::new(StalledHttpClient), CacheStore::disabled())
            .with_deadline(Duration::from_secs(5));
        let started = Instant::now();

        let error = client
            .fetch_series(request("GDP"))
            .await
            .expect_err("deadline exceeded");

        assert_eq!(error.kind(), SourceErrorKind::Transport);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn search_and_datasets_use_the_local_catalog() {
        let http = Arc::new(RecordingHttpClient::replying(GOOD));
        let client = client(Arc::clone(&http), CacheStore::disabled());

        let hits = client
            .search_series(SearchRequest::new("LABOR", 1).expect("valid search"))
            .await
            .expect("search");
        let datasets = client.list_datasets().await.expect("datasets");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "UNRATE");
        assert_eq!(datasets, vec!["labor", "nipa"]);
        assert_eq!(http.calls(), 0);
    }

    #[test]
    fn api_key_switches_to_keyed_quota() {
        let http = Arc::new(RecordingHttpClient::replying(GOOD));
        let client = ProviderClient::new(Toy, http, CacheStore::disabled()).with_api_key("k");

        let info = client.info();
        assert!(info.has_api_key);
        assert!(info.key_required);
        assert_eq!(info.limit_per_window, Some(120));
        assert_eq!(info.window_seconds, 60);
    }
}
