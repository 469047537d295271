//! Behavior-driven tests for the ingestion pipeline.
//!
//! These tests drive real provider clients through a scripted transport and
//! check what callers observe: network calls made, cache reuse, admission
//! waits, retry pacing and stale fallback.

use econfeed_core::domain::parse_period;
use econfeed_core::{
    Backoff, CacheRead, CacheStore, Census, Freshness, HttpClient, HttpError, HttpRequest,
    HttpResponse, ProviderClient, RateLimiter, RetryPolicy, SeriesRegistry, SeriesRequest,
    SourceClient, SourceErrorKind, SourceId, WorldBank,
};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use time::macros::date;
use tokio::time::Instant;

// =============================================================================
// Test transport
// =============================================================================

/// Replays scripted replies in order, repeating the last one, and records the
/// (paused) clock time of every call.
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    last: Result<HttpResponse, HttpError>,
    calls: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        let last = script
            .last()
            .cloned()
            .unwrap_or_else(|| Err(HttpError::new("empty script")));
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn replying(body: &str) -> Arc<Self> {
        Self::new(vec![Ok(HttpResponse::ok_json(body))])
    }

    fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(_, request)| request.url.clone())
            .collect()
    }
}

impl HttpClient for ScriptedTransport {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((Instant::now(), request));
        let reply = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| self.last.clone());
        Box::pin(async move { reply })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

const RETAIL_SERIES: &str = "timeseries/eits/retail:MRTSSM44X72USS";

const RETAIL_BODY: &str = r#"[
    ["cell_value","time","us"],
    ["520,105","2020-01","1"],
    ["518,712","2020-02","1"],
    ["483,116","2020-03","1"]
]"#;

const POPULATION_BODY: &str = r#"[{"page":1,"pages":1,"total":2},[
    {"indicator":{"id":"SP.POP.TOTL"},"date":"2021","value":7888000000},
    {"indicator":{"id":"SP.POP.TOTL"},"date":"2020","value":7820000000}
]]"#;

/// Cache in a temp dir with a hand-driven clock (unix ms).
fn cache_with_clock(dir: &TempDir) -> (CacheStore, Arc<AtomicI64>) {
    let now = Arc::new(AtomicI64::new(1_700_000_000_000));
    let clock = Arc::clone(&now);
    let cache = CacheStore::open(
        dir.path().join("responses.duckdb"),
        Duration::from_secs(24 * 3_600),
        0,
    )
    .expect("cache should open")
    .with_clock(move || clock.load(Ordering::SeqCst));
    (cache, now)
}

fn no_wait_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        enabled: true,
        max_retries,
        backoff: Backoff::Fixed {
            delay: Duration::from_millis(1),
        },
    }
}

fn retail_request() -> SeriesRequest {
    SeriesRequest::parse(SourceId::Census, RETAIL_SERIES, "2020-01-01", "2020-03-01")
        .expect("valid request")
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_a_retail_series_is_fetched_twice_the_second_read_comes_from_cache() {
    // Given: an empty cache and a Census client
    let dir = tempfile::tempdir().expect("tempdir");
    let (cache, _) = cache_with_clock(&dir);
    let transport = ScriptedTransport::replying(RETAIL_BODY);
    let client = ProviderClient::new(Census, transport.clone(), cache.clone())
        .with_rate_limiter(RateLimiter::unlimited());

    // When: the same request is made twice
    let first = client
        .fetch_series(retail_request())
        .await
        .expect("live fetch");
    let second = client
        .fetch_series(retail_request())
        .await
        .expect("cached fetch");

    // Then: one network call, three monthly observations, identical results
    assert_eq!(transport.call_count(), 1);
    assert_eq!(first.freshness, Freshness::Live);
    assert_eq!(second.freshness, Freshness::Cached);
    assert_eq!(first.observations, second.observations);

    let dates: Vec<_> = first.observations.iter().map(|obs| obs.date).collect();
    assert_eq!(
        dates,
        vec![date!(2020 - 01 - 01), date!(2020 - 02 - 01), date!(2020 - 03 - 01)]
    );
    assert_eq!(first.observations[0].value, 520_105.0);
    assert!(first.observations.iter().all(|obs| !obs.is_missing()));

    // And: the entry lives under the deterministic request key
    assert_eq!(
        retail_request().cache_key(),
        "census|timeseries/eits/retail:MRTSSM44X72USS|2020-01-01|2020-03-01"
    );
    assert!(cache
        .get(&retail_request().cache_key(), CacheRead::Fresh)
        .await
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn when_the_ttl_expires_the_next_fetch_goes_back_to_the_network() {
    // Given: a cached series
    let dir = tempfile::tempdir().expect("tempdir");
    let (cache, now) = cache_with_clock(&dir);
    let transport = ScriptedTransport::replying(RETAIL_BODY);
    let client = ProviderClient::new(Census, transport.clone(), cache)
        .with_rate_limiter(RateLimiter::unlimited());
    client.fetch_series(retail_request()).await.expect("live");

    // When: the clock moves past the 24h TTL
    now.fetch_add(25 * 3_600 * 1_000, Ordering::SeqCst);
    let refreshed = client.fetch_series(retail_request()).await.expect("live");

    // Then: the provider is asked again
    assert_eq!(refreshed.freshness, Freshness::Live);
    assert_eq!(transport.call_count(), 2);
}

// =============================================================================
// Retry pacing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_three_transport_failures_precede_success_delays_double_from_100ms() {
    // Given: retries enabled with max_retries=3, initial_delay=100ms, backoff on
    let dir = tempfile::tempdir().expect("tempdir");
    let (cache, _) = cache_with_clock(&dir);
    let transport = ScriptedTransport::new(vec![
        Err(HttpError::new("connection reset")),
        Err(HttpError::new("connection reset")),
        Err(HttpError::new("connection reset")),
        Ok(HttpResponse::ok_json(RETAIL_BODY)),
    ]);
    let client = ProviderClient::new(Census, transport.clone(), cache.clone())
        .with_rate_limiter(RateLimiter::unlimited())
        .with_retry(RetryPolicy::from_settings(
            true,
            3,
            Duration::from_millis(100),
            true,
        ));

    // When: the series is fetched
    let fetch = client
        .fetch_series(retail_request())
        .await
        .expect("fourth attempt succeeds");

    // Then: four attempts spaced 100ms, 200ms, 400ms apart
    let times = transport.call_times();
    assert_eq!(times.len(), 4);
    let gaps: Vec<Duration> = times.windows(2).map(|pair| pair[1] - pair[0]).collect();
    for (gap, expected_ms) in gaps.iter().zip([100_u64, 200, 400]) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(5),
            "expected ~{expected_ms}ms between attempts, got {gap:?}"
        );
    }

    // And: the successful result is cached
    assert_eq!(fetch.observations.len(), 3);
    assert!(cache
        .get(&retail_request().cache_key(), CacheRead::Fresh)
        .await
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn when_retries_are_disabled_a_failure_is_reported_after_one_attempt() {
    // Given: a client with retries switched off and no cache
    let transport = ScriptedTransport::new(vec![Err(HttpError::new("dns failure"))]);
    let client = ProviderClient::new(Census, transport.clone(), CacheStore::disabled())
        .with_rate_limiter(RateLimiter::unlimited())
        .with_retry(RetryPolicy::disabled());

    // When: the fetch fails
    let error = client
        .fetch_series(retail_request())
        .await
        .expect_err("transport error");

    // Then: exactly one attempt, with source and series attached
    assert_eq!(transport.call_count(), 1);
    assert_eq!(error.kind(), SourceErrorKind::Transport);
    assert_eq!(error.source_id(), Some(SourceId::Census));
    assert_eq!(error.series_id(), Some(RETAIL_SERIES));
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_a_window_is_full_the_next_fetch_waits_for_rollover_instead_of_failing() {
    // Given: a World Bank client admitting two requests per minute
    let transport = ScriptedTransport::replying(POPULATION_BODY);
    let client = ProviderClient::new(WorldBank, transport.clone(), CacheStore::disabled())
        .with_rate_limiter(RateLimiter::new(2, Duration::from_secs(60)));
    let started = Instant::now();

    // When: three distinct series are requested in the same window
    for country in ["USA", "DEU", "JPN"] {
        let request = SeriesRequest::parse(
            SourceId::WorldBank,
            format!("{country}:SP.POP.TOTL"),
            "2020-01-01",
            "2021-12-31",
        )
        .expect("valid request");
        client.fetch_series(request).await.expect("admitted");
    }

    // Then: the third call went out only after the window rolled over
    let times = transport.call_times();
    assert_eq!(times.len(), 3);
    assert!(times[1] - started < Duration::from_secs(1));
    assert!(times[2] - started >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_never_exceed_the_window_limit() {
    // Given: a shared client admitting three requests per minute
    let transport = ScriptedTransport::replying(POPULATION_BODY);
    let client = Arc::new(
        ProviderClient::new(WorldBank, transport.clone(), CacheStore::disabled())
            .with_rate_limiter(RateLimiter::new(3, Duration::from_secs(60))),
    );
    let started = Instant::now();

    // When: six callers race for admission
    let handles: Vec<_> = (0..6)
        .map(|index| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let request = SeriesRequest::parse(
                    SourceId::WorldBank,
                    format!("C{index}:SP.POP.TOTL"),
                    "2020-01-01",
                    "2021-12-31",
                )
                .expect("valid request");
                client.fetch_series(request).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.expect("task").expect("fetch");
    }

    // Then: exactly three calls in the first window, three after it
    let in_first_window = transport
        .call_times()
        .iter()
        .filter(|at| **at - started < Duration::from_secs(60))
        .count();
    assert_eq!(transport.call_count(), 6);
    assert_eq!(in_first_window, 3);
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_the_provider_is_down_the_last_cached_copy_is_returned_as_stale() {
    // Given: a series cached earlier and now expired
    let dir = tempfile::tempdir().expect("tempdir");
    let (cache, now) = cache_with_clock(&dir);
    let transport = ScriptedTransport::new(vec![
        Ok(HttpResponse::ok_json(RETAIL_BODY)),
        Ok(HttpResponse::with_status(502, "bad gateway")),
    ]);
    let client = ProviderClient::new(Census, transport.clone(), cache)
        .with_rate_limiter(RateLimiter::unlimited())
        .with_retry(no_wait_retry(3));
    let original = client.fetch_series(retail_request()).await.expect("live");
    now.fetch_add(48 * 3_600 * 1_000, Ordering::SeqCst);

    // When: every retry fails
    let fallback = client
        .fetch_series(retail_request())
        .await
        .expect("stale fallback is not an error");

    // Then: the data matches the last good copy and is flagged stale
    assert_eq!(fallback.freshness, Freshness::Stale);
    assert_eq!(fallback.observations, original.observations);
    assert_eq!(transport.call_count(), 1 + 4);
}

#[tokio::test(start_paused = true)]
async fn when_a_provider_error_envelope_persists_the_stale_copy_is_used() {
    // Given: a cached series whose provider now answers 200 with an error body
    let dir = tempfile::tempdir().expect("tempdir");
    let (cache, now) = cache_with_clock(&dir);
    let transport = ScriptedTransport::new(vec![
        Ok(HttpResponse::ok_json(RETAIL_BODY)),
        Ok(HttpResponse::ok_json("error: too many requests")),
    ]);
    let client = ProviderClient::new(Census, transport.clone(), cache)
        .with_rate_limiter(RateLimiter::unlimited())
        .with_retry(no_wait_retry(2));
    client.fetch_series(retail_request()).await.expect("live");
    now.fetch_add(48 * 3_600 * 1_000, Ordering::SeqCst);

    // When: the series is requested again
    let fallback = client.fetch_series(retail_request()).await.expect("stale");

    // Then: the envelope was retried like a transport failure before falling back
    assert_eq!(fallback.freshness, Freshness::Stale);
    assert_eq!(transport.call_count(), 1 + 3);
}

#[tokio::test(start_paused = true)]
async fn when_the_response_shape_is_wrong_it_is_not_retried() {
    // Given: a provider answering with a JSON object instead of rows
    let transport = ScriptedTransport::replying(r#"{"unexpected": true}"#);
    let client = ProviderClient::new(Census, transport.clone(), CacheStore::disabled())
        .with_rate_limiter(RateLimiter::unlimited())
        .with_retry(no_wait_retry(3));

    // When: the series is fetched
    let error = client
        .fetch_series(retail_request())
        .await
        .expect_err("parse error");

    // Then: a single attempt and a parse failure with context
    assert_eq!(error.kind(), SourceErrorKind::Parse);
    assert!(!error.retryable());
    assert_eq!(error.series_id(), Some(RETAIL_SERIES));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_the_series_id_is_malformed_no_request_is_sent() {
    // Given: a Census client
    let transport = ScriptedTransport::replying(RETAIL_BODY);
    let client = ProviderClient::new(Census, transport.clone(), CacheStore::disabled());

    // When: the id lacks the variable part
    let request =
        SeriesRequest::parse(SourceId::Census, "timeseries/eits/retail", "2020-01-01", "2020-03-01")
            .expect("syntactically valid request");
    let error = client.fetch_series(request).await.expect_err("format error");

    // Then: it fails fast
    assert_eq!(error.kind(), SourceErrorKind::Format);
    assert!(error.message().contains("dataset:variable"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn when_a_source_is_not_registered_dispatch_reports_unknown_source() {
    // Given: a registry holding only a World Bank client
    let transport = ScriptedTransport::replying(POPULATION_BODY);
    let world_bank: Arc<dyn SourceClient> = Arc::new(ProviderClient::new(
        WorldBank,
        transport.clone(),
        CacheStore::disabled(),
    ));
    let registry = SeriesRegistry::new(vec![world_bank], CacheStore::disabled());

    // When: a FRED series is requested
    let error = registry
        .fetch(
            SourceId::Fred,
            "GDP",
            date!(2020 - 01 - 01),
            date!(2020 - 12 - 31),
        )
        .await
        .expect_err("unknown source");

    // Then: nothing is sent and the error names the source
    assert_eq!(error.kind(), SourceErrorKind::UnknownSource);
    assert_eq!(error.source_id(), Some(SourceId::Fred));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn dispatch_passes_results_through_unchanged() {
    // Given: a registry with a World Bank client
    let transport = ScriptedTransport::replying(POPULATION_BODY);
    let world_bank: Arc<dyn SourceClient> = Arc::new(
        ProviderClient::new(WorldBank, transport.clone(), CacheStore::disabled())
            .with_rate_limiter(RateLimiter::unlimited()),
    );
    let registry = SeriesRegistry::new(vec![world_bank], CacheStore::disabled());

    // When: a series is fetched through the registry
    let fetch = registry
        .fetch(
            SourceId::WorldBank,
            "WLD:SP.POP.TOTL",
            date!(2020 - 01 - 01),
            date!(2021 - 12 - 31),
        )
        .await
        .expect("fetch");

    // Then: the provider's observations come back as parsed
    assert_eq!(fetch.source, SourceId::WorldBank);
    assert_eq!(fetch.observations.len(), 2);
    assert_eq!(fetch.observations[0].value, 7_888_000_000.0);
    assert!(transport.urls()[0].contains("/country/WLD/indicator/SP.POP.TOTL"));
}

// =============================================================================
// Parsing properties
// =============================================================================

#[test]
fn period_notations_resolve_to_the_first_day_they_cover() {
    let cases = [
        ("2023", date!(2023 - 01 - 01)),
        ("2023-01", date!(2023 - 01 - 01)),
        ("2023Q1", date!(2023 - 01 - 01)),
        ("2023M01", date!(2023 - 01 - 01)),
        ("2023-01-15", date!(2023 - 01 - 15)),
    ];

    for (raw, expected) in cases {
        assert_eq!(parse_period(raw), Some(expected), "period {raw}");
    }
}

#[tokio::test]
async fn blank_and_placeholder_values_become_missing_observations() {
    // Given: a response with empty and N/A values
    let body = r#"[["cell_value","time"],["","2020-01"],["N/A","2020-02"],["7","2020-03"]]"#;
    let transport = ScriptedTransport::replying(body);
    let client = ProviderClient::new(Census, transport, CacheStore::disabled())
        .with_rate_limiter(RateLimiter::unlimited());

    // When: the series is fetched
    let fetch = client.fetch_series(retail_request()).await.expect("fetch");

    // Then: the bad rows are kept as NaN and the series still succeeds
    assert_eq!(fetch.observations.len(), 3);
    assert!(fetch.observations[0].is_missing());
    assert!(fetch.observations[1].is_missing());
    assert_eq!(fetch.observations[2].value, 7.0);
}
