//! Source client contract and request/response types.
//!
//! This module defines the contract (`SourceClient`) every agency client
//! implements, along with the request and result types it exchanges.
//!
//! # Operations
//!
//! | Operation | Request | Response | Network |
//! |-----------|---------|----------|---------|
//! | Fetch | [`SeriesRequest`] | [`SeriesFetch`] | on cache miss |
//! | Search | [`SearchRequest`] | `Vec<SeriesMetadata>` | never |
//! | Datasets | none | `Vec<String>` | never |
//!
//! # Example
//!
//! ```rust,ignore
//! use econfeed_core::{SeriesRequest, SourceClient, SourceError, SourceId};
//!
//! async fn print_series(client: &dyn SourceClient) -> Result<(), SourceError> {
//!     let request = SeriesRequest::parse(SourceId::Fred, "GDP", "2020-01-01", "2020-12-31")?;
//!     let fetch = client.fetch_series(request).await?;
//!
//!     for observation in &fetch.observations {
//!         println!("{}: {}", observation.date, observation.value);
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use time::Date;

use crate::domain::{format_date, parse_date};
use crate::{Observation, SeriesMetadata, SourceId, ValidationError};

/// Failure classification for source operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Malformed series id or request parameters. Never retried.
    Format,
    /// Network failure or non-success HTTP status.
    Transport,
    /// Error payload returned by the remote service inside a success response.
    Provider,
    /// Response body does not have the expected structure.
    Parse,
    /// No client is registered for the requested source.
    UnknownSource,
    Internal,
}

/// Structured error returned by source clients and the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
    source: Option<SourceId>,
    series_id: Option<String>,
}

impl SourceError {
    fn new(kind: SourceErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            source: None,
            series_id: None,
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Format, message, false)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transport, message, true)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Provider, message, true)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Parse, message, false)
    }

    pub fn unknown_source(source: SourceId) -> Self {
        Self::new(
            SourceErrorKind::UnknownSource,
            format!("no client is registered for source '{source}'"),
            false,
        )
        .with_source(source)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message, false)
    }

    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach the source and series id the failure belongs to.
    pub fn with_context(mut self, source: SourceId, series_id: impl Into<String>) -> Self {
        self.source = Some(source);
        self.series_id = Some(series_id.into());
        self
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn source_id(&self) -> Option<SourceId> {
        self.source
    }

    pub fn series_id(&self) -> Option<&str> {
        self.series_id.as_deref()
    }

    /// Whether a stale cache entry may be served in place of this failure.
    pub const fn allows_stale_fallback(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Transport | SourceErrorKind::Provider | SourceErrorKind::Parse
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Format => "source.format",
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::Provider => "source.provider",
            SourceErrorKind::Parse => "source.parse",
            SourceErrorKind::UnknownSource => "source.unknown_source",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.source, self.series_id.as_deref()) {
            (Some(source), Some(series_id)) => {
                write!(f, "{source} '{series_id}': {} ({})", self.message, self.code())
            }
            (Some(source), None) => write!(f, "{source}: {} ({})", self.message, self.code()),
            _ => write!(f, "{} ({})", self.message, self.code()),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::format(error.to_string())
    }
}

/// Request for one series over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub source: SourceId,
    pub series_id: String,
    pub start: Date,
    pub end: Date,
}

impl SeriesRequest {
    pub fn new(
        source: SourceId,
        series_id: impl Into<String>,
        start: Date,
        end: Date,
    ) -> Result<Self, SourceError> {
        let series_id = series_id.into().trim().to_owned();
        if series_id.is_empty() {
            return Err(SourceError::from(ValidationError::EmptySeriesId).with_source(source));
        }
        if start > end {
            return Err(SourceError::from(ValidationError::InvertedRange {
                start: format_date(start),
                end: format_date(end),
            })
            .with_context(source, series_id));
        }

        Ok(Self {
            source,
            series_id,
            start,
            end,
        })
    }

    /// Build a request from `YYYY-MM-DD` date strings.
    pub fn parse(
        source: SourceId,
        series_id: impl Into<String>,
        start: &str,
        end: &str,
    ) -> Result<Self, SourceError> {
        let start =
            parse_date(start).map_err(|error| SourceError::from(error).with_source(source))?;
        let end = parse_date(end).map_err(|error| SourceError::from(error).with_source(source))?;
        Self::new(source, series_id, start, end)
    }

    /// Deterministic cache key for this request.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.source,
            self.series_id,
            format_date(self.start),
            format_date(self.end)
        )
    }
}

/// Request payload for catalog search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize) -> Result<Self, SourceError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }
        if limit == 0 {
            return Err(ValidationError::ZeroLimit.into());
        }
        Ok(Self { query, limit })
    }
}

/// Where the observations of a [`SeriesFetch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched from the provider during this call.
    Live,
    /// Served from a cache entry still inside its TTL.
    Cached,
    /// Served from an expired cache entry after the live fetch failed.
    Stale,
}

impl Freshness {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Stale => "stale",
        }
    }

    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Stale)
    }
}

/// Result of a series fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesFetch {
    pub source: SourceId,
    pub series_id: String,
    pub freshness: Freshness,
    pub observations: Vec<Observation>,
}

/// Registration details reported by [`SourceClient::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub id: SourceId,
    pub has_api_key: bool,
    pub key_required: bool,
    /// Requests admitted per window; `None` when rate limiting is disabled.
    pub limit_per_window: Option<u32>,
    pub window_seconds: u64,
    pub series_id_format: &'static str,
}

/// Future returned by [`SourceClient`] operations.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Agency client contract.
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](SourceClient::id) | Source identifier |
/// | [`fetch_series`](SourceClient::fetch_series) | Cached, rate-limited, retried fetch |
/// | [`search_series`](SourceClient::search_series) | Catalog search |
/// | [`list_datasets`](SourceClient::list_datasets) | Catalog datasets |
/// | [`info`](SourceClient::info) | Key and quota details |
///
/// Implementations must be `Send + Sync`; one instance serves concurrent callers.
pub trait SourceClient: Send + Sync {
    fn id(&self) -> SourceId;

    /// Fetches one series.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if:
    /// - the series id is malformed or a required API key is missing
    /// - every attempt failed and no cached copy exists
    fn fetch_series<'a>(&'a self, req: SeriesRequest) -> SourceFuture<'a, SeriesFetch>;

    /// Searches the source's catalog of known series.
    fn search_series<'a>(&'a self, req: SearchRequest) -> SourceFuture<'a, Vec<SeriesMetadata>>;

    /// Lists the datasets of the source's catalog.
    fn list_datasets<'a>(&'a self) -> SourceFuture<'a, Vec<String>>;

    fn info(&self) -> SourceInfo;
}
