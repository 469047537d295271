//! # Econfeed Core
//!
//! Resilient ingestion of economic time series from statistical agencies.
//!
//! ## Overview
//!
//! Ten agency APIs, each with its own authentication, query dialect, response
//! shape and quota, are unified behind one [`SourceClient`] contract and one
//! canonical [`Observation`] type. Every client shares the same pipeline:
//!
//! - **Persistent cache** with TTL and a stale-read mode used when live fetches fail
//! - **Fixed-window rate limiting** per source that waits instead of rejecting
//! - **Exponential-backoff retries** for transport and provider failures
//! - **Tolerant parsing**: unreadable values become `NaN`, unreadable periods are skipped
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | TTL cache over the DuckDB response store |
//! | [`client`] | Generic fetch pipeline and the [`SeriesProvider`] seam |
//! | [`config`] | TOML configuration and API key resolution |
//! | [`data_source`] | Client contract and request/response types |
//! | [`domain`] | Observations, catalog entries and period parsing |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`parse`] | Parsing rules shared by the providers |
//! | [`policy`] | Per-source quota defaults |
//! | [`rate_limit`] | Fixed-window limiter |
//! | [`registry`] | Dispatch by source id |
//! | [`retry`] | Retry executor and backoff strategies |
//! | [`source`] | Source identifiers |
//! | [`sources`] | The ten agency providers |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use econfeed_core::{IngestConfig, ReqwestHttpClient, SeriesRegistry, SeriesRequest, SourceId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::load(None)?;
//!     let registry = SeriesRegistry::from_config(&config, Arc::new(ReqwestHttpClient::new()))?;
//!
//!     let request = SeriesRequest::parse(SourceId::WorldBank, "USA:NY.GDP.MKTP.CD", "2010-01-01", "2020-12-31")?;
//!     let fetch = registry.fetch_request(request).await?;
//!     println!("{} observations ({:?})", fetch.observations.len(), fetch.freshness);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ SeriesRegistry  │
//! └────────┬────────┘
//!          │ by SourceId
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ ProviderClient  │────▶│ CacheStore       │──▶ econfeed-warehouse
//! │ <P: Provider>   │     └──────────────────┘
//! │                 │     ┌──────────────────┐
//! │                 │────▶│ RateLimiter      │
//! │                 │     └──────────────────┘
//! │                 │     ┌──────────────────┐     ┌─────────────┐
//! │                 │────▶│ RetryPolicy      │────▶│ HttpClient  │
//! └─────────────────┘     └──────────────────┘     └─────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use econfeed_core::{SourceError, SourceErrorKind};
//!
//! fn describe(error: &SourceError) -> &'static str {
//!     match error.kind() {
//!         SourceErrorKind::Format => "fix the request",
//!         SourceErrorKind::Transport | SourceErrorKind::Provider => "try again later",
//!         SourceErrorKind::Parse => "the provider changed its format",
//!         _ => "unexpected failure",
//!     }
//! }
//!
//! assert_eq!(describe(&SourceError::format("bad id")), "fix the request");
//! ```
//!
//! A failure that still has a cached copy is not an error: the fetch succeeds
//! with [`Freshness::Stale`].
//!
//! ## Security
//!
//! API keys come from the config file or environment and are never logged;
//! `Debug` output of credentials is redacted.

pub mod cache;
pub mod client;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod parse;
pub mod policy;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod source;
pub mod sources;

#[cfg(test)]
mod testing;

// Caching
pub use cache::{CacheError, CacheRead, CacheStats, CacheStore, CachedPayload};

// Client pipeline
pub use client::{ProviderClient, SeriesProvider};

// Configuration
pub use config::{CacheSettings, IngestConfig, RateLimitSettings, RetrySettings, SourceSettings};

// Client contract and types
pub use data_source::{
    Freshness, SearchRequest, SeriesFetch, SeriesRequest, SourceClient, SourceError,
    SourceErrorKind, SourceFuture, SourceInfo,
};

// Domain models
pub use domain::{Observation, SeriesMetadata};

// Error types
pub use error::{ConfigError, CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Quotas and admission
pub use policy::SourcePolicy;
pub use rate_limit::{RateLimitSnapshot, RateLimiter};

// Dispatch
pub use registry::SeriesRegistry;

// Retry logic
pub use retry::{Backoff, RetryPolicy};

// Source identifiers
pub use source::SourceId;

// Providers
pub use sources::{
    Bea, BeaClient, Bls, BlsClient, Census, CensusClient, Comtrade, ComtradeClient, Ecb, EcbClient,
    Eurostat, EurostatClient, Fred, FredClient, Imf, ImfClient, Oecd, OecdClient, WorldBank,
    WorldBankClient,
};
