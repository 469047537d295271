use std::path::PathBuf;

use thiserror::Error;

/// Validation errors for caller-supplied values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "invalid source '{value}', expected one of census, fred, worldbank, bls, bea, eurostat, imf, ecb, oecd, comtrade"
    )]
    InvalidSource { value: String },

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("series id cannot be empty")]
    EmptySeriesId,

    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },

    #[error("search query must not be empty")]
    EmptyQuery,

    #[error("limit must be greater than zero")]
    ZeroLimit,
}

/// Errors raised while loading [`IngestConfig`](crate::IngestConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level error type for core setup operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open response cache: {0}")]
    Cache(#[from] crate::cache::CacheError),
}
