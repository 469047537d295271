//! Ingestion settings.
//!
//! Every field has a default so an empty file (or no file) is a valid
//! configuration. API keys may come from the file or from
//! `ECONFEED_<SOURCE>_API_KEY`, falling back to `<SOURCE>_API_KEY`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, RetryPolicy, SourceId};

/// Top-level ingestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Per-attempt HTTP timeout.
    pub request_timeout_ms: u64,
    /// Deadline around admission, retries and parsing of one fetch. Zero disables it.
    pub fetch_deadline_ms: u64,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
    pub sources: BTreeMap<SourceId, SourceSettings>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            fetch_deadline_ms: 0,
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            rate_limit: RateLimitSettings::default(),
            sources: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_hours: u64,
    pub max_size_mb: u64,
    /// Database file. Defaults to `$ECONFEED_HOME/cache/responses.duckdb`.
    pub location: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: 24,
            max_size_mb: 100,
            location: None,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3_600))
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn resolved_location(&self) -> PathBuf {
        self.location
            .clone()
            .unwrap_or_else(econfeed_warehouse::default_db_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_enabled: bool,
    /// Spread each backoff delay by +/- 50% so concurrent callers do not
    /// retry in lockstep.
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_delay_ms: 1_000,
            backoff_enabled: true,
            jitter: false,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::from_settings(
            self.enabled,
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            self.backoff_enabled,
        );
        if self.jitter {
            policy.with_jitter()
        } else {
            policy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Requests per window, replacing the source's default quota.
    pub overrides: BTreeMap<SourceId, u32>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for SourceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSettings")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl IngestConfig {
    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `$ECONFEED_HOME/config.toml` when it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let default_path = econfeed_warehouse::resolve_econfeed_home().join("config.toml");
        if default_path.is_file() {
            return Self::from_file(default_path);
        }

        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.cache.enabled && self.cache.ttl_hours == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.ttl_hours",
                reason: String::from("must be greater than zero when the cache is enabled"),
            });
        }
        Ok(())
    }

    pub fn source_enabled(&self, source: SourceId) -> bool {
        self.sources
            .get(&source)
            .map_or(true, |settings| settings.enabled)
    }

    /// API key from the config file, else from the environment.
    pub fn api_key(&self, source: SourceId) -> Option<String> {
        self.sources
            .get(&source)
            .and_then(|settings| settings.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .or_else(|| api_key_from_env(source))
    }

    pub fn rate_limit_override(&self, source: SourceId) -> Option<u32> {
        self.rate_limit.overrides.get(&source).copied()
    }

    pub fn fetch_deadline(&self) -> Option<Duration> {
        (self.fetch_deadline_ms > 0).then(|| Duration::from_millis(self.fetch_deadline_ms))
    }
}

fn api_key_from_env(source: SourceId) -> Option<String> {
    let suffix = source.env_key();
    env::var(format!("ECONFEED_{suffix}_API_KEY"))
        .or_else(|_| env::var(format!("{suffix}_API_KEY")))
        .ok()
        .filter(|key| !key.trim().is_empty())
}
