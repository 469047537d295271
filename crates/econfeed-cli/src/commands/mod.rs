mod cache;
mod datasets;
mod fetch;
mod search;
mod sources;

use std::sync::Arc;

use econfeed_core::{Freshness, IngestConfig, ReqwestHttpClient, SeriesRegistry, SourceError};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::{Envelope, EnvelopeError, EnvelopeMeta};

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
    pub freshness: Option<Freshness>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            freshness: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_error(mut self, error: &SourceError) -> Self {
        self.errors.push(EnvelopeError::from(error));
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = Some(freshness);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    let config = load_config(cli)?;
    let registry = SeriesRegistry::from_config(&config, Arc::new(ReqwestHttpClient::new()))?;

    let command_result = match &cli.command {
        Command::Fetch(args) => fetch::run(args, &registry).await?,
        Command::Search(args) => search::run(args, &registry).await?,
        Command::Datasets(args) => datasets::run(args, &registry).await?,
        Command::Sources => sources::run(&registry)?,
        Command::Cache(args) => cache::run(args, &registry).await?,
    };

    let CommandResult {
        data,
        warnings,
        errors,
        latency_ms,
        freshness,
    } = command_result;

    tracing::debug!(
        latency_ms,
        warnings = warnings.len(),
        errors = errors.len(),
        "command finished"
    );

    let mut meta = EnvelopeMeta::new(latency_ms, freshness);
    for warning in warnings {
        meta.push_warning(warning);
    }

    Ok(Envelope { meta, data, errors })
}

/// Config file (or defaults) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<IngestConfig, CliError> {
    let mut config = IngestConfig::load(cli.config.as_deref())?;
    if cli.no_cache {
        config.cache.enabled = false;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
