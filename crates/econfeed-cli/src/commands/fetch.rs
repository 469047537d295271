use std::time::Instant;

use econfeed_core::domain::format_date;
use econfeed_core::{Observation, SeriesFetch, SeriesRegistry};
use serde::Serialize;
use time::OffsetDateTime;

use crate::cli::FetchArgs;
use crate::error::CliError;

use super::{elapsed_ms, CommandResult};

#[derive(Debug, Serialize)]
struct FetchResponseData<'a> {
    source: &'a str,
    series_id: &'a str,
    start: String,
    end: String,
    count: usize,
    missing: usize,
    observations: &'a [Observation],
}

pub async fn run(args: &FetchArgs, registry: &SeriesRegistry) -> Result<CommandResult, CliError> {
    let end = args
        .end
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());
    let started = Instant::now();

    match registry
        .fetch(args.source, &args.series_id, args.start, end)
        .await
    {
        Ok(fetch) => {
            let latency_ms = elapsed_ms(started);
            let warnings = fetch_warnings(&fetch);
            let data = serde_json::to_value(FetchResponseData {
                source: fetch.source.as_str(),
                series_id: &fetch.series_id,
                start: format_date(args.start),
                end: format_date(end),
                count: fetch.observations.len(),
                missing: missing_count(&fetch.observations),
                observations: &fetch.observations,
            })?;
            Ok(CommandResult::ok(data)
                .with_warnings(warnings)
                .with_latency(latency_ms)
                .with_freshness(fetch.freshness))
        }
        Err(error) => {
            let data = serde_json::to_value(FetchResponseData {
                source: args.source.as_str(),
                series_id: &args.series_id,
                start: format_date(args.start),
                end: format_date(end),
                count: 0,
                missing: 0,
                observations: &[],
            })?;
            Ok(CommandResult::ok(data)
                .with_error(&error)
                .with_latency(elapsed_ms(started)))
        }
    }
}

fn missing_count(observations: &[Observation]) -> usize {
    observations.iter().filter(|obs| obs.is_missing()).count()
}

fn fetch_warnings(fetch: &SeriesFetch) -> Vec<String> {
    let mut warnings = Vec::new();
    if fetch.freshness.is_degraded() {
        warnings.push(String::from(
            "live fetch failed; serving an expired cached copy",
        ));
    }
    let missing = missing_count(&fetch.observations);
    if missing > 0 {
        warnings.push(format!("{missing} observation(s) have no numeric value"));
    }
    if fetch.observations.is_empty() {
        warnings.push(String::from("no observations in the requested range"));
    }
    warnings
}
