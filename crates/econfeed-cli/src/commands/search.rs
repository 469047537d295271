use std::time::Instant;

use econfeed_core::{SeriesMetadata, SeriesRegistry};
use serde::Serialize;

use crate::cli::SearchArgs;
use crate::error::CliError;

use super::{elapsed_ms, CommandResult};

#[derive(Debug, Serialize)]
struct SearchResponseData {
    source: &'static str,
    query: String,
    results: Vec<SeriesMetadata>,
}

pub async fn run(args: &SearchArgs, registry: &SeriesRegistry) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let query = args.query.trim().to_owned();

    match registry.search(args.source, &query, args.limit).await {
        Ok(results) => {
            let empty = results.is_empty();
            let data = serde_json::to_value(SearchResponseData {
                source: args.source.as_str(),
                query,
                results,
            })?;
            let result = CommandResult::ok(data).with_latency(elapsed_ms(started));
            if empty {
                Ok(result.with_warning("no catalog entries matched the query"))
            } else {
                Ok(result)
            }
        }
        Err(error) => {
            let data = serde_json::to_value(SearchResponseData {
                source: args.source.as_str(),
                query,
                results: Vec::new(),
            })?;
            Ok(CommandResult::ok(data)
                .with_error(&error)
                .with_latency(elapsed_ms(started)))
        }
    }
}
