use econfeed_core::{SeriesRegistry, SourceInfo};
use serde_json::json;

use crate::error::CliError;

use super::CommandResult;

pub fn run(registry: &SeriesRegistry) -> Result<CommandResult, CliError> {
    let sources = registry.sources();
    let warnings = missing_key_warnings(&sources);

    Ok(CommandResult::ok(json!({
        "sources": sources,
        "cache_enabled": registry.cache().is_enabled(),
    }))
    .with_warnings(warnings))
}

fn missing_key_warnings(sources: &[SourceInfo]) -> Vec<String> {
    sources
        .iter()
        .filter(|info| info.key_required && !info.has_api_key)
        .map(|info| {
            format!(
                "{} requires an API key; set ECONFEED_{}_API_KEY or sources.{}.api_key",
                info.id,
                info.id.env_key(),
                info.id
            )
        })
        .collect()
}
