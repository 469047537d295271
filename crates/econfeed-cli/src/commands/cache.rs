use econfeed_core::SeriesRegistry;
use serde_json::json;

use crate::cli::{CacheArgs, CacheCommand};
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &CacheArgs, registry: &SeriesRegistry) -> Result<CommandResult, CliError> {
    let result = match args.command {
        CacheCommand::Stats => {
            let stats = registry.cache_stats().await?;
            CommandResult::ok(serde_json::to_value(stats)?)
        }
        CacheCommand::Clear => {
            let removed = registry.clear_cache().await?;
            CommandResult::ok(json!({ "action": "clear", "removed": removed }))
        }
        CacheCommand::Prune => {
            let removed = registry.clear_expired().await?;
            CommandResult::ok(json!({ "action": "prune", "removed": removed }))
        }
    };

    if registry.cache().is_enabled() {
        Ok(result)
    } else {
        Ok(result.with_warning("response cache is disabled"))
    }
}
