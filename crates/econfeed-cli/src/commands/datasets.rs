use econfeed_core::SeriesRegistry;
use serde_json::json;

use crate::cli::DatasetsArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(
    args: &DatasetsArgs,
    registry: &SeriesRegistry,
) -> Result<CommandResult, CliError> {
    match registry.list_datasets(args.source).await {
        Ok(datasets) => Ok(CommandResult::ok(json!({
            "source": args.source.as_str(),
            "datasets": datasets,
        }))),
        Err(error) => Ok(CommandResult::ok(json!({
            "source": args.source.as_str(),
            "datasets": [],
        }))
        .with_error(&error)),
    }
}
