//! CLI argument definitions for econfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Fetch one series over a date range |
//! | `search` | Search a source's series catalog |
//! | `datasets` | List a source's catalog datasets |
//! | `sources` | List registered sources with key and quota details |
//! | `cache` | Inspect and maintain the response cache |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | TOML configuration file |
//! | `--format` | `json` | Output format (json, ndjson, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `--no-cache` | `false` | Bypass the response cache |
//! | `--timeout-ms` | config | Per-attempt HTTP timeout |
//!
//! # Examples
//!
//! ```bash
//! econfeed fetch fred GDP --start 2015-01-01 --end 2020-12-31
//! econfeed fetch worldbank USA:NY.GDP.MKTP.CD --start 2000-01-01 --format table
//! econfeed search bls unemployment --limit 5
//! econfeed cache prune
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use econfeed_core::domain::parse_date;
use econfeed_core::{SourceId, ValidationError};
use time::Date;

/// Economic time series from statistical agencies, behind one interface.
#[derive(Debug, Parser)]
#[command(
    name = "econfeed",
    author,
    version,
    about = "Fetch economic time series from statistical agencies",
    long_about = "econfeed fetches series from Census, FRED, World Bank, BLS, BEA, Eurostat, \
IMF, ECB, OECD and UN Comtrade with a shared cache, per-source rate limits and retries.\n\
\n\
API keys are read from the config file or from ECONFEED_<SOURCE>_API_KEY."
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "ECONFEED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Skip the response cache for this invocation.
    #[arg(long, global = true, default_value_t = false)]
    pub no_cache: bool,

    /// Per-attempt HTTP timeout in milliseconds, overriding the config file.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text for terminal display.
    Table,
    /// Single JSON object output.
    Json,
    /// Newline-delimited JSON.
    Ndjson,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one series.
    ///
    ///   econfeed fetch census timeseries/eits/resconst:APERMITS:category_code=TOTAL \
    ///       --start 2020-01-01 --end 2020-03-31
    ///   econfeed fetch ecb EXR:M.USD.EUR.SP00.A --start 2019-01-01
    #[command(verbatim_doc_comment)]
    Fetch(FetchArgs),

    /// Search a source's catalog of known series.
    Search(SearchArgs),

    /// List the datasets of a source's catalog.
    Datasets(DatasetsArgs),

    /// List registered sources.
    Sources,

    /// Response cache management.
    Cache(CacheArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[arg(value_parser = parse_source)]
    pub source: SourceId,

    /// Source-specific series id (see `econfeed sources`).
    pub series_id: String,

    /// First date of the range (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date_arg)]
    pub start: Date,

    /// Last date of the range (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date_arg)]
    pub end: Option<Date>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(value_parser = parse_source)]
    pub source: SourceId,

    /// Case-insensitive text matched against id, title and dataset.
    pub query: String,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct DatasetsArgs {
    #[arg(value_parser = parse_source)]
    pub source: SourceId,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show entry counts, size and hit statistics.
    Stats,
    /// Remove every cached response.
    Clear,
    /// Remove expired responses only.
    Prune,
}

fn parse_source(value: &str) -> Result<SourceId, ValidationError> {
    value.parse()
}

fn parse_date_arg(value: &str) -> Result<Date, ValidationError> {
    parse_date(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn fetch_arguments_parse_source_and_dates() {
        let cli = Cli::try_parse_from([
            "econfeed",
            "fetch",
            "FRED",
            "GDP",
            "--start",
            "2020-01-01",
            "--end",
            "2020-12-31",
            "--no-cache",
        ])
        .expect("valid arguments");

        assert!(cli.no_cache);
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch command");
        };
        assert_eq!(args.source, SourceId::Fred);
        assert_eq!(args.start, date!(2020 - 01 - 01));
        assert_eq!(args.end, Some(date!(2020 - 12 - 31)));
    }

    #[test]
    fn unknown_source_and_bad_dates_are_usage_errors() {
        assert!(Cli::try_parse_from(["econfeed", "datasets", "nasdaq"]).is_err());
        assert!(Cli::try_parse_from([
            "econfeed", "fetch", "fred", "GDP", "--start", "2020/01/01"
        ])
        .is_err());
    }

    #[test]
    fn fetch_help_example_names_a_catalog_series() {
        use clap::CommandFactory;
        use econfeed_core::client::SeriesProvider;
        use econfeed_core::sources::Census;

        let mut command = Cli::command();
        let help = command
            .find_subcommand_mut("fetch")
            .expect("fetch subcommand")
            .render_long_help()
            .to_string();
        let census_id = help
            .lines()
            .find_map(|line| line.trim().strip_prefix("econfeed fetch census "))
            .and_then(|rest| rest.split_whitespace().next())
            .expect("census example in help");

        assert!(
            Census.catalog().iter().any(|series| series.id == census_id),
            "{census_id} is not a known census series"
        );
    }

    #[test]
    fn cache_subcommands_parse() {
        let cli = Cli::try_parse_from(["econfeed", "cache", "prune", "--format", "table"])
            .expect("valid arguments");
        assert_eq!(cli.format, OutputFormat::Table);
        assert!(matches!(
            cli.command,
            Command::Cache(CacheArgs {
                command: CacheCommand::Prune
            })
        ));
    }
}
