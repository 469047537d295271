//! Bureau of Economic Analysis data API.

use serde_json::Value;

use crate::client::SeriesProvider;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::parse::{observation, parse_json, parse_value, scalar_text, split_series_id};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const BASE_URL: &str = "https://apps.bea.gov/api/data";
const SERIES_ID_FORMAT: &str = "dataset:table[:line[:frequency]]";
const DEFAULT_LINE: &str = "1";
const DEFAULT_FREQUENCY: &str = "Q";

/// A table returns every line of the table; only rows whose `LineNumber`
/// matches the requested line (default `1`) are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bea;

struct BeaSeriesId<'a> {
    dataset: &'a str,
    table: &'a str,
    line: &'a str,
    frequency: &'a str,
}

impl<'a> BeaSeriesId<'a> {
    fn parse(series_id: &'a str) -> Result<Self, SourceError> {
        let parts = split_series_id(series_id, 2, 4, SERIES_ID_FORMAT)?;
        Ok(Self {
            dataset: parts[0],
            table: parts[1],
            line: parts.get(2).copied().unwrap_or(DEFAULT_LINE),
            frequency: parts.get(3).copied().unwrap_or(DEFAULT_FREQUENCY),
        })
    }
}

fn results(root: &Value) -> Option<&Value> {
    let results = root.get("BEAAPI")?.get("Results")?;
    match results {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn error_text(error: &Value) -> String {
    ["APIErrorDescription", "ErrorDetail", "APIErrorCode"]
        .iter()
        .filter_map(|field| error.get(field))
        .filter_map(|detail| match detail {
            Value::Object(inner) => inner.get("Description").and_then(scalar_text),
            other => scalar_text(other),
        })
        .next()
        .unwrap_or_else(|| error.to_string())
}

impl SeriesProvider for Bea {
    fn id(&self) -> SourceId {
        SourceId::Bea
    }

    fn series_id_format(&self) -> &'static str {
        SERIES_ID_FORMAT
    }

    fn build_request(
        &self,
        req: &SeriesRequest,
        api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError> {
        let id = BeaSeriesId::parse(&req.series_id)?;
        let api_key = api_key
            .ok_or_else(|| SourceError::format("BEA requires an API key (set BEA_API_KEY)"))?;
        let years = (req.start.year()..=req.end.year())
            .map(|year| year.to_string())
            .collect::<Vec<_>>()
            .join(",");

        Ok(HttpRequest::get(BASE_URL)
            .with_auth(&HttpAuth::QueryParam {
                name: String::from("UserID"),
                value: api_key.to_owned(),
            })
            .with_query("method", "GetData")
            .with_query("DataSetName", id.dataset)
            .with_query("TableName", id.table)
            .with_query("Frequency", id.frequency)
            .with_query("Year", &years)
            .with_query("ResultFormat", "JSON"))
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let root: Value = serde_json::from_str(body).ok()?;
        let api = root.get("BEAAPI")?;
        api.get("Error")
            .or_else(|| results(&root).and_then(|results| results.get("Error")))
            .map(error_text)
            .or_else(|| {
                // A payload with neither data nor an error is itself an error.
                api.get("Results")
                    .is_none()
                    .then(|| String::from("BEA response has no Results"))
            })
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        let id = BeaSeriesId::parse(series_id)?;
        let root = parse_json(body)?;
        let rows = results(&root)
            .and_then(|results| results.get("Data"))
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::parse("BEA payload has no Results.Data array"))?;

        Ok(rows
            .iter()
            .filter(|row| {
                row.get("LineNumber")
                    .and_then(scalar_text)
                    .is_some_and(|line| line.trim() == id.line)
            })
            .filter_map(|row| {
                let period = row.get("TimePeriod").and_then(scalar_text)?;
                let value = row.get("DataValue").map_or(f64::NAN, parse_value);
                observation(series_id, &period, value)
            })
            .collect())
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "NIPA:T10101:1:Q",
                "Percent change from preceding period in real GDP",
                "NIPA",
                "Quarterly",
                "Percent",
            ),
            SeriesMetadata::new(
                "NIPA:T10105:1:Q",
                "Gross domestic product, current dollars",
                "NIPA",
                "Quarterly",
                "Millions of dollars, SAAR",
            ),
            SeriesMetadata::new(
                "NIPA:T20600:1:M",
                "Personal income, monthly",
                "NIPA",
                "Monthly",
                "Millions of dollars, SAAR",
            ),
            SeriesMetadata::new(
                "NIPA:T20804:1:M",
                "PCE price index, percent change",
                "NIPA",
                "Monthly",
                "Percent",
            ),
            SeriesMetadata::new(
                "ITA:T40205:1:A",
                "International transactions, current account balance",
                "ITA",
                "Annual",
                "Millions of dollars",
            ),
        ]
    }
}
