//! World Bank Indicators API (v2).

use serde_json::Value;

use crate::client::SeriesProvider;
use crate::http_client::HttpRequest;
use crate::parse::{observation, parse_json, parse_value, scalar_text, split_series_id};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const BASE_URL: &str = "https://api.worldbank.org/v2/country";
const SERIES_ID_FORMAT: &str = "country:indicator";
const PAGE_SIZE: &str = "20000";

/// Responses are a two-element array: paging metadata, then the rows (or
/// `null` when the indicator has no data for the range).
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldBank;

impl SeriesProvider for WorldBank {
    fn id(&self) -> SourceId {
        SourceId::WorldBank
    }

    fn series_id_format(&self) -> &'static str {
        SERIES_ID_FORMAT
    }

    fn build_request(
        &self,
        req: &SeriesRequest,
        _api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError> {
        let parts = split_series_id(&req.series_id, 2, 2, SERIES_ID_FORMAT)?;
        let (country, indicator) = (parts[0], parts[1]);

        Ok(HttpRequest::get(format!(
            "{BASE_URL}/{}/indicator/{}",
            urlencoding::encode(country),
            urlencoding::encode(indicator)
        ))
        .with_query("format", "json")
        .with_query("per_page", PAGE_SIZE)
        .with_query(
            "date",
            &format!("{}:{}", req.start.year(), req.end.year()),
        ))
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let root: Value = serde_json::from_str(body).ok()?;
        let messages = root.get(0)?.get("message")?.as_array()?;
        let text: Vec<String> = messages
            .iter()
            .filter_map(|message| {
                let value = message.get("value").and_then(Value::as_str)?;
                Some(match message.get("key").and_then(Value::as_str) {
                    Some(key) => format!("{key}: {value}"),
                    None => value.to_owned(),
                })
            })
            .collect();
        Some(if text.is_empty() {
            String::from("World Bank API returned an error message")
        } else {
            text.join("; ")
        })
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        let root = parse_json(body)?;
        let envelope = root
            .as_array()
            .ok_or_else(|| SourceError::parse("expected a [metadata, rows] array"))?;

        let rows = match envelope.get(1) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(rows)) => rows,
            Some(_) => return Err(SourceError::parse("rows element is not an array")),
        };

        Ok(rows
            .iter()
            .filter_map(|row| {
                let period = row.get("date").and_then(scalar_text)?;
                let value = row.get("value").map_or(f64::NAN, parse_value);
                observation(series_id, &period, value)
            })
            .collect())
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "USA:NY.GDP.MKTP.CD",
                "GDP (current US$), United States",
                "WDI",
                "Annual",
                "Current US$",
            ),
            SeriesMetadata::new(
                "WLD:SP.POP.TOTL",
                "Population, total, World",
                "WDI",
                "Annual",
                "Persons",
            ),
            SeriesMetadata::new(
                "USA:FP.CPI.TOTL.ZG",
                "Inflation, consumer prices (annual %), United States",
                "WDI",
                "Annual",
                "Percent",
            ),
            SeriesMetadata::new(
                "CHN:NE.EXP.GNFS.ZS",
                "Exports of goods and services (% of GDP), China",
                "WDI",
                "Annual",
                "Percent of GDP",
            ),
            SeriesMetadata::new(
                "DEU:SL.UEM.TOTL.ZS",
                "Unemployment, total (% of labor force), Germany",
                "WDI",
                "Annual",
                "Percent",
            ),
        ]
    }
}
