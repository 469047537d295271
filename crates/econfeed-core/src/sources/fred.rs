//! Federal Reserve Economic Data (FRED).

use serde::Deserialize;

use crate::client::SeriesProvider;
use crate::domain::format_date;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::parse::{observation, parse_value_str, split_series_id};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const SERIES_ID_FORMAT: &str = "series";

#[derive(Debug, Clone, Copy, Default)]
pub struct Fred;

#[derive(Debug, Deserialize)]
struct FredResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredError {
    #[serde(default)]
    error_code: Option<i64>,
    error_message: String,
}

impl SeriesProvider for Fred {
    fn id(&self) -> SourceId {
        SourceId::Fred
    }

    fn series_id_format(&self) -> &'static str {
        SERIES_ID_FORMAT
    }

    fn build_request(
        &self,
        req: &SeriesRequest,
        api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError> {
        let parts = split_series_id(&req.series_id, 1, 1, SERIES_ID_FORMAT)?;
        let api_key = api_key.ok_or_else(|| {
            SourceError::format("FRED requires an API key (set FRED_API_KEY)")
        })?;

        Ok(HttpRequest::get(BASE_URL)
            .with_query("series_id", parts[0])
            .with_query("file_type", "json")
            .with_query("observation_start", &format_date(req.start))
            .with_query("observation_end", &format_date(req.end))
            .with_auth(&HttpAuth::QueryParam {
                name: String::from("api_key"),
                value: api_key.to_owned(),
            }))
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let error: FredError = serde_json::from_str(body).ok()?;
        Some(match error.error_code {
            Some(code) => format!("{code}: {}", error.error_message),
            None => error.error_message,
        })
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        let response: FredResponse = serde_json::from_str(body)
            .map_err(|error| SourceError::parse(format!("unexpected FRED payload: {error}")))?;

        Ok(response
            .observations
            .iter()
            .filter_map(|row| observation(series_id, &row.date, parse_value_str(&row.value)))
            .collect())
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "GDP",
                "Gross Domestic Product",
                "nipa",
                "Quarterly",
                "Billions of dollars",
            ),
            SeriesMetadata::new(
                "GDPC1",
                "Real Gross Domestic Product",
                "nipa",
                "Quarterly",
                "Billions of chained 2017 dollars",
            ),
            SeriesMetadata::new(
                "CPIAUCSL",
                "Consumer Price Index for All Urban Consumers",
                "prices",
                "Monthly",
                "Index 1982-1984=100",
            ),
            SeriesMetadata::new("UNRATE", "Unemployment Rate", "employment", "Monthly", "Percent"),
            SeriesMetadata::new(
                "PAYEMS",
                "All Employees, Total Nonfarm",
                "employment",
                "Monthly",
                "Thousands of persons",
            ),
            SeriesMetadata::new(
                "FEDFUNDS",
                "Federal Funds Effective Rate",
                "interest_rates",
                "Monthly",
                "Percent",
            ),
            SeriesMetadata::new(
                "DGS10",
                "10-Year Treasury Constant Maturity Rate",
                "interest_rates",
                "Daily",
                "Percent",
            ),
            SeriesMetadata::new(
                "M2SL",
                "M2 Money Stock",
                "money",
                "Monthly",
                "Billions of dollars",
            ),
        ]
    }
}
