//! Bureau of Labor Statistics public data API (v2).

use serde::Deserialize;

use crate::client::SeriesProvider;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::parse::{observation, parse_value_str, split_series_id};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const BASE_URL: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data";
const SERIES_ID_FORMAT: &str = "series";
const SUCCESS: &str = "REQUEST_SUCCEEDED";

#[derive(Debug, Clone, Copy, Default)]
pub struct Bls;

#[derive(Debug, Deserialize)]
struct BlsResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results")]
    results: Option<BlsResults>,
}

#[derive(Debug, Deserialize)]
struct BlsResults {
    #[serde(default)]
    series: Vec<BlsSeries>,
}

#[derive(Debug, Deserialize)]
struct BlsSeries {
    #[serde(default)]
    data: Vec<BlsRow>,
}

#[derive(Debug, Deserialize)]
struct BlsRow {
    year: String,
    period: String,
    value: String,
}

/// Map a BLS `year` + `period` pair onto a period label.
///
/// `M13`, `Q05` and `S03` are annual averages and have no period of their own.
fn period_label(year: &str, period: &str) -> Option<String> {
    let kind = period.get(..1)?;
    let number: u8 = period.get(1..)?.parse().ok()?;
    match (kind, number) {
        ("M", 1..=12) => Some(format!("{year}M{number:02}")),
        ("Q", 1..=4) => Some(format!("{year}Q{number}")),
        ("S", 1..=2) => Some(format!("{year}S{number}")),
        ("A", 1) => Some(year.to_owned()),
        _ => None,
    }
}

impl SeriesProvider for Bls {
    fn id(&self) -> SourceId {
        SourceId::Bls
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
        let request = HttpRequest::get(format!("{BASE_URL}/{}", urlencoding::encode(parts[0])))
            .with_query("startyear", &req.start.year().to_string())
            .with_query("endyear", &req.end.year().to_string());

        Ok(match api_key {
            Some(key) => request.with_auth(&HttpAuth::QueryParam {
                name: String::from("registrationkey"),
                value: key.to_owned(),
            }),
            None => request,
        })
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let response: BlsResponse = serde_json::from_str(body).ok()?;
        if response.status == SUCCESS {
            return None;
        }
        Some(if response.message.is_empty() {
            response.status
        } else {
            format!("{}: {}", response.status, response.message.join("; "))
        })
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        let response: BlsResponse = serde_json::from_str(body)
            .map_err(|error| SourceError::parse(format!("unexpected BLS payload: {error}")))?;
        let results = response
            .results
            .ok_or_else(|| SourceError::parse("BLS payload has no Results"))?;

        Ok(results
            .series
            .iter()
            .flat_map(|series| series.data.iter())
            .filter_map(|row| {
                let label = period_label(&row.year, &row.period)?;
                observation(series_id, &label, parse_value_str(&row.value))
            })
            .collect())
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "CUUR0000SA0",
                "CPI-U, all items, U.S. city average, not seasonally adjusted",
                "CU",
                "Monthly",
                "Index 1982-84=100",
            ),
            SeriesMetadata::new(
                "CUSR0000SA0",
                "CPI-U, all items, U.S. city average, seasonally adjusted",
                "CU",
                "Monthly",
                "Index 1982-84=100",
            ),
            SeriesMetadata::new(
                "LNS14000000",
                "Unemployment rate, seasonally adjusted",
                "LN",
                "Monthly",
                "Percent",
            ),
            SeriesMetadata::new(
                "CES0000000001",
                "All employees, total nonfarm",
                "CE",
                "Monthly",
                "Thousands",
            ),
            SeriesMetadata::new(
                "PRS85006092",
                "Nonfarm business labor productivity",
                "PR",
                "Quarterly",
                "Percent change",
            ),
        ]
    }
}
