//! U.S. Census Bureau time-series API.

use crate::client::SeriesProvider;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::parse::{parse_json, split_series_id, tabular_rows};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const BASE_URL: &str = "https://api.census.gov/data";
const SERIES_ID_FORMAT: &str = "dataset:variable[:predicate]";

/// Census time-series endpoints (`timeseries/eits/...`, `timeseries/intltrade/...`).
///
/// The variable is sent as `data_type_code`; an optional `name=value`
/// predicate narrows the query further. Rows come back as a header row
/// followed by positional rows with the value in column 0 and the period in
/// column 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Census;

impl SeriesProvider for Census {
    fn id(&self) -> SourceId {
        SourceId::Census
    }

    fn series_id_format(&self) -> &'static str {
        SERIES_ID_FORMAT
    }

    fn build_request(
        &self,
        req: &SeriesRequest,
        api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError> {
        let parts = split_series_id(&req.series_id, 2, 3, SERIES_ID_FORMAT)?;
        let range = format!(
            "from {:04}-{:02} to {:04}-{:02}",
            req.start.year(),
            u8::from(req.start.month()),
            req.end.year(),
            u8::from(req.end.month())
        );

        let mut request = HttpRequest::get(format!("{BASE_URL}/{}", parts[0]))
            .with_query("get", "cell_value,time")
            .with_query("for", "us:*")
            .with_query("time", &range)
            .with_query("data_type_code", parts[1]);

        if let Some(predicate) = parts.get(2) {
            let Some((name, value)) = predicate.split_once('=') else {
                return Err(SourceError::format(format!(
                    "predicate '{predicate}' must have the form name=value"
                )));
            };
            request = request.with_query(name.trim(), value.trim());
        }

        if let Some(key) = api_key {
            request = request.with_auth(&HttpAuth::QueryParam {
                name: String::from("key"),
                value: key.to_owned(),
            });
        }
        Ok(request)
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let text = body.trim_start();
        text.get(..6)
            .filter(|prefix| prefix.eq_ignore_ascii_case("error:"))
            .map(|_| text.lines().next().unwrap_or(text).trim().to_owned())
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        // No matching rows is answered with an empty body.
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        tabular_rows(&parse_json(body)?, series_id, 0, 1)
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "timeseries/eits/marts:SM:category_code=44X72",
                "Retail and food services sales, seasonally adjusted",
                "timeseries/eits/marts",
                "Monthly",
                "Millions of dollars",
            ),
            SeriesMetadata::new(
                "timeseries/eits/resconst:APERMITS:category_code=TOTAL",
                "New residential construction, authorized permits",
                "timeseries/eits/resconst",
                "Monthly",
                "Thousands of units",
            ),
            SeriesMetadata::new(
                "timeseries/eits/ftd:BOPGS",
                "International trade balance, goods and services",
                "timeseries/eits/ftd",
                "Monthly",
                "Millions of dollars",
            ),
            SeriesMetadata::new(
                "timeseries/eits/mtis:IM:category_code=TOTBUS",
                "Total business inventories",
                "timeseries/eits/mtis",
                "Monthly",
                "Millions of dollars",
            ),
            SeriesMetadata::new(
                "timeseries/eits/m3:VS:category_code=MTM",
                "Manufacturers' shipments, total manufacturing",
                "timeseries/eits/m3",
                "Monthly",
                "Millions of dollars",
            ),
        ]
    }
}
