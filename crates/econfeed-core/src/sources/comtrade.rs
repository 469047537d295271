//! UN Comtrade trade statistics API.

use serde_json::Value;
use time::{Date, Month};

use crate::client::SeriesProvider;
use crate::http_client::{HttpAuth, HttpRequest};
use crate::parse::{observation, parse_json, parse_value, scalar_text, split_series_id};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const DATA_URL: &str = "https://comtradeapi.un.org/data/v1/get/C/M/HS";
const PREVIEW_URL: &str = "https://comtradeapi.un.org/public/v1/preview/C/M/HS";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const SERIES_ID_FORMAT: &str = "reporter:partner:flow[:commodity]";
const DEFAULT_COMMODITY: &str = "TOTAL";

/// Monthly goods trade. Requests with a subscription key use the full data
/// endpoint; anonymous requests fall back to the public preview endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comtrade;

/// Every month from `start` to `end` as `YYYYMM`.
fn month_periods(start: Date, end: Date) -> Vec<String> {
    let mut periods = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    while (year, u8::from(month)) <= (end.year(), u8::from(end.month())) {
        periods.push(format!("{year:04}{:02}", u8::from(month)));
        if month == Month::December {
            year += 1;
        }
        month = month.next();
    }
    periods
}

fn numeric_code<'a>(value: &'a str, role: &str) -> Result<&'a str, SourceError> {
    if value.bytes().all(|byte| byte.is_ascii_digit()) {
        Ok(value)
    } else {
        Err(SourceError::format(format!(
            "{role} '{value}' must be a numeric M49 country code"
        )))
    }
}

impl SeriesProvider for Comtrade {
    fn id(&self) -> SourceId {
        SourceId::Comtrade
    }

    fn series_id_format(&self) -> &'static str {
        SERIES_ID_FORMAT
    }

    fn build_request(
        &self,
        req: &SeriesRequest,
        api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError> {
        let parts = split_series_id(&req.series_id, 3, 4, SERIES_ID_FORMAT)?;
        let reporter = numeric_code(parts[0], "reporter")?;
        let partner = numeric_code(parts[1], "partner")?;
        let flow = parts[2].to_ascii_uppercase();
        let commodity = parts.get(3).copied().unwrap_or(DEFAULT_COMMODITY);

        let base_url = if api_key.is_some() { DATA_URL } else { PREVIEW_URL };
        let request = HttpRequest::get(base_url)
            .with_query("reporterCode", reporter)
            .with_query("partnerCode", partner)
            .with_query("flowCode", &flow)
            .with_query("cmdCode", commodity)
            .with_query("period", &month_periods(req.start, req.end).join(","));

        Ok(match api_key {
            Some(key) => request.with_auth(&HttpAuth::Header {
                name: String::from(KEY_HEADER),
                value: key.to_owned(),
            }),
            None => request,
        })
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let root: Value = serde_json::from_str(body).ok()?;
        if let Some(error) = root
            .get("error")
            .and_then(scalar_text)
            .filter(|error| !error.trim().is_empty())
        {
            return Some(error);
        }

        let status = root.get("statusCode").and_then(Value::as_u64)?;
        (status >= 400).then(|| {
            root.get("message").and_then(scalar_text).map_or_else(
                || format!("status code {status}"),
                |message| format!("{status}: {message}"),
            )
        })
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        let root = parse_json(body)?;
        let rows = match root.get("data") {
            Some(Value::Array(rows)) => rows,
            Some(Value::Null) => return Ok(Vec::new()),
            _ => return Err(SourceError::parse("Comtrade payload has no data array")),
        };

        Ok(rows
            .iter()
            .filter_map(|row| {
                let period = row.get("period").and_then(scalar_text)?;
                let value = row.get("primaryValue").map_or(f64::NAN, parse_value);
                observation(series_id, &period, value)
            })
            .collect())
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "842:156:M",
                "United States imports from China, all commodities",
                "HS",
                "Monthly",
                "US dollars",
            ),
            SeriesMetadata::new(
                "842:0:X",
                "United States exports to the world, all commodities",
                "HS",
                "Monthly",
                "US dollars",
            ),
            SeriesMetadata::new(
                "276:0:X:87",
                "Germany exports of vehicles to the world",
                "HS",
                "Monthly",
                "US dollars",
            ),
            SeriesMetadata::new(
                "156:0:M:27",
                "China imports of mineral fuels from the world",
                "HS",
                "Monthly",
                "US dollars",
            ),
        ]
    }
}
