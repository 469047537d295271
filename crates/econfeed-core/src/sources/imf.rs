//! IMF SDMX-JSON CompactData service.

use serde_json::Value;

use crate::client::SeriesProvider;
use crate::http_client::HttpRequest;
use crate::parse::{observation, parse_json, parse_value, scalar_text, split_series_id};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const BASE_URL: &str = "https://dataservices.imf.org/REST/SDMX_JSON.svc/CompactData";
const SERIES_ID_FORMAT: &str = "dataset:key";

/// `Series` and `Obs` collapse to a bare object when there is exactly one of
/// them, so both shapes are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Imf;

fn one_or_many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

impl SeriesProvider for Imf {
    fn id(&self) -> SourceId {
        SourceId::Imf
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
        Ok(HttpRequest::get(format!(
            "{BASE_URL}/{}/{}",
            urlencoding::encode(parts[0]),
            urlencoding::encode(parts[1])
        ))
        .with_query("startPeriod", &req.start.year().to_string())
        .with_query("endPeriod", &req.end.year().to_string()))
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let root: Value = serde_json::from_str(body).ok()?;
        let details = root.get("ErrorDetails")?;
        let message = details.get("Message").and_then(scalar_text);
        let code = details.get("Code").and_then(scalar_text);
        Some(match (code, message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (None, Some(message)) => message,
            _ => details.to_string(),
        })
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        let root = parse_json(body)?;
        let data_set = root
            .pointer("/CompactData/DataSet")
            .ok_or_else(|| SourceError::parse("IMF payload has no CompactData.DataSet"))?;

        Ok(one_or_many(data_set.get("Series"))
            .into_iter()
            .flat_map(|series| one_or_many(series.get("Obs")))
            .filter_map(|obs| {
                let period = obs.get("@TIME_PERIOD").and_then(scalar_text)?;
                let value = obs.get("@OBS_VALUE").map_or(f64::NAN, parse_value);
                observation(series_id, &period, value)
            })
            .collect())
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "IFS:M.US.PCPI_IX",
                "Consumer prices, all items, United States",
                "IFS",
                "Monthly",
                "Index",
            ),
            SeriesMetadata::new(
                "IFS:Q.GB.NGDP_R_SA_XDC",
                "Real GDP, seasonally adjusted, United Kingdom",
                "IFS",
                "Quarterly",
                "National currency",
            ),
            SeriesMetadata::new(
                "IFS:M.JP.ENDE_XDC_USD_RATE",
                "Exchange rate, national currency per US dollar, Japan",
                "IFS",
                "Monthly",
                "Rate",
            ),
            SeriesMetadata::new(
                "DOT:A.US.TXG_FOB_USD.CN",
                "Goods exports, United States to China",
                "DOT",
                "Annual",
                "US dollars",
            ),
            SeriesMetadata::new(
                "BOP:Q.DE.BCA_BP6_USD",
                "Current account balance, Germany",
                "BOP",
                "Quarterly",
                "US dollars",
            ),
        ]
    }
}
