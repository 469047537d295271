//! SDMX-JSON data providers: ECB (1.0 messages) and OECD (2.0 messages).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::client::SeriesProvider;
use crate::domain::format_date;
use crate::http_client::HttpRequest;
use crate::parse::{observation, parse_json, parse_value, scalar_text, split_series_id};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const ECB_BASE_URL: &str = "https://data-api.ecb.europa.eu/service/data";
const ECB_SERIES_ID_FORMAT: &str = "flow:key";
const OECD_BASE_URL: &str = "https://sdmx.oecd.org/public/rest/data";
const OECD_SERIES_ID_FORMAT: &str = "dataflow:key";

/// Parse an SDMX-JSON data message with series-level grouping.
///
/// The message may sit at the root (1.0) or under `data` (2.0); the structure
/// may be `structure` or the first of `structures`. Observation keys index
/// into the first observation dimension's values.
fn parse_sdmx_json(series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
    let root = parse_json(body)?;
    let message = root.get("data").unwrap_or(&root);

    let data_sets = message
        .get("dataSets")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::parse("SDMX-JSON message has no dataSets"))?;
    let Some(series) = data_sets.first().and_then(|set| set.get("series")) else {
        return Ok(Vec::new());
    };
    let series = series
        .as_object()
        .ok_or_else(|| SourceError::parse("dataSets[0].series is not an object"))?;

    let structure = message
        .get("structure")
        .or_else(|| message.get("structures").and_then(|items| items.get(0)))
        .ok_or_else(|| SourceError::parse("SDMX-JSON message has no structure"))?;
    let periods: Vec<String> = structure
        .pointer("/dimensions/observation/0/values")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::parse("structure has no observation dimension"))?
        .iter()
        .map(|value| value.get("id").and_then(scalar_text).unwrap_or_default())
        .collect();

    let mut observations = Vec::new();
    for entry in series.values() {
        let Some(points) = entry.get("observations").and_then(Value::as_object) else {
            continue;
        };
        let ordered: BTreeMap<usize, &Value> = points
            .iter()
            .filter_map(|(position, point)| Some((position.parse().ok()?, point)))
            .collect();

        observations.extend(ordered.into_iter().filter_map(|(position, point)| {
            let period = periods.get(position)?;
            let value = point.get(0).map_or(f64::NAN, parse_value);
            observation(series_id, period, value)
        }));
    }
    Ok(observations)
}

fn sdmx_request(
    base_url: &str,
    series_id: &str,
    format: &'static str,
    start: String,
    end: String,
) -> Result<HttpRequest, SourceError> {
    let parts = split_series_id(series_id, 2, 2, format)?;
    Ok(HttpRequest::get(format!(
        "{base_url}/{}/{}",
        urlencoding::encode(parts[0]),
        urlencoding::encode(parts[1])
    ))
    .with_query("format", "jsondata")
    .with_query("startPeriod", &start)
    .with_query("endPeriod", &end))
}

/// European Central Bank data portal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ecb;

impl SeriesProvider for Ecb {
    fn id(&self) -> SourceId {
        SourceId::Ecb
    }

    fn series_id_format(&self) -> &'static str {
        ECB_SERIES_ID_FORMAT
    }

    fn build_request(
        &self,
        req: &SeriesRequest,
        _api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError> {
        sdmx_request(
            ECB_BASE_URL,
            &req.series_id,
            ECB_SERIES_ID_FORMAT,
            format_date(req.start),
            format_date(req.end),
        )
        .map(|request| request.with_header("accept", "application/json"))
    }

    // ECB reports failures through HTTP status codes only.
    fn detect_error(&self, _body: &str) -> Option<String> {
        None
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        parse_sdmx_json(series_id, body)
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "EXR:D.USD.EUR.SP00.A",
                "US dollar/euro reference exchange rate",
                "EXR",
                "Daily",
                "US dollar per euro",
            ),
            SeriesMetadata::new(
                "ICP:M.U2.N.000000.4.ANR",
                "HICP overall index, euro area, annual rate of change",
                "ICP",
                "Monthly",
                "Percent",
            ),
            SeriesMetadata::new(
                "FM:B.U2.EUR.4F.KR.MRR_FR.LEV",
                "Main refinancing operations rate",
                "FM",
                "Business",
                "Percent per annum",
            ),
            SeriesMetadata::new(
                "BSI:M.U2.Y.V.M30.X.1.U2.2300.Z01.E",
                "Monetary aggregate M3, euro area",
                "BSI",
                "Monthly",
                "Millions of euro",
            ),
        ]
    }
}

/// OECD SDMX data explorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Oecd;

impl SeriesProvider for Oecd {
    fn id(&self) -> SourceId {
        SourceId::Oecd
    }

    fn series_id_format(&self) -> &'static str {
        OECD_SERIES_ID_FORMAT
    }

    fn build_request(
        &self,
        req: &SeriesRequest,
        _api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError> {
        sdmx_request(
            OECD_BASE_URL,
            &req.series_id,
            OECD_SERIES_ID_FORMAT,
            req.start.year().to_string(),
            req.end.year().to_string(),
        )
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let root: Value = serde_json::from_str(body).ok()?;
        let errors = root.get("errors")?.as_array()?;
        if errors.is_empty() {
            return None;
        }
        let text: Vec<String> = errors
            .iter()
            .map(|error| {
                ["detail", "title", "message"]
                    .iter()
                    .find_map(|field| error.get(field).and_then(scalar_text))
                    .unwrap_or_else(|| error.to_string())
            })
            .collect();
        Some(text.join("; "))
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        parse_sdmx_json(series_id, body)
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "OECD.SDD.STES,DSD_STES@DF_CLI,4.1:USA.M.LI...AA...H",
                "Composite leading indicator, United States",
                "DF_CLI",
                "Monthly",
                "Index",
            ),
            SeriesMetadata::new(
                "OECD.SDD.NAD,DSD_NAMAIN1@DF_QNA,1.0:Q.Y.USA.S1..B1GQ._Z...USD_PPP.LR.LA.T0102",
                "Quarterly GDP growth, United States",
                "DF_QNA",
                "Quarterly",
                "Percent",
            ),
            SeriesMetadata::new(
                "OECD.SDD.TPS,DSD_LFS@DF_IALFS_UNE_M,1.0:USA..._Z.Y._T.Y_GE15..M",
                "Monthly unemployment rate, United States",
                "DF_IALFS_UNE_M",
                "Monthly",
                "Percent of labour force",
            ),
        ]
    }
}
