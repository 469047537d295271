//! Eurostat dissemination API (JSON-stat 2.0).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::client::SeriesProvider;
use crate::http_client::HttpRequest;
use crate::parse::{observation, parse_json, parse_value, scalar_text, split_series_id};
use crate::{Observation, SeriesMetadata, SeriesRequest, SourceError, SourceId};

const BASE_URL: &str = "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data";
const SERIES_ID_FORMAT: &str = "dataset:geo[:dim=code,...]";

/// Filters narrow every dimension except `time` to one category; a dimension
/// left unfiltered contributes its first category.
#[derive(Debug, Clone, Copy, Default)]
pub struct Eurostat;

fn filters(raw: &str) -> Result<Vec<(&str, &str)>, SourceError> {
    raw.split(',')
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, code)| (name.trim(), code.trim()))
                .filter(|(name, code)| !name.is_empty() && !code.is_empty())
                .ok_or_else(|| {
                    SourceError::format(format!("filter '{pair}' must have the form dim=code"))
                })
        })
        .collect()
}

fn value_at(values: &Value, index: usize) -> f64 {
    match values {
        Value::Array(items) => items.get(index).map_or(f64::NAN, parse_value),
        Value::Object(map) => map.get(&index.to_string()).map_or(f64::NAN, parse_value),
        _ => f64::NAN,
    }
}

impl SeriesProvider for Eurostat {
    fn id(&self) -> SourceId {
        SourceId::Eurostat
    }

    fn series_id_format(&self) -> &'static str {
        SERIES_ID_FORMAT
    }

    fn build_request(
        &self,
        req: &SeriesRequest,
        _api_key: Option<&str>,
    ) -> Result<HttpRequest, SourceError> {
        let parts = split_series_id(&req.series_id, 2, 3, SERIES_ID_FORMAT)?;
        let mut request = HttpRequest::get(format!("{BASE_URL}/{}", urlencoding::encode(parts[0])))
            .with_query("format", "JSON")
            .with_query("lang", "EN")
            .with_query("geo", parts[1]);

        if let Some(raw) = parts.get(2) {
            for (name, code) in filters(raw)? {
                request = request.with_query(name, code);
            }
        }

        Ok(request
            .with_query("sinceTimePeriod", &req.start.year().to_string())
            .with_query("untilTimePeriod", &req.end.year().to_string()))
    }

    fn detect_error(&self, body: &str) -> Option<String> {
        let root: Value = serde_json::from_str(body).ok()?;
        let error = root.get("error")?;
        let entries = match error {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        };
        let labels: Vec<String> = entries
            .iter()
            .filter_map(|entry| entry.get("label").and_then(scalar_text))
            .collect();
        Some(if labels.is_empty() {
            error.to_string()
        } else {
            labels.join("; ")
        })
    }

    fn parse(&self, series_id: &str, body: &str) -> Result<Vec<Observation>, SourceError> {
        let root = parse_json(body)?;
        let ids: Vec<&str> = root
            .get("id")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::parse("JSON-stat payload has no id array"))?
            .iter()
            .filter_map(Value::as_str)
            .collect();
        let sizes: Vec<usize> = root
            .get("size")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::parse("JSON-stat payload has no size array"))?
            .iter()
            .filter_map(|size| usize::try_from(size.as_u64()?).ok())
            .collect();
        if ids.len() != sizes.len() {
            return Err(SourceError::parse("JSON-stat id and size arrays differ in length"));
        }

        let time_position = ids
            .iter()
            .position(|id| *id == "time")
            .ok_or_else(|| SourceError::parse("JSON-stat payload has no time dimension"))?;
        let stride = sizes[time_position + 1..]
            .iter()
            .try_fold(1_usize, |acc, size| acc.checked_mul(*size))
            .ok_or_else(|| SourceError::parse("JSON-stat dimension sizes overflow"))?;

        let index = root
            .pointer("/dimension/time/category/index")
            .and_then(Value::as_object)
            .ok_or_else(|| SourceError::parse("time dimension has no category index"))?;
        let periods: BTreeMap<usize, &str> = index
            .iter()
            .filter_map(|(label, position)| {
                let position = usize::try_from(position.as_u64()?).ok()?;
                Some((position, label.as_str()))
            })
            .collect();

        let values = root.get("value").unwrap_or(&Value::Null);
        Ok(periods
            .into_iter()
            .filter_map(|(position, label)| {
                // An index past addressable memory cannot name a value.
                let offset = position.checked_mul(stride)?;
                observation(series_id, label, value_at(values, offset))
            })
            .collect())
    }

    fn catalog(&self) -> Vec<SeriesMetadata> {
        vec![
            SeriesMetadata::new(
                "nama_10_gdp:EU27_2020:unit=CP_MEUR,na_item=B1GQ",
                "GDP at market prices, EU27",
                "nama_10_gdp",
                "Annual",
                "Million euro",
            ),
            SeriesMetadata::new(
                "prc_hicp_manr:EA:coicop=CP00",
                "HICP annual rate of change, euro area",
                "prc_hicp_manr",
                "Monthly",
                "Percent",
            ),
            SeriesMetadata::new(
                "une_rt_m:DE:s_adj=SA,age=TOTAL,sex=T,unit=PC_ACT",
                "Unemployment rate, Germany",
                "une_rt_m",
                "Monthly",
                "Percent of active population",
            ),
            SeriesMetadata::new(
                "demo_pjan:FR:age=TOTAL,sex=T",
                "Population on 1 January, France",
                "demo_pjan",
                "Annual",
                "Persons",
            ),
            SeriesMetadata::new(
                "namq_10_gdp:IT:unit=CLV10_MEUR,s_adj=SCA,na_item=B1GQ",
                "Quarterly GDP, chain linked volumes, Italy",
                "namq_10_gdp",
                "Quarterly",
                "Million euro",
            ),
        ]
    }
}
