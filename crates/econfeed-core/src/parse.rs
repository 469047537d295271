//! Parsing rules shared by the source implementations.

use serde_json::Value;

use crate::domain::parse_period;
use crate::{Observation, SourceError};

/// Split a colon-delimited series id into `min..=max` non-empty parts.
///
/// `format` is the human-readable shape quoted in the error message.
pub fn split_series_id<'a>(
    series_id: &'a str,
    min: usize,
    max: usize,
    format: &str,
) -> Result<Vec<&'a str>, SourceError> {
    let parts: Vec<&str> = series_id.split(':').map(str::trim).collect();
    if parts.len() < min || parts.len() > max || parts.iter().any(|part| part.is_empty()) {
        return Err(SourceError::format(format!(
            "series id '{series_id}' must have the form {format}"
        )));
    }
    Ok(parts)
}

pub fn parse_json(body: &str) -> Result<Value, SourceError> {
    serde_json::from_str(body)
        .map_err(|error| SourceError::parse(format!("response is not valid JSON: {error}")))
}

/// Numeric value of a string field. Anything unparseable is `NaN`.
///
/// Surrounding whitespace and thousands separators are ignored.
pub fn parse_value_str(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|ch| *ch != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => f64::NAN,
    }
}

/// Numeric value of a JSON field: numbers pass through, strings are parsed,
/// everything else is `NaN`.
pub fn parse_value(raw: &Value) -> f64 {
    match raw {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => parse_value_str(text),
        _ => f64::NAN,
    }
}

/// Text form of a JSON scalar (periods arrive as strings or bare numbers).
pub fn scalar_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Build an observation, skipping rows whose period cannot be read.
pub fn observation(series_id: &str, period: &str, value: f64) -> Option<Observation> {
    match parse_period(period) {
        Some(date) => Some(Observation::new(date, value, series_id)),
        None => {
            tracing::debug!(series_id, period, "skipping row with unreadable period");
            None
        }
    }
}

/// Parse header-plus-rows JSON: the first row names the columns and every
/// later row holds positional values. Columns are picked by index.
pub fn tabular_rows(
    root: &Value,
    series_id: &str,
    value_column: usize,
    time_column: usize,
) -> Result<Vec<Observation>, SourceError> {
    let rows = root
        .as_array()
        .ok_or_else(|| SourceError::parse("expected a JSON array of rows"))?;
    let Some((header, data)) = rows.split_first() else {
        return Err(SourceError::parse("response has no header row"));
    };
    let width = header
        .as_array()
        .map(Vec::len)
        .ok_or_else(|| SourceError::parse("header row is not an array"))?;
    if value_column >= width || time_column >= width {
        return Err(SourceError::parse(format!(
            "header has {width} columns; expected at least {}",
            value_column.max(time_column) + 1
        )));
    }

    Ok(data
        .iter()
        .filter_map(Value::as_array)
        .filter_map(|row| {
            let period = row.get(time_column).and_then(scalar_text)?;
            let value = row.get(value_column).map_or(f64::NAN, parse_value);
            observation(series_id, &period, value)
        })
        .collect())
}
