use serde::{Serialize, Serializer};
use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// One point of a time series in canonical form.
///
/// `value` is `NaN` when the provider sent an empty or non-numeric value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    #[serde(serialize_with = "iso_date::serialize")]
    pub date: Date,
    #[serde(serialize_with = "serialize_value")]
    pub value: f64,
    pub series_id: String,
}

impl Observation {
    pub fn new(date: Date, value: f64, series_id: impl Into<String>) -> Self {
        Self {
            date,
            value,
            series_id: series_id.into(),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_nan()
    }
}

/// Catalog entry for a series a source is known to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesMetadata {
    pub id: String,
    pub title: String,
    pub dataset: String,
    pub frequency: String,
    pub units: String,
}

impl SeriesMetadata {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        dataset: impl Into<String>,
        frequency: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            dataset: dataset.into(),
            frequency: frequency.into(),
            units: units.into(),
        }
    }

    /// Case-insensitive substring match on id, title and dataset.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        [&self.id, &self.title, &self.dataset]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

fn serialize_value<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}
