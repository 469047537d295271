use std::fmt::{Display, Formatter};

use econfeed_core::{Freshness, SourceError, SourceId};
use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Request identifier (UUID v4) stamped on every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Command metadata written ahead of the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: RequestId,
    pub generated_at: String,
    pub latency_ms: u64,
    /// Set by `fetch`; absent for commands that never touch the network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Freshness>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnvelopeMeta {
    pub fn new(latency_ms: u64, freshness: Option<Freshness>) -> Self {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"));
        Self {
            request_id: RequestId::new_v4(),
            generated_at,
            latency_ms,
            freshness,
            warnings: Vec::new(),
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// A failed source operation as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
}

impl From<&SourceError> for EnvelopeError {
    fn from(error: &SourceError) -> Self {
        Self {
            code: error.code().to_owned(),
            message: error.message().to_owned(),
            retryable: error.retryable(),
            source: error.source_id(),
            series_id: error.series_id().map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub data: Value,
    pub errors: Vec<EnvelopeError>,
}
