use std::time::Duration;

use crate::SourceId;

/// Quota and authentication defaults for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePolicy {
    pub source: SourceId,
    pub quota_window: Duration,
    /// Requests per window when an API key is configured.
    pub keyed_limit: u32,
    /// Requests per window without an API key.
    pub anonymous_limit: u32,
    /// Whether the provider refuses requests without a key.
    pub key_required: bool,
}

impl SourcePolicy {
    const fn per_minute(
        source: SourceId,
        keyed_limit: u32,
        anonymous_limit: u32,
        key_required: bool,
    ) -> Self {
        Self {
            source,
            quota_window: Duration::from_secs(60),
            keyed_limit,
            anonymous_limit,
            key_required,
        }
    }

    pub const fn default_for(source: SourceId) -> Self {
        match source {
            SourceId::Census => Self::per_minute(source, 50, 10, false),
            SourceId::Fred => Self::per_minute(source, 120, 120, true),
            SourceId::WorldBank => Self::per_minute(source, 60, 60, false),
            SourceId::Bls => Self::per_minute(source, 50, 10, false),
            SourceId::Bea => Self::per_minute(source, 100, 100, true),
            SourceId::Eurostat => Self::per_minute(source, 60, 60, false),
            SourceId::Imf => Self::per_minute(source, 10, 10, false),
            SourceId::Ecb => Self::per_minute(source, 60, 60, false),
            SourceId::Oecd => Self::per_minute(source, 20, 20, false),
            SourceId::Comtrade => Self::per_minute(source, 30, 5, false),
        }
    }

    /// Resolve the per-window limit from key presence and an optional override.
    pub fn effective_limit(&self, has_api_key: bool, override_limit: Option<u32>) -> u32 {
        let limit = match override_limit {
            Some(limit) => limit,
            None if has_api_key => self.keyed_limit,
            None => self.anonymous_limit,
        };
        limit.max(1)
    }
}
