use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical identifiers for the statistical agencies this crate ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Census,
    Fred,
    WorldBank,
    Bls,
    Bea,
    Eurostat,
    Imf,
    Ecb,
    Oecd,
    Comtrade,
}

impl SourceId {
    pub const ALL: [Self; 10] = [
        Self::Census,
        Self::Fred,
        Self::WorldBank,
        Self::Bls,
        Self::Bea,
        Self::Eurostat,
        Self::Imf,
        Self::Ecb,
        Self::Oecd,
        Self::Comtrade,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Census => "census",
            Self::Fred => "fred",
            Self::WorldBank => "worldbank",
            Self::Bls => "bls",
            Self::Bea => "bea",
            Self::Eurostat => "eurostat",
            Self::Imf => "imf",
            Self::Ecb => "ecb",
            Self::Oecd => "oecd",
            Self::Comtrade => "comtrade",
        }
    }

    /// Suffix used in `ECONFEED_<SUFFIX>_API_KEY` / `<SUFFIX>_API_KEY`.
    pub const fn env_key(self) -> &'static str {
        match self {
            Self::Census => "CENSUS",
            Self::Fred => "FRED",
            Self::WorldBank => "WORLDBANK",
            Self::Bls => "BLS",
            Self::Bea => "BEA",
            Self::Eurostat => "EUROSTAT",
            Self::Imf => "IMF",
            Self::Ecb => "ECB",
            Self::Oecd => "OECD",
            Self::Comtrade => "COMTRADE",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "census" => Ok(Self::Census),
            "fred" => Ok(Self::Fred),
            "worldbank" | "world_bank" | "wb" => Ok(Self::WorldBank),
            "bls" => Ok(Self::Bls),
            "bea" => Ok(Self::Bea),
            "eurostat" => Ok(Self::Eurostat),
            "imf" => Ok(Self::Imf),
            "ecb" => Ok(Self::Ecb),
            "oecd" => Ok(Self::Oecd),
            "comtrade" => Ok(Self::Comtrade),
            _ => Err(ValidationError::InvalidSource { value: normalized }),
        }
    }
}
