use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical source identifiers used in results and skip reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Gdelt,
    Acled,
    OpenSanctions,
    Wikidata,
    AisHub,
}

impl SourceId {
    pub const ALL: [Self; 5] = [
        Self::Gdelt,
        Self::Acled,
        Self::OpenSanctions,
        Self::Wikidata,
        Self::AisHub,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gdelt => "gdelt",
            Self::Acled => "acled",
            Self::OpenSanctions => "opensanctions",
            Self::Wikidata => "wikidata",
            Self::AisHub => "aishub",
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
        match value.trim().to_ascii_lowercase().as_str() {
            "gdelt" => Ok(Self::Gdelt),
            "acled" => Ok(Self::Acled),
            "opensanctions" => Ok(Self::OpenSanctions),
            "wikidata" => Ok(Self::Wikidata),
            "aishub" => Ok(Self::AisHub),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}

/// Quality tier assigned to a source's payloads.
///
/// Drives the base confidence of findings built from that source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl Display for QualityTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
