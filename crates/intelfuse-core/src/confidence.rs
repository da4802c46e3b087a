//! Confidence scoring on a six-band analytic ladder.
//!
//! Bands are ordinal; corroboration and conflict move a finding at most
//! one rung in either direction, so a single noisy source can never swing
//! an assessment from one extreme to the other.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::QualityTier;

/// Analytic confidence band, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    Remote,
    VeryUnlikely,
    Unlikely,
    EvenChance,
    Likely,
    AlmostCertain,
}

impl ConfidenceBand {
    pub const ALL: [Self; 6] = [
        Self::Remote,
        Self::VeryUnlikely,
        Self::Unlikely,
        Self::EvenChance,
        Self::Likely,
        Self::AlmostCertain,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::VeryUnlikely => "very_unlikely",
            Self::Unlikely => "unlikely",
            Self::EvenChance => "even_chance",
            Self::Likely => "likely",
            Self::AlmostCertain => "almost_certain",
        }
    }

    /// Numeric midpoint of the band, used when a score must be reported
    /// for a band-first assessment.
    pub const fn midpoint(self) -> f64 {
        match self {
            Self::Remote => 0.05,
            Self::VeryUnlikely => 0.2,
            Self::Unlikely => 0.35,
            Self::EvenChance => 0.5,
            Self::Likely => 0.75,
            Self::AlmostCertain => 0.95,
        }
    }

    /// Band containing a numeric score in `[0, 1]`.
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        if score < 0.1 {
            Self::Remote
        } else if score < 0.25 {
            Self::VeryUnlikely
        } else if score < 0.45 {
            Self::Unlikely
        } else if score < 0.6 {
            Self::EvenChance
        } else if score < 0.85 {
            Self::Likely
        } else {
            Self::AlmostCertain
        }
    }

    /// Starting band for a claim backed by a single source of the given
    /// quality.
    pub const fn base_for(quality: QualityTier) -> Self {
        match quality {
            QualityTier::Low => Self::Unlikely,
            QualityTier::Medium => Self::EvenChance,
            QualityTier::High => Self::Likely,
        }
    }

    /// One rung up, saturating at the top.
    pub fn raised(self) -> Self {
        let index = Self::ALL.iter().position(|band| *band == self).unwrap_or(0);
        Self::ALL[(index + 1).min(Self::ALL.len() - 1)]
    }

    /// One rung down, saturating at the bottom.
    pub fn lowered(self) -> Self {
        let index = Self::ALL.iter().position(|band| *band == self).unwrap_or(0);
        Self::ALL[index.saturating_sub(1)]
    }
}

impl Display for ConfidenceBand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_order_from_remote_to_almost_certain() {
        assert!(ConfidenceBand::Remote < ConfidenceBand::AlmostCertain);
        assert!(ConfidenceBand::EvenChance < ConfidenceBand::Likely);
    }

    #[test]
    fn raise_and_lower_saturate_at_the_rails() {
        assert_eq!(
            ConfidenceBand::AlmostCertain.raised(),
            ConfidenceBand::AlmostCertain
        );
        assert_eq!(ConfidenceBand::Remote.lowered(), ConfidenceBand::Remote);
        assert_eq!(ConfidenceBand::EvenChance.raised(), ConfidenceBand::Likely);
        assert_eq!(
            ConfidenceBand::EvenChance.lowered(),
            ConfidenceBand::Unlikely
        );
    }

    #[test]
    fn from_score_roundtrips_midpoints() {
        for band in ConfidenceBand::ALL {
            assert_eq!(ConfidenceBand::from_score(band.midpoint()), band);
        }
    }

    #[test]
    fn from_score_clamps_out_of_range_input() {
        assert_eq!(ConfidenceBand::from_score(-0.3), ConfidenceBand::Remote);
        assert_eq!(
            ConfidenceBand::from_score(1.7),
            ConfidenceBand::AlmostCertain
        );
    }

    #[test]
    fn base_band_tracks_source_quality() {
        assert!(
            ConfidenceBand::base_for(QualityTier::High)
                > ConfidenceBand::base_for(QualityTier::Low)
        );
    }
}
