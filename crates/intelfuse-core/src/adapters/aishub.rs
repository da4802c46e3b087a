//! AISHub vessel-tracking adapter (deterministic offline implementation).
//!
//! Only a small set of vessel identifiers is covered; anything else comes
//! back as a valid empty result, which is what drives the correlator's
//! triangulation path.

use std::future::Future;
use std::pin::Pin;

use serde_json::json;

use super::subject_seed;
use crate::adapter::{RawResponse, SourceAdapter, SourceFailure};
use crate::{QualityTier, QueryKind, QueryParams, SourceId};

const KNOWN_VESSELS: [(&str, &str); 3] = [
    ("9074729", "Bosphorus"),
    ("9811000", "Port of Rotterdam"),
    ("9336737", "Strait of Hormuz"),
];

#[derive(Debug, Default)]
pub struct AisHubAdapter;

impl AisHubAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SourceAdapter for AisHubAdapter {
    fn id(&self) -> SourceId {
        SourceId::AisHub
    }

    fn quality(&self) -> QualityTier {
        QualityTier::Low
    }

    fn fetch<'a>(
        &'a self,
        params: &'a QueryParams,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, SourceFailure>> + Send + 'a>> {
        Box::pin(async move {
            if params.kind() != QueryKind::VesselId {
                return Ok(RawResponse::Empty);
            }

            let digits: String = params
                .subject()
                .chars()
                .filter(char::is_ascii_digit)
                .collect();
            let Some((_, position)) = KNOWN_VESSELS.iter().find(|(imo, _)| *imo == digits) else {
                return Ok(RawResponse::Empty);
            };

            let seed = subject_seed(params.subject());
            Ok(RawResponse::Data(json!({
                "claims": [
                    { "fact": "last_position", "value": position },
                    { "fact": "speed_knots", "value": (seed % 180) as f64 / 10.0 },
                    { "fact": "under_way", "value": seed % 4 != 0 },
                ]
            })))
        })
    }

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async { true })
    }
}
