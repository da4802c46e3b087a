//! GDELT news/events adapter (deterministic offline implementation).

use std::future::Future;
use std::pin::Pin;

use serde_json::json;

use super::subject_seed;
use crate::adapter::{RawResponse, SourceAdapter, SourceFailure};
use crate::{QualityTier, QueryKind, QueryParams, SourceId};

const THEMES: [&str; 6] = [
    "PROTEST",
    "ARMEDCONFLICT",
    "SANCTIONS",
    "TRADE_DISPUTE",
    "MARITIME_INCIDENT",
    "DIPLOMACY",
];

const PORTS: [&str; 5] = [
    "Bosphorus",
    "Port of Odesa",
    "Suez Canal",
    "Strait of Hormuz",
    "Port of Rotterdam",
];

#[derive(Debug, Default)]
pub struct GdeltAdapter;

impl GdeltAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SourceAdapter for GdeltAdapter {
    fn id(&self) -> SourceId {
        SourceId::Gdelt
    }

    fn quality(&self) -> QualityTier {
        QualityTier::Medium
    }

    fn fetch<'a>(
        &'a self,
        params: &'a QueryParams,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, SourceFailure>> + Send + 'a>> {
        Box::pin(async move {
            let seed = subject_seed(params.subject());
            let payload = match params.kind() {
                // News mentions of vessels carry a last-seen location,
                // which makes this source a useful triangulation target.
                QueryKind::VesselId => json!({
                    "claims": [
                        { "fact": "last_position", "value": PORTS[(seed % PORTS.len() as u64) as usize] },
                        { "fact": "mention_count", "value": 3 + seed % 40 },
                    ]
                }),
                _ => json!({
                    "claims": [
                        { "fact": "event_count", "value": 25 + seed % 400 },
                        { "fact": "top_theme", "value": THEMES[(seed % THEMES.len() as u64) as usize] },
                        { "fact": "avg_tone", "value": -6.0 + (seed % 120) as f64 / 10.0 },
                    ]
                }),
            };
            Ok(RawResponse::Data(payload))
        })
    }

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async { true })
    }
}
