//! ACLED conflict-event adapter (deterministic offline implementation).

use std::future::Future;
use std::pin::Pin;

use serde_json::json;

use super::subject_seed;
use crate::adapter::{RawResponse, SourceAdapter, SourceFailure};
use crate::{QualityTier, QueryKind, QueryParams, SourceId};

const EVENT_TYPES: [&str; 5] = [
    "Battles",
    "Explosions/Remote violence",
    "Violence against civilians",
    "Protests",
    "Riots",
];

const REGIONS: [&str; 5] = ["Kharkiv", "Sahel", "Donbas", "Tigray", "Rakhine"];

#[derive(Debug, Default)]
pub struct AcledAdapter;

impl AcledAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SourceAdapter for AcledAdapter {
    fn id(&self) -> SourceId {
        SourceId::Acled
    }

    fn quality(&self) -> QualityTier {
        QualityTier::High
    }

    fn fetch<'a>(
        &'a self,
        params: &'a QueryParams,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, SourceFailure>> + Send + 'a>> {
        Box::pin(async move {
            // Conflict data covers topics and named entities only.
            if matches!(params.kind(), QueryKind::VesselId | QueryKind::AircraftId) {
                return Ok(RawResponse::Empty);
            }

            let seed = subject_seed(params.subject());
            let payload = json!({
                "claims": [
                    { "fact": "event_count", "value": 5 + seed % 90 },
                    { "fact": "fatalities", "value": seed % 250 },
                    { "fact": "event_type", "value": EVENT_TYPES[(seed % EVENT_TYPES.len() as u64) as usize] },
                    { "fact": "region", "value": REGIONS[(seed % REGIONS.len() as u64) as usize] },
                ]
            });
            Ok(RawResponse::Data(payload))
        })
    }

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async { true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topic_queries_report_conflict_claims() {
        let adapter = AcledAdapter::new();
        let query = QueryParams::topic("border clashes").expect("valid");

        let RawResponse::Data(payload) = adapter.fetch(&query).await.expect("fetch") else {
            panic!("expected data");
        };
        assert!(payload["claims"]
            .as_array()
            .expect("claims")
            .iter()
            .any(|c| c["fact"] == "fatalities"));
    }

    #[tokio::test]
    async fn vessel_queries_return_no_data() {
        let adapter = AcledAdapter::new();
        let query = QueryParams::vessel("IMO 9074729").expect("valid");

        assert_eq!(adapter.fetch(&query).await.expect("fetch"), RawResponse::Empty);
    }
}
