//! OpenSanctions identity/sanctions adapter (deterministic offline
//! implementation).

use std::future::Future;
use std::pin::Pin;

use serde_json::json;

use super::subject_seed;
use crate::adapter::{RawResponse, SourceAdapter, SourceFailure};
use crate::{QualityTier, QueryKind, QueryParams, SourceId};

const PROGRAMS: [&str; 4] = ["EU", "OFAC SDN", "UK HMT", "UN 1267"];

#[derive(Debug, Default)]
pub struct OpenSanctionsAdapter;

impl OpenSanctionsAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SourceAdapter for OpenSanctionsAdapter {
    fn id(&self) -> SourceId {
        SourceId::OpenSanctions
    }

    fn quality(&self) -> QualityTier {
        QualityTier::High
    }

    fn fetch<'a>(
        &'a self,
        params: &'a QueryParams,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, SourceFailure>> + Send + 'a>> {
        Box::pin(async move {
            if params.kind() == QueryKind::Topic {
                return Ok(RawResponse::Empty);
            }

            let seed = subject_seed(params.subject());
            let sanctioned = seed % 3 != 0;
            let mut claims = vec![json!({ "fact": "sanctioned", "value": sanctioned })];
            if sanctioned {
                claims.push(json!({ "fact": "listing_count", "value": 1 + seed % 4 }));
                claims.push(json!({
                    "fact": "program",
                    "value": PROGRAMS[(seed % PROGRAMS.len() as u64) as usize]
                }));
            }
            Ok(RawResponse::Data(json!({ "claims": claims })))
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
    async fn entity_queries_report_sanction_status() {
        let adapter = OpenSanctionsAdapter::new();
        let query = QueryParams::entity("Wagner Group").expect("valid");

        let RawResponse::Data(payload) = adapter.fetch(&query).await.expect("fetch") else {
            panic!("expected data");
        };
        assert!(payload["claims"]
            .as_array()
            .expect("claims")
            .iter()
            .any(|c| c["fact"] == "sanctioned"));
    }

    #[tokio::test]
    async fn plain_topics_return_no_data() {
        let adapter = OpenSanctionsAdapter::new();
        let query = QueryParams::topic("grain exports").expect("valid");

        assert_eq!(adapter.fetch(&query).await.expect("fetch"), RawResponse::Empty);
    }
}
