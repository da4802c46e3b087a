//! Wikidata canonical-identifier directory adapter (deterministic offline
//! implementation). Backs the resolver's canonical-lookup tier.

use std::future::Future;
use std::pin::Pin;

use serde_json::json;

use crate::adapter::{RawResponse, SourceAdapter, SourceFailure};
use crate::{QualityTier, QueryParams, SourceId};

struct DirectoryEntry {
    name: &'static str,
    canonical_id: &'static str,
    aliases: &'static [&'static str],
}

const DIRECTORY: [DirectoryEntry; 6] = [
    DirectoryEntry {
        name: "Vladimir Putin",
        canonical_id: "Q7747",
        aliases: &["Vladimir Vladimirovich Putin", "Wladimir Putin"],
    },
    DirectoryEntry {
        name: "Alexei Navalny",
        canonical_id: "Q396",
        aliases: &["Aleksei Navalny", "Alexey Navalny"],
    },
    DirectoryEntry {
        name: "Roman Abramovich",
        canonical_id: "Q184725",
        aliases: &["Roman Arkadyevich Abramovich"],
    },
    DirectoryEntry {
        name: "Viktor Bout",
        canonical_id: "Q312806",
        aliases: &["Victor Bout", "Viktor Anatolyevich Bout"],
    },
    DirectoryEntry {
        name: "Wagner Group",
        canonical_id: "Q63189584",
        aliases: &["PMC Wagner", "Wagner PMC"],
    },
    DirectoryEntry {
        name: "Nord Stream AG",
        canonical_id: "Q1998606",
        aliases: &["Nord Stream"],
    },
];

#[derive(Debug, Default)]
pub struct WikidataAdapter;

impl WikidataAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SourceAdapter for WikidataAdapter {
    fn id(&self) -> SourceId {
        SourceId::Wikidata
    }

    fn quality(&self) -> QualityTier {
        QualityTier::Medium
    }

    fn fetch<'a>(
        &'a self,
        params: &'a QueryParams,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, SourceFailure>> + Send + 'a>> {
        Box::pin(async move {
            let subject = params.subject().trim().to_lowercase();
            let matches: Vec<&DirectoryEntry> = DIRECTORY
                .iter()
                .filter(|entry| {
                    entry.name.to_lowercase() == subject
                        || entry
                            .aliases
                            .iter()
                            .any(|alias| alias.to_lowercase() == subject)
                })
                .collect();

            if matches.is_empty() {
                return Ok(RawResponse::Empty);
            }

            let records: Vec<_> = matches
                .iter()
                .map(|entry| {
                    json!({
                        "name": entry.name,
                        "canonical_id": entry.canonical_id,
                        "aliases": entry.aliases,
                    })
                })
                .collect();
            let claims: Vec<_> = matches
                .iter()
                .map(|entry| json!({ "fact": "canonical_id", "value": entry.canonical_id }))
                .collect();

            Ok(RawResponse::Data(json!({
                "records": records,
                "claims": claims,
            })))
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
    async fn known_alias_resolves_to_a_directory_record() {
        let adapter = WikidataAdapter::new();
        let query = QueryParams::entity("Aleksei Navalny").expect("valid");

        let RawResponse::Data(payload) = adapter.fetch(&query).await.expect("fetch") else {
            panic!("expected data");
        };
        assert_eq!(payload["records"][0]["canonical_id"], "Q396");
    }

    #[tokio::test]
    async fn unknown_entity_returns_no_data() {
        let adapter = WikidataAdapter::new();
        let query = QueryParams::entity("Unknown Person").expect("valid");

        assert_eq!(adapter.fetch(&query).await.expect("fetch"), RawResponse::Empty);
    }
}
