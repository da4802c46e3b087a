//! Built-in source adapters.
//!
//! These are deterministic offline implementations of the adapter
//! contract: the same query always yields the same payload, derived from
//! a seed over the subject string. They stand in for the real network
//! clients so the registry, selector, and correlator run against real
//! adapter instances.

mod acled;
mod aishub;
mod gdelt;
mod opensanctions;
mod wikidata;

use std::sync::Arc;

pub use acled::AcledAdapter;
pub use aishub::AisHubAdapter;
pub use gdelt::GdeltAdapter;
pub use opensanctions::OpenSanctionsAdapter;
pub use wikidata::WikidataAdapter;

use crate::adapter::SourceAdapter;

/// The full built-in adapter set, one instance per source.
pub fn builtin() -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(GdeltAdapter::new()),
        Arc::new(AcledAdapter::new()),
        Arc::new(OpenSanctionsAdapter::new()),
        Arc::new(WikidataAdapter::new()),
        Arc::new(AisHubAdapter::new()),
    ]
}

pub(crate) fn subject_seed(subject: &str) -> u64 {
    subject
        .trim()
        .to_ascii_lowercase()
        .bytes()
        .fold(0_u64, |acc, byte| {
            acc.wrapping_mul(33).wrapping_add(byte as u64)
        })
}
