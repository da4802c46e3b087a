//! Source selection: static per-domain affinity crossed with current
//! availability.

use std::sync::Arc;

use serde::Serialize;

use crate::gateway::AdapterGateway;
use crate::{QueryKind, QueryParams, SourceId};

/// Minimum relevance for a source to be offered to the correlator.
const RELEVANCE_FLOOR: f64 = 0.2;

/// One ranked selection entry.
///
/// Relevant-but-unavailable sources are kept with `available = false` so
/// the correlator can report them as unreachable instead of silently
/// dropping them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCandidate {
    pub source: SourceId,
    pub relevance: f64,
    pub available: bool,
}

/// Ranks sources for a query against the gateway's registry.
pub struct SourceSelector {
    gateway: Arc<AdapterGateway>,
}

impl SourceSelector {
    pub fn new(gateway: Arc<AdapterGateway>) -> Self {
        Self { gateway }
    }

    /// Ordered candidates for `query`: highest relevance first, source id
    /// as the deterministic tie-break. Sources below the relevance floor
    /// or excluded by the query's filters are omitted.
    pub fn select(&self, query: &QueryParams) -> Vec<SourceCandidate> {
        let mut candidates: Vec<SourceCandidate> = SourceId::ALL
            .iter()
            .copied()
            .filter(|source| query.permits(*source))
            .filter_map(|source| {
                let relevance = affinity(query.kind(), source);
                if relevance < RELEVANCE_FLOOR {
                    return None;
                }
                Some(SourceCandidate {
                    source,
                    relevance,
                    available: self.is_available(source),
                })
            })
            .collect();

        sort_candidates(&mut candidates);
        candidates
    }

    /// Candidates for triangulation: permitted, available sources with any
    /// affinity at all that were not part of the original selection. The
    /// relevance floor is deliberately not applied here.
    pub fn triangulation_candidates(
        &self,
        query: &QueryParams,
        already_consulted: &[SourceId],
    ) -> Vec<SourceCandidate> {
        let mut candidates: Vec<SourceCandidate> = SourceId::ALL
            .iter()
            .copied()
            .filter(|source| query.permits(*source))
            .filter(|source| !already_consulted.contains(source))
            .filter(|source| self.is_available(*source))
            .filter_map(|source| {
                let relevance = affinity(query.kind(), source);
                if relevance <= 0.0 {
                    return None;
                }
                Some(SourceCandidate {
                    source,
                    relevance,
                    available: true,
                })
            })
            .collect();

        sort_candidates(&mut candidates);
        candidates
    }

    /// Configured and not known to be failing its health probe. A source
    /// never probed counts as available.
    fn is_available(&self, source: SourceId) -> bool {
        if !self.gateway.is_configured(source) {
            return false;
        }
        self.gateway
            .source_status(Some(source))
            .first()
            .map(|status| status.healthy != Some(false))
            .unwrap_or(false)
    }
}

fn sort_candidates(candidates: &mut [SourceCandidate]) {
    candidates.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source.cmp(&b.source))
    });
}

/// Static affinity of each source for each query shape.
fn affinity(kind: QueryKind, source: SourceId) -> f64 {
    match kind {
        QueryKind::Topic => match source {
            SourceId::Gdelt => 0.9,
            SourceId::Acled => 0.7,
            SourceId::Wikidata => 0.3,
            SourceId::OpenSanctions => 0.1,
            SourceId::AisHub => 0.0,
        },
        QueryKind::Entity => match source {
            SourceId::OpenSanctions => 0.9,
            SourceId::Wikidata => 0.8,
            SourceId::Gdelt => 0.6,
            SourceId::Acled => 0.4,
            SourceId::AisHub => 0.05,
        },
        // Only the tracker clears the floor; the rest are reachable via
        // triangulation when the tracker comes up empty.
        QueryKind::VesselId => match source {
            SourceId::AisHub => 0.95,
            SourceId::Gdelt => 0.15,
            SourceId::OpenSanctions => 0.1,
            SourceId::Wikidata => 0.05,
            SourceId::Acled => 0.0,
        },
        QueryKind::AircraftId => match source {
            SourceId::Gdelt => 0.4,
            SourceId::OpenSanctions => 0.3,
            SourceId::Wikidata => 0.25,
            SourceId::Acled | SourceId::AisHub => 0.0,
        },
    }
}
