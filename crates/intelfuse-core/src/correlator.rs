//! Fan-out, claim correlation, and confidence scoring.
//!
//! A query fans out to the top ranked available sources under an overall
//! deadline and a concurrency cap. Results are grouped by claim; agreeing
//! sources form a corroboration set, disagreeing sources a conflict set
//! with both values retained verbatim. A primary source answering
//! `NoData` triggers triangulation through originally unselected
//! candidates. Individual source failures are contained and reported in
//! `sources_skipped`; the aggregate itself fails only when no source is
//! available at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::confidence::ConfidenceBand;
use crate::gateway::AdapterGateway;
use crate::resolver::EntityMatch;
use crate::selector::SourceSelector;
use crate::{CoreError, QualityTier, QueryParams, SourceId, ValidationError};

/// Per-fact-type equivalence tolerance for numeric claims.
///
/// Two numeric values within the fact type's tolerance corroborate; two
/// values outside it conflict. Non-numeric values compare by equality.
#[derive(Debug, Clone, Default)]
pub struct ClaimTolerance {
    per_fact: HashMap<String, f64>,
    fallback: f64,
}

impl ClaimTolerance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, tolerance: f64) -> Result<Self, ValidationError> {
        if tolerance < 0.0 {
            return Err(ValidationError::NegativeTolerance { value: tolerance });
        }
        self.fallback = tolerance;
        Ok(self)
    }

    pub fn with_fact(
        mut self,
        fact_type: impl Into<String>,
        tolerance: f64,
    ) -> Result<Self, ValidationError> {
        if tolerance < 0.0 {
            return Err(ValidationError::NegativeTolerance { value: tolerance });
        }
        self.per_fact.insert(fact_type.into(), tolerance);
        Ok(self)
    }

    fn tolerance_for(&self, fact_type: &str) -> f64 {
        self.per_fact.get(fact_type).copied().unwrap_or(self.fallback)
    }

    /// Whether two reported values count as the same claim value.
    pub fn equivalent(&self, fact_type: &str, a: &Value, b: &Value) -> bool {
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= self.tolerance_for(fact_type),
            _ => a == b,
        }
    }
}

/// One source's reported value inside a finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportedValue {
    pub source: SourceId,
    pub value: Value,
    pub quality: QualityTier,
    pub triangulated: bool,
}

/// One correlated claim across sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedFinding {
    pub fact_type: String,
    pub values: Vec<ReportedValue>,
    /// Sources in the largest agreement group, when that group has at
    /// least two members.
    pub corroboration: Vec<SourceId>,
    /// All sources involved in a disagreement. Conflicting values are
    /// retained verbatim and never auto-resolved.
    pub conflict: Vec<SourceId>,
    pub band: ConfidenceBand,
    pub confidence: f64,
    pub triangulated: bool,
}

/// A source that did not contribute, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSource {
    pub source: SourceId,
    pub reason: String,
}

/// Final aggregate returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResult {
    pub request_id: Uuid,
    pub subject: String,
    /// Resolution attribution for entity queries, filled in by the
    /// service facade.
    pub entity: Option<EntityMatch>,
    pub findings: Vec<AggregatedFinding>,
    pub overall_band: ConfidenceBand,
    pub overall_confidence: f64,
    pub sources_consulted: Vec<SourceId>,
    pub sources_skipped: Vec<SkippedSource>,
    /// Fewer sources contributed than the minimum viable count.
    pub degraded: bool,
    /// At least one contribution came from triangulation.
    pub triangulated: bool,
    pub latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Top-K available candidates to fan out to.
    pub max_fanout: usize,
    pub max_concurrency: usize,
    pub query_deadline: Duration,
    /// Bounded cleanup window after the deadline fires.
    pub deadline_grace: Duration,
    /// How many triangulation candidates to try on primary `NoData`.
    pub max_triangulation: usize,
    /// Below this many contributors the result is flagged degraded.
    pub min_viable_sources: usize,
    pub tolerance: ClaimTolerance,
    /// Ask the gateway for expired cache entries when a live fetch fails.
    pub allow_stale_fallback: bool,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_fanout: 3,
            max_concurrency: 4,
            query_deadline: Duration::from_secs(10),
            deadline_grace: Duration::from_millis(250),
            max_triangulation: 2,
            min_viable_sources: 2,
            tolerance: ClaimTolerance::new(),
            allow_stale_fallback: true,
        }
    }
}

/// Confidence cap applied to triangulated contributions.
const TRIANGULATED_CAP: f64 = 0.6;

pub struct Correlator {
    gateway: Arc<AdapterGateway>,
    selector: SourceSelector,
    config: CorrelatorConfig,
}

struct Contribution {
    source: SourceId,
    quality: QualityTier,
    payload: Value,
    triangulated: bool,
}

impl Correlator {
    pub fn new(gateway: Arc<AdapterGateway>) -> Self {
        let selector = SourceSelector::new(Arc::clone(&gateway));
        Self {
            gateway,
            selector,
            config: CorrelatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CorrelatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    /// Run one query end to end.
    pub async fn aggregate(&self, query: &QueryParams) -> Result<AggregatedResult, CoreError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        let candidates = self.selector.select(query);
        let mut skipped: Vec<SkippedSource> = candidates
            .iter()
            .filter(|candidate| !candidate.available)
            .map(|candidate| SkippedSource {
                source: candidate.source,
                reason: String::from("unavailable"),
            })
            .collect();

        let selected: Vec<SourceId> = candidates
            .iter()
            .filter(|candidate| candidate.available)
            .take(self.config.max_fanout)
            .map(|candidate| candidate.source)
            .collect();

        if selected.is_empty() {
            return Err(CoreError::NoAvailableSources {
                query: query.subject().to_owned(),
            });
        }
        let primary = selected[0];

        debug!(%request_id, subject = query.subject(), ?selected, "fanning out");
        let (results, deadline_skipped) = self.fan_out(query, &selected).await;
        skipped.extend(deadline_skipped);

        let mut consulted = selected.clone();
        let mut contributions = Vec::new();
        let mut primary_no_data = false;

        for (source, result) in results {
            if result.is_success() {
                contributions.push(Contribution {
                    source,
                    quality: result.quality,
                    payload: result.payload,
                    triangulated: false,
                });
            } else if result.is_no_data() {
                if source == primary {
                    primary_no_data = true;
                }
            } else {
                skipped.push(SkippedSource {
                    source,
                    reason: result.status.reason(),
                });
            }
        }

        if primary_no_data {
            self.triangulate(query, &mut consulted, &mut contributions, &mut skipped)
                .await;
        }

        let triangulated = contributions.iter().any(|c| c.triangulated);
        let findings = self.correlate(&contributions);
        let (overall_band, overall_confidence) =
            overall_confidence(&contributions, &findings, triangulated);

        let degraded = contributions.len() < self.config.min_viable_sources;
        skipped.sort_by_key(|entry| entry.source);
        skipped.dedup();

        let latency_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
        info!(
            %request_id,
            findings = findings.len(),
            contributors = contributions.len(),
            skipped = skipped.len(),
            degraded,
            triangulated,
            latency_ms,
            "aggregate complete"
        );

        Ok(AggregatedResult {
            request_id,
            subject: query.subject().to_owned(),
            entity: None,
            findings,
            overall_band,
            overall_confidence,
            sources_consulted: consulted,
            sources_skipped: skipped,
            degraded,
            triangulated,
            latency_ms,
        })
    }

    /// Concurrent gateway calls bounded by the concurrency cap and the
    /// overall deadline. Sources still outstanding when the deadline
    /// fires are aborted and reported as skipped.
    async fn fan_out(
        &self,
        query: &QueryParams,
        selected: &[SourceId],
    ) -> (Vec<(SourceId, crate::adapter::SourceResult)>, Vec<SkippedSource>) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for source in selected.iter().copied() {
            let gateway = Arc::clone(&self.gateway);
            let query = query.clone();
            let semaphore = Arc::clone(&semaphore);
            let allow_stale = self.config.allow_stale_fallback;
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("fan-out semaphore is never closed");
                let result = gateway.query_opts(source, &query, allow_stale).await;
                (source, result)
            });
        }

        let deadline = tokio::time::Instant::now() + self.config.query_deadline;
        let mut results = Vec::new();
        let mut deadline_hit = false;

        while !join_set.is_empty() {
            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(entry))) => results.push(entry),
                Ok(Some(Err(_))) => {}
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    join_set.abort_all();
                    break;
                }
            }
        }

        if deadline_hit {
            // Bounded grace for calls that complete while aborting.
            let grace = tokio::time::Instant::now() + self.config.deadline_grace;
            while !join_set.is_empty() {
                match tokio::time::timeout_at(grace, join_set.join_next()).await {
                    Ok(Some(Ok(entry))) => results.push(entry),
                    Ok(Some(Err(_))) => {}
                    Ok(None) | Err(_) => break,
                }
            }
            join_set.abort_all();
        }

        let completed: Vec<SourceId> = results.iter().map(|(source, _)| *source).collect();
        let skipped = selected
            .iter()
            .copied()
            .filter(|source| !completed.contains(source))
            .map(|source| {
                warn!(%source, "source aborted at query deadline");
                SkippedSource {
                    source,
                    reason: String::from("deadline"),
                }
            })
            .collect();

        (results, skipped)
    }

    /// Query originally unselected candidates after the primary source
    /// answered with a valid empty result.
    async fn triangulate(
        &self,
        query: &QueryParams,
        consulted: &mut Vec<SourceId>,
        contributions: &mut Vec<Contribution>,
        skipped: &mut Vec<SkippedSource>,
    ) {
        let extras = self.selector.triangulation_candidates(query, consulted);
        for candidate in extras.into_iter().take(self.config.max_triangulation) {
            let source = candidate.source;
            consulted.push(source);
            debug!(%source, "triangulating after primary returned no data");

            let result = self
                .gateway
                .query_opts(source, query, self.config.allow_stale_fallback)
                .await;
            if result.is_success() {
                contributions.push(Contribution {
                    source,
                    quality: result.quality,
                    payload: result.payload,
                    triangulated: true,
                });
            } else if !result.is_no_data() {
                skipped.push(SkippedSource {
                    source,
                    reason: result.status.reason(),
                });
            }
        }
    }

    /// Group contributions into findings. Deterministic and insensitive
    /// to arrival order: claims and reported values are sorted before
    /// grouping and scoring.
    fn correlate(&self, contributions: &[Contribution]) -> Vec<AggregatedFinding> {
        let mut by_fact: BTreeMap<String, Vec<ReportedValue>> = BTreeMap::new();

        for contribution in contributions {
            for (fact_type, value) in extract_claims(&contribution.payload) {
                by_fact.entry(fact_type).or_default().push(ReportedValue {
                    source: contribution.source,
                    value,
                    quality: contribution.quality,
                    triangulated: contribution.triangulated,
                });
            }
        }

        by_fact
            .into_iter()
            .map(|(fact_type, mut values)| {
                values.sort_by_key(|value| value.source);
                self.score_finding(fact_type, values)
            })
            .collect()
    }

    fn score_finding(&self, fact_type: String, values: Vec<ReportedValue>) -> AggregatedFinding {
        // Partition into agreement groups under the fact's tolerance.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (index, value) in values.iter().enumerate() {
            let home = groups.iter_mut().find(|group| {
                let representative = &values[group[0]];
                self.config
                    .tolerance
                    .equivalent(&fact_type, &representative.value, &value.value)
            });
            match home {
                Some(group) => group.push(index),
                None => groups.push(vec![index]),
            }
        }

        let largest = groups
            .iter()
            .max_by_key(|group| group.len())
            .cloned()
            .unwrap_or_default();
        let corroboration: Vec<SourceId> = if largest.len() >= 2 {
            largest.iter().map(|index| values[*index].source).collect()
        } else {
            Vec::new()
        };
        let conflict: Vec<SourceId> = if groups.len() > 1 {
            values.iter().map(|value| value.source).collect()
        } else {
            Vec::new()
        };

        let best_quality = values
            .iter()
            .map(|value| value.quality)
            .max()
            .unwrap_or(QualityTier::Low);
        let triangulated = values.iter().any(|value| value.triangulated);

        let mut band = ConfidenceBand::base_for(best_quality);
        if !corroboration.is_empty() {
            band = band.raised();
        }
        if !conflict.is_empty() {
            band = band.lowered();
        }

        let confidence = if triangulated {
            let capped = band.midpoint().min(TRIANGULATED_CAP);
            band = ConfidenceBand::from_score(capped);
            capped
        } else {
            band.midpoint()
        };

        AggregatedFinding {
            fact_type,
            values,
            corroboration,
            conflict,
            band,
            confidence,
            triangulated,
        }
    }
}

/// Claims are carried as `{"claims": [{"fact": ..., "value": ...}]}` in
/// adapter payloads. Payloads without that shape contribute no findings
/// but still count as a consulted, successful source.
fn extract_claims(payload: &Value) -> Vec<(String, Value)> {
    payload
        .get("claims")
        .and_then(Value::as_array)
        .map(|claims| {
            claims
                .iter()
                .filter_map(|claim| {
                    let fact = claim.get("fact")?.as_str()?;
                    let value = claim.get("value")?.clone();
                    Some((fact.to_owned(), value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Overall confidence: base from the best-quality contributor, raised per
/// corroborated finding, lowered per conflicted finding, then mapped back
/// onto the band ladder.
fn overall_confidence(
    contributions: &[Contribution],
    findings: &[AggregatedFinding],
    triangulated: bool,
) -> (ConfidenceBand, f64) {
    let Some(best_quality) = contributions.iter().map(|c| c.quality).max() else {
        return (ConfidenceBand::Remote, 0.0);
    };

    let mut score = ConfidenceBand::base_for(best_quality).midpoint();
    for finding in findings {
        if !finding.corroboration.is_empty() {
            score += 0.08;
        }
        if !finding.conflict.is_empty() {
            score -= 0.1;
        }
    }
    if triangulated && contributions.iter().all(|c| c.triangulated) {
        score = score.min(TRIANGULATED_CAP);
    }
    let score = score.clamp(0.0, 1.0);

    (ConfidenceBand::from_score(score), score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{RawResponse, SourceAdapter, SourceFailure};
    use crate::ratelimit::SourcePolicy;
    use crate::retry::RetryPolicy;
    use intelfuse_cache::TieredCache;
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;

    enum Behavior {
        Claims(Value),
        NoData,
        Fail(SourceFailure),
        Hang(Duration),
    }

    struct StubAdapter {
        source: SourceId,
        quality: QualityTier,
        behavior: Behavior,
    }

    impl SourceAdapter for StubAdapter {
        fn id(&self) -> SourceId {
            self.source
        }

        fn quality(&self) -> QualityTier {
            self.quality
        }

        fn fetch<'a>(
            &'a self,
            _params: &'a QueryParams,
        ) -> Pin<Box<dyn Future<Output = Result<RawResponse, SourceFailure>> + Send + 'a>> {
            Box::pin(async move {
                match &self.behavior {
                    Behavior::Claims(value) => Ok(RawResponse::Data(value.clone())),
                    Behavior::NoData => Ok(RawResponse::Empty),
                    Behavior::Fail(failure) => Err(failure.clone()),
                    Behavior::Hang(duration) => {
                        tokio::time::sleep(*duration).await;
                        Ok(RawResponse::Empty)
                    }
                }
            })
        }

        fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
            Box::pin(async { true })
        }
    }

    fn claims(value: Value) -> Value {
        json!({ "claims": [{ "fact": "fatalities", "value": value }] })
    }

    fn correlator(adapters: Vec<StubAdapter>) -> Correlator {
        correlator_with(adapters, CorrelatorConfig::default())
    }

    fn correlator_with(adapters: Vec<StubAdapter>, config: CorrelatorConfig) -> Correlator {
        let sources: Vec<SourceId> = adapters.iter().map(|a| a.source).collect();
        let boxed: Vec<Arc<dyn SourceAdapter>> = adapters
            .into_iter()
            .map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
            .collect();
        let mut gateway =
            AdapterGateway::new(boxed, Arc::new(TieredCache::volatile_only()));
        for source in sources {
            gateway = gateway.with_policy(SourcePolicy {
                call_timeout: Duration::from_millis(100),
                retry: RetryPolicy::none(),
                ..SourcePolicy::default_for(source)
            });
        }
        Correlator::new(Arc::new(gateway)).with_config(config)
    }

    fn stub(source: SourceId, quality: QualityTier, behavior: Behavior) -> StubAdapter {
        StubAdapter {
            source,
            quality,
            behavior,
        }
    }

    #[tokio::test]
    async fn corroboration_raises_the_band_over_a_single_source() {
        let single = correlator(vec![stub(
            SourceId::Acled,
            QualityTier::High,
            Behavior::Claims(claims(json!(120))),
        )]);
        let query = QueryParams::topic("border clashes").expect("valid");
        let lone = single.aggregate(&query).await.expect("aggregate");

        let pair = correlator(vec![
            stub(
                SourceId::Acled,
                QualityTier::High,
                Behavior::Claims(claims(json!(120))),
            ),
            stub(
                SourceId::Gdelt,
                QualityTier::Medium,
                Behavior::Claims(claims(json!(120))),
            ),
        ]);
        let corroborated = pair.aggregate(&query).await.expect("aggregate");

        let finding = &corroborated.findings[0];
        assert_eq!(finding.corroboration.len(), 2);
        assert!(finding.conflict.is_empty());
        assert!(finding.band > lone.findings[0].band);
    }

    #[tokio::test]
    async fn conflict_retains_both_values_and_lowers_the_band() {
        let query = QueryParams::topic("border clashes").expect("valid");
        let agreeing = correlator(vec![stub(
            SourceId::Acled,
            QualityTier::High,
            Behavior::Claims(claims(json!(120))),
        )]);
        let baseline = agreeing.aggregate(&query).await.expect("aggregate");

        let conflicted = correlator(vec![
            stub(
                SourceId::Acled,
                QualityTier::High,
                Behavior::Claims(claims(json!(120))),
            ),
            stub(
                SourceId::Gdelt,
                QualityTier::Medium,
                Behavior::Claims(claims(json!(45))),
            ),
        ]);
        let result = conflicted.aggregate(&query).await.expect("aggregate");

        let finding = &result.findings[0];
        assert_eq!(finding.conflict.len(), 2);
        assert_eq!(finding.values.len(), 2, "both values retained verbatim");
        assert!(finding.values.iter().any(|v| v.value == json!(120)));
        assert!(finding.values.iter().any(|v| v.value == json!(45)));
        assert!(finding.band < baseline.findings[0].band);
    }

    #[tokio::test]
    async fn numeric_tolerance_turns_near_values_into_corroboration() {
        let query = QueryParams::topic("border clashes").expect("valid");
        let config = CorrelatorConfig {
            tolerance: ClaimTolerance::new()
                .with_fact("fatalities", 10.0)
                .expect("valid tolerance"),
            ..CorrelatorConfig::default()
        };
        let correlator = correlator_with(
            vec![
                stub(
                    SourceId::Acled,
                    QualityTier::High,
                    Behavior::Claims(claims(json!(120))),
                ),
                stub(
                    SourceId::Gdelt,
                    QualityTier::Medium,
                    Behavior::Claims(claims(json!(125))),
                ),
            ],
            config,
        );

        let result = correlator.aggregate(&query).await.expect("aggregate");
        let finding = &result.findings[0];
        assert_eq!(finding.corroboration.len(), 2);
        assert!(finding.conflict.is_empty());
    }

    #[tokio::test]
    async fn primary_no_data_triggers_triangulation() {
        let query = QueryParams::vessel("IMO 9074729").expect("valid");
        let correlator = correlator(vec![
            stub(SourceId::AisHub, QualityTier::Low, Behavior::NoData),
            stub(
                SourceId::Gdelt,
                QualityTier::High,
                Behavior::Claims(json!({
                    "claims": [{ "fact": "last_position", "value": "Bosphorus" }]
                })),
            ),
        ]);

        let result = correlator.aggregate(&query).await.expect("aggregate");
        assert!(result.triangulated);
        let finding = &result.findings[0];
        assert!(finding.triangulated);
        assert!(finding.confidence <= 0.6, "got {}", finding.confidence);
        assert!(result.overall_confidence <= 0.6);
    }

    #[tokio::test]
    async fn one_sources_failure_never_aborts_the_aggregate() {
        let query = QueryParams::topic("border clashes").expect("valid");
        let correlator = correlator(vec![
            stub(
                SourceId::Acled,
                QualityTier::High,
                Behavior::Claims(claims(json!(120))),
            ),
            stub(
                SourceId::Gdelt,
                QualityTier::Medium,
                Behavior::Fail(SourceFailure::auth("revoked")),
            ),
        ]);

        let result = correlator.aggregate(&query).await.expect("partial success");
        assert_eq!(result.findings.len(), 1);
        assert!(result
            .sources_skipped
            .iter()
            .any(|s| s.source == SourceId::Gdelt && s.reason == "auth"));
        assert!(result.degraded, "single contributor is below the floor");
    }

    #[tokio::test]
    async fn timed_out_source_is_skipped_with_reason() {
        let query = QueryParams::topic("border clashes").expect("valid");
        let correlator = correlator(vec![
            stub(
                SourceId::Acled,
                QualityTier::High,
                Behavior::Claims(claims(json!(120))),
            ),
            stub(
                SourceId::Gdelt,
                QualityTier::Medium,
                Behavior::Hang(Duration::from_secs(5)),
            ),
        ]);

        let result = correlator.aggregate(&query).await.expect("partial success");
        assert_eq!(result.findings.len(), 1);
        assert!(result
            .sources_skipped
            .iter()
            .any(|s| s.source == SourceId::Gdelt && s.reason == "timeout"));
    }

    #[tokio::test]
    async fn aggregate_returns_by_the_deadline_plus_grace() {
        let query = QueryParams::topic("border clashes").expect("valid");
        let config = CorrelatorConfig {
            query_deadline: Duration::from_millis(80),
            deadline_grace: Duration::from_millis(40),
            ..CorrelatorConfig::default()
        };
        // The hanging stub's call timeout is raised past the overall
        // deadline so only the deadline can end the query.
        let gateway = AdapterGateway::new(
            vec![
                Arc::new(stub(
                    SourceId::Acled,
                    QualityTier::High,
                    Behavior::Claims(claims(json!(120))),
                )) as Arc<dyn SourceAdapter>,
                Arc::new(stub(
                    SourceId::Gdelt,
                    QualityTier::Medium,
                    Behavior::Hang(Duration::from_secs(30)),
                )),
            ],
            Arc::new(TieredCache::volatile_only()),
        )
        .with_policy(SourcePolicy {
            call_timeout: Duration::from_secs(60),
            retry: RetryPolicy::none(),
            ..SourcePolicy::default_for(SourceId::Gdelt)
        })
        .with_policy(SourcePolicy {
            retry: RetryPolicy::none(),
            ..SourcePolicy::default_for(SourceId::Acled)
        });
        let correlator = Correlator::new(Arc::new(gateway)).with_config(config);

        let started = Instant::now();
        let result = correlator.aggregate(&query).await.expect("aggregate");
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "took {:?}",
            started.elapsed()
        );
        assert!(result
            .sources_skipped
            .iter()
            .any(|s| s.source == SourceId::Gdelt && s.reason == "deadline"));
        assert_eq!(result.findings.len(), 1, "fast sibling still contributes");
    }

    #[tokio::test]
    async fn no_available_sources_is_a_query_level_error() {
        let correlator = correlator(vec![]);
        let query = QueryParams::topic("border clashes").expect("valid");

        let error = correlator.aggregate(&query).await.expect_err("must fail");
        assert!(matches!(error, CoreError::NoAvailableSources { .. }));
    }

    #[tokio::test]
    async fn findings_are_ordered_independently_of_arrival() {
        let query = QueryParams::topic("border clashes").expect("valid");
        let build = || {
            correlator(vec![
                stub(
                    SourceId::Acled,
                    QualityTier::High,
                    Behavior::Claims(json!({"claims": [
                        {"fact": "fatalities", "value": 120},
                        {"fact": "location", "value": "Kharkiv"}
                    ]})),
                ),
                stub(
                    SourceId::Gdelt,
                    QualityTier::Medium,
                    Behavior::Claims(json!({"claims": [
                        {"fact": "location", "value": "Kharkiv"},
                        {"fact": "fatalities", "value": 120}
                    ]})),
                ),
            ])
        };

        let first = build().aggregate(&query).await.expect("aggregate");
        let second = build().aggregate(&query).await.expect("aggregate");

        let facts = |result: &AggregatedResult| {
            result
                .findings
                .iter()
                .map(|f| f.fact_type.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(facts(&first), facts(&second));
        assert_eq!(first.findings[0].values, second.findings[0].values);
    }

    #[test]
    fn tolerance_rejects_negative_values() {
        let error = ClaimTolerance::new()
            .with_fact("fatalities", -1.0)
            .expect_err("must fail");
        assert!(matches!(error, ValidationError::NegativeTolerance { .. }));
    }
}
