//! Behavior-driven tests for the entity resolution cascade as exposed
//! through the service facade.

use intelfuse_core::{CoreError, IntelService, QueryParams, ResolutionTier};

#[tokio::test]
async fn when_the_name_matches_after_normalization_the_cascade_stops_there() {
    // Given: a registry containing "Vladimir Putin"
    let service = IntelService::builtin();

    // When: resolving a differently-cased, padded variant
    let matched = service.resolve_entity("  vladimir putin ", None).await;

    // Then: the normalized tier answers with its fixed confidence
    assert_eq!(matched.tier, ResolutionTier::Normalized);
    assert_eq!(matched.confidence, 0.95);
    assert_eq!(matched.canonical_id.as_deref(), Some("Q7747"));
}

#[tokio::test]
async fn when_the_registry_misses_the_directory_tier_answers() {
    // "Alexey Navalny" is absent from the local registry but present in
    // the canonical directory's alias list
    let service = IntelService::builtin();

    let matched = service.resolve_entity("Alexey Navalny", None).await;

    assert_eq!(matched.tier, ResolutionTier::Canonical);
    assert_eq!(matched.canonical_id.as_deref(), Some("Q396"));
    assert!(matched.confidence >= 0.85 && matched.confidence <= 1.0);
}

#[tokio::test]
async fn when_the_name_is_misspelled_the_fuzzy_tier_stays_below_canonical() {
    let service = IntelService::builtin();

    let matched = service.resolve_entity("Vladimyr Putin", None).await;

    assert_eq!(matched.tier, ResolutionTier::Fuzzy);
    assert!(matched.confidence < 0.85);
    assert_eq!(matched.canonical_id.as_deref(), Some("Q7747"));
}

#[tokio::test]
async fn when_an_alt_id_is_supplied_the_cascade_is_bypassed() {
    let service = IntelService::builtin();

    let matched = service.resolve_entity("whatever text", Some("Q63189584")).await;

    assert_eq!(matched.tier, ResolutionTier::Exact);
    assert_eq!(matched.confidence, 1.0);
    assert_eq!(matched.query, "Wagner Group");
}

#[tokio::test]
async fn when_resolution_fails_the_aggregate_error_carries_suggestions() {
    let service = IntelService::builtin();
    let query = QueryParams::entity("Zzyx Qwwrt").expect("valid");

    let error = service.aggregate(&query).await.expect_err("must fail");

    match error {
        CoreError::EntityUnresolved { query, suggestions } => {
            assert_eq!(query, "Zzyx Qwwrt");
            assert!(!suggestions.is_empty(), "alternatives are surfaced");
        }
        other => panic!("expected EntityUnresolved, got {other}"),
    }
}

#[tokio::test]
async fn when_an_entity_aggregates_the_resolution_is_attached_for_attribution() {
    let service = IntelService::builtin();
    let query = QueryParams::entity("Wagner Group").expect("valid");

    let result = service.aggregate(&query).await.expect("aggregate");

    let entity = result.entity.expect("attribution recorded");
    assert_eq!(entity.tier, ResolutionTier::Exact);
    assert_eq!(entity.canonical_id.as_deref(), Some("Q63189584"));
    assert!(!result.findings.is_empty(), "identity sources contributed");
}
