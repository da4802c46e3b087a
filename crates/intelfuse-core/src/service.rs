//! Upward-facing service facade.
//!
//! Owns the gateway, resolver, and correlator; everything a front-end
//! layer needs goes through this type.

use std::sync::Arc;

use tracing::info;

use intelfuse_cache::{CacheStatus, TieredCache};

use crate::adapter::SourceAdapter;
use crate::correlator::{AggregatedResult, Correlator, CorrelatorConfig};
use crate::gateway::{AdapterGateway, SourceStatus};
use crate::resolver::{EntityMatch, EntityRecord, EntityResolver};
use crate::{CoreError, QueryKind, QueryParams, SourceId};

pub struct IntelService {
    gateway: Arc<AdapterGateway>,
    resolver: EntityResolver,
    correlator: Correlator,
}

impl IntelService {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, cache: Arc<TieredCache>) -> Self {
        Self::with_registry(adapters, cache, EntityResolver::default_registry())
    }

    pub fn with_registry(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        cache: Arc<TieredCache>,
        registry: Vec<EntityRecord>,
    ) -> Self {
        let gateway = Arc::new(AdapterGateway::new(adapters, cache));
        let resolver = EntityResolver::new(Arc::clone(&gateway), registry);
        let correlator = Correlator::new(Arc::clone(&gateway));
        Self {
            gateway,
            resolver,
            correlator,
        }
    }

    /// Service with the built-in source set and a volatile-only cache.
    pub fn builtin() -> Self {
        Self::new(
            crate::adapters::builtin(),
            Arc::new(TieredCache::volatile_only()),
        )
    }

    pub fn with_correlator_config(mut self, config: CorrelatorConfig) -> Self {
        self.correlator = Correlator::new(Arc::clone(&self.gateway)).with_config(config);
        self
    }

    pub fn gateway(&self) -> &Arc<AdapterGateway> {
        &self.gateway
    }

    /// Run one aggregation query.
    ///
    /// Entity queries are resolved first; a fully failed cascade is the
    /// one resolver condition that fails the query outright, and it
    /// carries alternative-query suggestions.
    pub async fn aggregate(&self, query: &QueryParams) -> Result<AggregatedResult, CoreError> {
        let entity = if query.kind() == QueryKind::Entity {
            let matched = self.resolver.resolve(query.subject()).await;
            if !matched.is_resolved() {
                return Err(CoreError::EntityUnresolved {
                    query: query.subject().to_owned(),
                    suggestions: self.resolver.suggestions(query.subject()),
                });
            }
            info!(
                subject = query.subject(),
                tier = %matched.tier,
                confidence = matched.confidence,
                "entity resolved"
            );
            Some(matched)
        } else {
            None
        };

        let mut result = self.correlator.aggregate(query).await?;
        result.entity = entity;
        Ok(result)
    }

    /// Resolve an entity by name, or directly by canonical identifier
    /// when one is supplied.
    pub async fn resolve_entity(&self, name: &str, alt_id: Option<&str>) -> EntityMatch {
        if let Some(id) = alt_id {
            if let Some(matched) = self.resolver.lookup_canonical_id(id) {
                return matched;
            }
        }
        self.resolver.resolve(name).await
    }

    pub fn entity_suggestions(&self, name: &str) -> Vec<String> {
        self.resolver.suggestions(name)
    }

    pub async fn cache_status(&self) -> Result<CacheStatus, CoreError> {
        Ok(self.gateway.cache().status().await?)
    }

    /// Drop cached entries for one source tag, or all entries.
    pub async fn cache_clear(&self, source_tag: Option<&str>) -> Result<usize, CoreError> {
        Ok(self.gateway.cache().invalidate(source_tag).await?)
    }

    pub fn source_status(&self, source: Option<SourceId>) -> Vec<SourceStatus> {
        self.gateway.source_status(source)
    }

    pub async fn health_check(&self, source: SourceId) -> bool {
        self.gateway.health_check(source).await
    }
}
