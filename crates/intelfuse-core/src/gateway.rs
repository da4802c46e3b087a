//! Adapter gateway: uniform result contract over unreliable sources.
//!
//! Call sequence per source: consult the cache, then (under single-flight
//! coalescing) enforce the per-call deadline, invoke the adapter, classify
//! the outcome, and retry transient failures with backoff up to the
//! policy's ceiling. Permanent failures are never retried. Each source
//! owns its limiter and telemetry slot; no mutable state crosses source
//! boundaries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use intelfuse_cache::{CacheKey, CachedPayload, TieredCache};

use crate::adapter::{RawResponse, SourceAdapter, SourceFailure, SourceResult};
use crate::ratelimit::{SourcePolicy, SourceRateLimiter};
use crate::{QualityTier, QueryParams, SourceId, UtcDateTime};

/// Gateway-wide knobs not tied to any single source.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TTL for cached empty results, kept short so recovering upstreams
    /// are re-probed quickly without being hammered.
    pub nodata_ttl: std::time::Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            nodata_ttl: std::time::Duration::from_secs(60),
        }
    }
}

/// Boundary snapshot for one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source: SourceId,
    pub configured: bool,
    pub last_health_check: Option<UtcDateTime>,
    pub healthy: Option<bool>,
    pub last_latency_ms: Option<u64>,
}

#[derive(Debug, Default, Clone)]
struct Telemetry {
    last_health: Option<(UtcDateTime, bool)>,
    last_latency_ms: Option<u64>,
}

type InflightCell = Arc<OnceCell<SourceResult>>;

/// Registry of source adapters plus the resilience machinery around them.
pub struct AdapterGateway {
    adapters: HashMap<SourceId, Arc<dyn SourceAdapter>>,
    policies: HashMap<SourceId, SourcePolicy>,
    limiters: HashMap<SourceId, SourceRateLimiter>,
    cache: Arc<TieredCache>,
    config: GatewayConfig,
    inflight: tokio::sync::Mutex<HashMap<String, InflightCell>>,
    telemetry: Mutex<HashMap<SourceId, Telemetry>>,
}

impl AdapterGateway {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, cache: Arc<TieredCache>) -> Self {
        let adapters: HashMap<_, _> = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        let policies: HashMap<_, _> = adapters
            .keys()
            .map(|source| (*source, SourcePolicy::default_for(*source)))
            .collect();
        let limiters = policies
            .values()
            .map(|policy| (policy.source, SourceRateLimiter::from_policy(policy)))
            .collect();

        Self {
            adapters,
            policies,
            limiters,
            cache,
            config: GatewayConfig::default(),
            inflight: tokio::sync::Mutex::new(HashMap::new()),
            telemetry: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the policy (and limiter) for one source.
    pub fn with_policy(mut self, policy: SourcePolicy) -> Self {
        self.limiters
            .insert(policy.source, SourceRateLimiter::from_policy(&policy));
        self.policies.insert(policy.source, policy);
        self
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registered_sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<_> = self.adapters.keys().copied().collect();
        sources.sort();
        sources
    }

    pub fn is_registered(&self, source: SourceId) -> bool {
        self.adapters.contains_key(&source)
    }

    pub fn is_configured(&self, source: SourceId) -> bool {
        self.adapters
            .get(&source)
            .map(|adapter| adapter.configured())
            .unwrap_or(false)
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Query one source with the default (no stale fallback) options.
    pub async fn query(&self, source: SourceId, params: &QueryParams) -> SourceResult {
        self.query_opts(source, params, false).await
    }

    /// Query one source.
    ///
    /// With `allow_stale`, a terminal live-fetch failure falls back to the
    /// last cached payload past its TTL, flagged `stale`. The caller opts
    /// in explicitly; the fresh path never serves stale data.
    pub async fn query_opts(
        &self,
        source: SourceId,
        params: &QueryParams,
        allow_stale: bool,
    ) -> SourceResult {
        let Some(adapter) = self.adapters.get(&source) else {
            return SourceResult::failure(
                source,
                QualityTier::Low,
                SourceFailure::not_configured(source),
            );
        };
        let quality = adapter.quality();

        if !adapter.configured() {
            return SourceResult::failure(source, quality, SourceFailure::not_configured(source));
        }

        let key = self.cache_key(source, params);
        if let Some(hit) = self.cache_lookup(&key, false).await {
            debug!(source = %source, key = %key, stale = hit.is_stale, "cache hit");
            return cached_to_result(source, quality, hit);
        }

        let result = self.coalesced_fetch(source, quality, &key, params).await;

        if allow_stale && !result.is_success() && !result.is_no_data() {
            if let Some(stale) = self.cache_lookup(&key, true).await {
                warn!(source = %source, reason = %result.status.reason(), "serving stale cache entry after live failure");
                return cached_to_result(source, quality, stale);
            }
        }

        result
    }

    /// Probe one source's liveness and record the outcome.
    pub async fn health_check(&self, source: SourceId) -> bool {
        let Some(adapter) = self.adapters.get(&source) else {
            return false;
        };
        if !adapter.configured() {
            return false;
        }

        let healthy = adapter.health_check().await;
        let mut telemetry = self
            .telemetry
            .lock()
            .expect("gateway telemetry mutex poisoned");
        telemetry.entry(source).or_default().last_health = Some((UtcDateTime::now(), healthy));
        healthy
    }

    /// Status snapshot for one source, or for every registered source.
    pub fn source_status(&self, source: Option<SourceId>) -> Vec<SourceStatus> {
        let telemetry = self
            .telemetry
            .lock()
            .expect("gateway telemetry mutex poisoned");

        let mut sources: Vec<_> = match source {
            Some(source) => vec![source],
            None => self.adapters.keys().copied().collect(),
        };
        sources.sort();

        sources
            .into_iter()
            .map(|source| {
                let slot = telemetry.get(&source).cloned().unwrap_or_default();
                SourceStatus {
                    source,
                    configured: self.is_configured(source),
                    last_health_check: slot.last_health.map(|(at, _)| at),
                    healthy: slot.last_health.map(|(_, healthy)| healthy),
                    last_latency_ms: slot.last_latency_ms,
                }
            })
            .collect()
    }

    fn cache_key(&self, source: SourceId, params: &QueryParams) -> CacheKey {
        let pairs = params.cache_params();
        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        CacheKey::derive(source.as_str(), params.subject(), &borrowed)
    }

    async fn cache_lookup(&self, key: &CacheKey, allow_stale: bool) -> Option<CachedPayload> {
        match self.cache.get(key, allow_stale).await {
            Ok(hit) => hit,
            Err(error) => {
                warn!(key = %key, %error, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Coalesce concurrent identical-key fetches into one upstream call.
    async fn coalesced_fetch(
        &self,
        source: SourceId,
        quality: QualityTier,
        key: &CacheKey,
        params: &QueryParams,
    ) -> SourceResult {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.as_str().to_owned())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let result = cell
            .get_or_init(|| self.fetch_live(source, quality, key, params))
            .await
            .clone();

        let mut inflight = self.inflight.lock().await;
        if let Some(existing) = inflight.get(key.as_str()) {
            if Arc::ptr_eq(existing, &cell) {
                inflight.remove(key.as_str());
            }
        }

        result
    }

    async fn fetch_live(
        &self,
        source: SourceId,
        quality: QualityTier,
        key: &CacheKey,
        params: &QueryParams,
    ) -> SourceResult {
        let adapter = self
            .adapters
            .get(&source)
            .expect("fetch_live is only reached for registered adapters");
        let policy = self
            .policies
            .get(&source)
            .expect("every registered adapter has a policy");
        let limiter = self
            .limiters
            .get(&source)
            .expect("every registered adapter has a limiter");

        let started = Instant::now();
        let mut attempt: u32 = 0;

        let result = loop {
            if !limiter.try_acquire() {
                if attempt >= policy.retry.max_retries {
                    debug!(source = %source, "local rate budget exhausted");
                    break SourceResult::rate_limited(source, quality);
                }
                tokio::time::sleep(policy.retry.delay_for_attempt(attempt)).await;
                attempt += 1;
                continue;
            }

            let outcome = tokio::time::timeout(policy.call_timeout, adapter.fetch(params)).await;
            let failure = match outcome {
                Err(_) => SourceFailure::timeout(format!(
                    "call exceeded {}ms deadline",
                    policy.call_timeout.as_millis()
                )),
                Ok(Ok(RawResponse::Data(payload))) if !payload.is_null() => {
                    self.cache_store(key, payload.clone(), policy.cache_ttl, source)
                        .await;
                    break SourceResult::success(source, quality, payload);
                }
                Ok(Ok(RawResponse::Data(_) | RawResponse::Empty)) => {
                    // Valid empty result; cached briefly under the same key.
                    self.cache_store(key, Value::Null, self.config.nodata_ttl, source)
                        .await;
                    break SourceResult::no_data(source, quality);
                }
                Ok(Err(failure)) => failure,
            };

            if !failure.retryable() {
                debug!(source = %source, kind = %failure.kind(), "permanent failure, not retrying");
                break SourceResult::failure(source, quality, failure);
            }
            if attempt >= policy.retry.max_retries {
                debug!(source = %source, kind = %failure.kind(), attempts = attempt + 1, "retry ceiling exhausted");
                break SourceResult::failure(source, quality, failure);
            }

            tokio::time::sleep(policy.retry.delay_for_attempt(attempt)).await;
            attempt += 1;
        };

        let latency_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
        let mut telemetry = self
            .telemetry
            .lock()
            .expect("gateway telemetry mutex poisoned");
        telemetry.entry(source).or_default().last_latency_ms = Some(latency_ms);
        result
    }

    async fn cache_store(
        &self,
        key: &CacheKey,
        payload: Value,
        ttl: std::time::Duration,
        source: SourceId,
    ) {
        if let Err(error) = self.cache.set(key, payload, ttl, source.as_str()).await {
            warn!(key = %key, %error, "cache write failed");
        }
    }
}

fn cached_to_result(source: SourceId, quality: QualityTier, hit: CachedPayload) -> SourceResult {
    let mut result = if hit.payload.is_null() {
        SourceResult::no_data(source, quality)
    } else {
        SourceResult::success(source, quality, hit.payload)
    };
    result.from_cache = true;
    result.stale = hit.is_stale;
    result
}
