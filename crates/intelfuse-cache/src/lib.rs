//! # intelfuse-cache
//!
//! Two-tier response cache for adapter payloads.
//!
//! A fast volatile tier (process-scoped) is checked first; on miss the
//! durable tier (DuckDB file, survives restarts) is consulted and a hit is
//! promoted back into the volatile tier. Expiry is computed at read time
//! by comparing creation time + TTL against the clock; there is no
//! background sweeper. Expired entries are retained until explicitly
//! invalidated so callers can opt into stale reads as a fallback.

mod durable;
pub mod key;
mod volatile;

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use durable::{DurableEntry, DurableTier};
use volatile::{VolatileEntry, VolatileTier};

pub use key::CacheKey;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    DuckDb(#[from] duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("stored payload is not valid JSON: {0}")]
    CorruptPayload(#[from] serde_json::Error),

    #[error("ttl must be greater than zero")]
    ZeroTtl,
}

/// Where the durable tier lives and how many pooled connections it keeps.
///
/// The database file defaults to `cache/responses.duckdb` under `home`;
/// set `db_path` to place it elsewhere.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub home: PathBuf,
    pub db_path: Option<PathBuf>,
    pub max_pool_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            home: resolve_intelfuse_home(),
            db_path: None,
            max_pool_size: 4,
        }
    }
}

impl CacheConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.home.join("cache").join("responses.duckdb"))
    }
}

/// Payload returned by a cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    pub payload: Value,
    /// True when the entry is past its TTL and was served under
    /// `allow_stale`.
    pub is_stale: bool,
    pub source_tag: String,
    pub age: Duration,
}

/// Per-entry bookkeeping used for status reporting.
#[derive(Debug, Clone)]
pub(crate) struct EntryMeta {
    pub source_tag: String,
    pub created_at_us: i64,
}

/// Snapshot of cache occupancy, exposed at the service boundary.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub volatile_entries: usize,
    pub durable_entries: u64,
    pub durable_payload_bytes: u64,
    /// Oldest entry age per source tag, in seconds.
    pub oldest_age_secs_per_source: BTreeMap<String, u64>,
}

/// Two-tier cache store.
pub struct TieredCache {
    volatile: VolatileTier,
    durable: Option<DurableTier>,
}

impl TieredCache {
    /// Open the cache with a durable tier at the configured path.
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        let durable = DurableTier::open(config.resolved_db_path(), config.max_pool_size)?;
        Ok(Self {
            volatile: VolatileTier::new(),
            durable: Some(durable),
        })
    }

    pub fn open_default() -> Result<Self, CacheError> {
        Self::open(CacheConfig::default())
    }

    /// Volatile-only cache with no durable backing. Entries do not survive
    /// the process.
    pub fn volatile_only() -> Self {
        Self {
            volatile: VolatileTier::new(),
            durable: None,
        }
    }

    /// Look up `key`.
    ///
    /// A fresh volatile hit is returned directly. A fresh durable hit is
    /// promoted into the volatile tier. An expired entry is returned only
    /// when `allow_stale` is set, flagged `is_stale`.
    pub async fn get(
        &self,
        key: &CacheKey,
        allow_stale: bool,
    ) -> Result<Option<CachedPayload>, CacheError> {
        let now_us = now_micros();

        let mut stale_candidate = None;
        if let Some((payload, fresh)) = self.volatile.get(key, now_us).await {
            if fresh {
                return Ok(Some(payload));
            }
            stale_candidate = Some(payload);
        }

        if let Some(durable) = &self.durable {
            if let Some(entry) = durable.get(key)? {
                let fresh = now_us < entry.created_at_us.saturating_add(entry.ttl_us);
                let payload = CachedPayload {
                    payload: entry.payload.clone(),
                    is_stale: !fresh,
                    source_tag: entry.source_tag.clone(),
                    age: age_from(now_us, entry.created_at_us),
                };

                if fresh {
                    self.volatile
                        .put(
                            key,
                            VolatileEntry {
                                payload: entry.payload,
                                created_at_us: entry.created_at_us,
                                ttl_us: entry.ttl_us,
                                source_tag: entry.source_tag,
                            },
                        )
                        .await;
                    return Ok(Some(payload));
                }

                // Prefer the most recently written copy for stale reads.
                let newer = stale_candidate
                    .as_ref()
                    .map(|existing| existing.age > payload.age)
                    .unwrap_or(true);
                if newer {
                    stale_candidate = Some(payload);
                }
            }
        }

        if allow_stale {
            return Ok(stale_candidate);
        }
        Ok(None)
    }

    /// Write `payload` under `key`. Concurrent writers are last-write-wins
    /// on creation time.
    pub async fn set(
        &self,
        key: &CacheKey,
        payload: Value,
        ttl: Duration,
        source_tag: &str,
    ) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::ZeroTtl);
        }

        let created_at_us = now_micros();
        let ttl_us = ttl.as_micros().min(i64::MAX as u128) as i64;

        if let Some(durable) = &self.durable {
            durable.put(
                key,
                &DurableEntry {
                    payload: payload.clone(),
                    created_at_us,
                    ttl_us,
                    source_tag: source_tag.to_owned(),
                },
            )?;
        }

        self.volatile
            .put(
                key,
                VolatileEntry {
                    payload,
                    created_at_us,
                    ttl_us,
                    source_tag: source_tag.to_owned(),
                },
            )
            .await;
        Ok(())
    }

    /// Remove entries for one source tag, or everything when `None`.
    /// Returns the number of distinct keys removed.
    pub async fn invalidate(&self, source_tag: Option<&str>) -> Result<usize, CacheError> {
        let volatile_removed = self.volatile.invalidate(source_tag).await;
        match &self.durable {
            Some(durable) => durable.invalidate(source_tag),
            None => Ok(volatile_removed),
        }
    }

    pub async fn status(&self) -> Result<CacheStatus, CacheError> {
        let now_us = now_micros();
        let mut oldest_us: BTreeMap<String, i64> = BTreeMap::new();

        let volatile_meta = self.volatile.entry_meta().await;
        let volatile_entries = volatile_meta.len();
        for meta in &volatile_meta {
            record_oldest(&mut oldest_us, meta);
        }

        let (durable_entries, durable_payload_bytes) = match &self.durable {
            Some(durable) => {
                for meta in durable.entry_meta()? {
                    record_oldest(&mut oldest_us, &meta);
                }
                (durable.entry_count()?, durable.payload_bytes()?)
            }
            None => (0, 0),
        };

        let oldest_age_secs_per_source = oldest_us
            .into_iter()
            .map(|(tag, created)| (tag, age_from(now_us, created).as_secs()))
            .collect();

        Ok(CacheStatus {
            volatile_entries,
            durable_entries,
            durable_payload_bytes,
            oldest_age_secs_per_source,
        })
    }
}

fn record_oldest(oldest_us: &mut BTreeMap<String, i64>, meta: &EntryMeta) {
    oldest_us
        .entry(meta.source_tag.clone())
        .and_modify(|existing| *existing = (*existing).min(meta.created_at_us))
        .or_insert(meta.created_at_us);
}

fn now_micros() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000)
        .clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

fn age_from(now_us: i64, created_at_us: i64) -> Duration {
    Duration::from_micros(now_us.saturating_sub(created_at_us).max(0) as u64)
}

fn resolve_intelfuse_home() -> PathBuf {
    if let Some(path) = env::var_os("INTELFUSE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".intelfuse");
    }

    PathBuf::from(".intelfuse")
}
