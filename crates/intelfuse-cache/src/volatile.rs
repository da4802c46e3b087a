//! Process-scoped volatile cache tier.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::key::CacheKey;
use crate::{CachedPayload, EntryMeta};

#[derive(Debug, Clone)]
pub(crate) struct VolatileEntry {
    pub payload: Value,
    pub created_at_us: i64,
    pub ttl_us: i64,
    pub source_tag: String,
}

impl VolatileEntry {
    pub fn is_fresh(&self, now_us: i64) -> bool {
        now_us < self.created_at_us.saturating_add(self.ttl_us)
    }
}

/// Fast in-process tier checked before the durable store.
///
/// Writes are last-write-wins per key; readers never observe a torn value
/// because the whole entry is replaced under the write lock.
#[derive(Debug, Default)]
pub(crate) struct VolatileTier {
    map: RwLock<HashMap<String, VolatileEntry>>,
}

impl VolatileTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey, now_us: i64) -> Option<(CachedPayload, bool)> {
        let map = self.map.read().await;
        let entry = map.get(key.as_str())?;
        let fresh = entry.is_fresh(now_us);
        let payload = CachedPayload {
            payload: entry.payload.clone(),
            is_stale: !fresh,
            source_tag: entry.source_tag.clone(),
            age: Duration::from_micros(now_us.saturating_sub(entry.created_at_us).max(0) as u64),
        };
        Some((payload, fresh))
    }

    pub async fn put(&self, key: &CacheKey, entry: VolatileEntry) {
        let mut map = self.map.write().await;
        map.insert(key.as_str().to_owned(), entry);
    }

    /// Removes entries matching `source_tag`, or everything when `None`.
    pub async fn invalidate(&self, source_tag: Option<&str>) -> usize {
        let mut map = self.map.write().await;
        match source_tag {
            None => {
                let removed = map.len();
                map.clear();
                removed
            }
            Some(tag) => {
                let before = map.len();
                map.retain(|_, entry| entry.source_tag != tag);
                before - map.len()
            }
        }
    }

    pub async fn entry_meta(&self) -> Vec<EntryMeta> {
        let map = self.map.read().await;
        map.values()
            .map(|entry| EntryMeta {
                source_tag: entry.source_tag.clone(),
                created_at_us: entry.created_at_us,
            })
            .collect()
    }
}
