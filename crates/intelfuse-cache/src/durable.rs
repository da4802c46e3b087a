//! DuckDB-backed durable cache tier.
//!
//! Entries survive process restarts. Expiry is computed at read time from
//! the stored creation timestamp and TTL; nothing is swept in the
//! background.

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use duckdb::Connection;
use serde_json::Value;

use crate::key::CacheKey;
use crate::{CacheError, EntryMeta};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    created_at_us BIGINT NOT NULL,
    ttl_us BIGINT NOT NULL,
    source_tag TEXT NOT NULL
);
";

#[derive(Debug, Clone)]
pub(crate) struct DurableEntry {
    pub payload: Value,
    pub created_at_us: i64,
    pub ttl_us: i64,
    pub source_tag: String,
}

struct PoolInner {
    db_path: PathBuf,
    max_pool_size: usize,
    idle: Mutex<Vec<Connection>>,
}

/// Small connection pool over a single database file.
#[derive(Clone)]
pub(crate) struct ConnectionManager {
    inner: Arc<PoolInner>,
}

impl ConnectionManager {
    pub fn new(path: impl Into<PathBuf>, max_pool_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                db_path: path.into(),
                max_pool_size: max_pool_size.max(1),
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn acquire(&self) -> Result<PooledConnection, duckdb::Error> {
        let reused = self
            .inner
            .idle
            .lock()
            .expect("cache connection pool mutex poisoned")
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => {
                let connection = Connection::open(self.inner.db_path.as_path())?;
                connection.execute_batch("PRAGMA disable_progress_bar;")?;
                connection
            }
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }
}

/// Connection that returns to the pool when dropped.
pub(crate) struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .pool
            .idle
            .lock()
            .expect("cache connection pool mutex poisoned");
        if idle.len() < self.pool.max_pool_size {
            idle.push(connection);
        }
    }
}

pub(crate) struct DurableTier {
    manager: ConnectionManager,
}

impl DurableTier {
    pub fn open(db_path: PathBuf, max_pool_size: usize) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = ConnectionManager::new(db_path, max_pool_size);
        let tier = Self { manager };
        tier.initialize()?;
        Ok(tier)
    }

    fn initialize(&self) -> Result<(), CacheError> {
        let connection = self.manager.acquire()?;
        connection.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<DurableEntry>, CacheError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT payload, created_at_us, ttl_us, source_tag FROM cache_entries WHERE key = '{}'",
            escape_sql_string(key.as_str())
        );

        let row = connection.query_row(sql.as_str(), [], |row| {
            let payload: String = row.get(0)?;
            let created_at_us: i64 = row.get(1)?;
            let ttl_us: i64 = row.get(2)?;
            let source_tag: String = row.get(3)?;
            Ok((payload, created_at_us, ttl_us, source_tag))
        });

        let (payload, created_at_us, ttl_us, source_tag) = match row {
            Ok(values) => values,
            Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let payload = serde_json::from_str(payload.as_str())?;
        Ok(Some(DurableEntry {
            payload,
            created_at_us,
            ttl_us,
            source_tag,
        }))
    }

    pub fn put(&self, key: &CacheKey, entry: &DurableEntry) -> Result<(), CacheError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "INSERT OR REPLACE INTO cache_entries (key, payload, created_at_us, ttl_us, source_tag) \
             VALUES ('{key}', '{payload}', {created_at_us}, {ttl_us}, '{source_tag}')",
            key = escape_sql_string(key.as_str()),
            payload = escape_sql_string(entry.payload.to_string().as_str()),
            created_at_us = entry.created_at_us,
            ttl_us = entry.ttl_us,
            source_tag = escape_sql_string(entry.source_tag.as_str()),
        );
        connection.execute_batch(sql.as_str())?;
        Ok(())
    }

    pub fn invalidate(&self, source_tag: Option<&str>) -> Result<usize, CacheError> {
        let connection = self.manager.acquire()?;
        let sql = match source_tag {
            None => String::from("DELETE FROM cache_entries"),
            Some(tag) => format!(
                "DELETE FROM cache_entries WHERE source_tag = '{}'",
                escape_sql_string(tag)
            ),
        };
        let removed = connection.execute(sql.as_str(), [])?;
        Ok(removed)
    }

    pub fn entry_count(&self) -> Result<u64, CacheError> {
        let connection = self.manager.acquire()?;
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn payload_bytes(&self) -> Result<u64, CacheError> {
        let connection = self.manager.acquire()?;
        let bytes: i64 = connection.query_row(
            "SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM cache_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(bytes.max(0) as u64)
    }

    pub fn entry_meta(&self) -> Result<Vec<EntryMeta>, CacheError> {
        let connection = self.manager.acquire()?;
        let mut statement =
            connection.prepare("SELECT source_tag, created_at_us FROM cache_entries")?;

        let rows = statement.query_map([], |row| {
            let source_tag: String = row.get(0)?;
            let created_at_us: i64 = row.get(1)?;
            Ok(EntryMeta {
                source_tag,
                created_at_us,
            })
        })?;

        let mut output = Vec::new();
        for row in rows {
            output.push(row?);
        }
        Ok(output)
    }
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_tier(dir: &tempfile::TempDir) -> DurableTier {
        DurableTier::open(dir.path().join("cache").join("intel.duckdb"), 2)
            .expect("durable tier opens")
    }

    #[test]
    fn put_then_get_round_trips_entry() {
        let dir = tempdir().expect("tempdir");
        let tier = open_tier(&dir);
        let key = CacheKey::derive("gdelt", "Ukraine", &[]);

        tier.put(
            &key,
            &DurableEntry {
                payload: serde_json::json!({"claims": []}),
                created_at_us: 42,
                ttl_us: 1_000_000,
                source_tag: String::from("gdelt"),
            },
        )
        .expect("put");

        let entry = tier.get(&key).expect("get").expect("entry present");
        assert_eq!(entry.created_at_us, 42);
        assert_eq!(entry.source_tag, "gdelt");
        assert_eq!(entry.payload, serde_json::json!({"claims": []}));
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.path().join("cache").join("intel.duckdb");
        let key = CacheKey::derive("acled", "Sahel", &[]);

        {
            let tier = DurableTier::open(db_path.clone(), 2).expect("open");
            tier.put(
                &key,
                &DurableEntry {
                    payload: Value::String(String::from("payload")),
                    created_at_us: 7,
                    ttl_us: 10,
                    source_tag: String::from("acled"),
                },
            )
            .expect("put");
        }

        let tier = DurableTier::open(db_path, 2).expect("reopen");
        assert!(tier.get(&key).expect("get").is_some());
    }

    #[test]
    fn invalidate_by_tag_reports_removed_count() {
        let dir = tempdir().expect("tempdir");
        let tier = open_tier(&dir);
        for (source, subject) in [("gdelt", "a"), ("gdelt", "b"), ("acled", "c")] {
            let key = CacheKey::derive(source, subject, &[]);
            tier.put(
                &key,
                &DurableEntry {
                    payload: Value::Null,
                    created_at_us: 0,
                    ttl_us: 1,
                    source_tag: source.to_owned(),
                },
            )
            .expect("put");
        }

        assert_eq!(tier.invalidate(Some("gdelt")).expect("invalidate"), 2);
        assert_eq!(tier.entry_count().expect("count"), 1);
    }

    #[test]
    fn payload_with_quotes_round_trips() {
        let dir = tempdir().expect("tempdir");
        let tier = open_tier(&dir);
        let key = CacheKey::derive("gdelt", "O'Brien", &[]);
        let payload = serde_json::json!({"name": "O'Brien; DROP TABLE"});

        tier.put(
            &key,
            &DurableEntry {
                payload: payload.clone(),
                created_at_us: 0,
                ttl_us: 1,
                source_tag: String::from("gdelt"),
            },
        )
        .expect("put");

        let entry = tier.get(&key).expect("get").expect("entry present");
        assert_eq!(entry.payload, payload);
    }
}
