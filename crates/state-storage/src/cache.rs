//! TTL cache tiers used by the ephemeral backend.
//!
//! Values are stored as serialized JSON strings so the same tier works
//! in-process and over Redis.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::StorageResult;

/// A string cache whose entries expire after a fixed TTL.
#[async_trait]
pub trait TtlCache: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Tier name for logs.
    fn name(&self) -> &'static str;
}

/// Upper bound on the interval between expiry sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-process TTL cache.
///
/// Expired entries are dropped when read and by a sweep that runs on `set`
/// at most once per sweep interval, so keys that are never read again do not
/// accumulate.
pub struct MemoryTtlCache {
    label: &'static str,
    ttl: Duration,
    sweep_interval: Duration,
    inner: Mutex<MemoryEntries>,
}

struct MemoryEntries {
    entries: HashMap<String, (String, Instant)>,
    next_sweep: Instant,
}

impl MemoryEntries {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires)| *expires > now);
        before - self.entries.len()
    }
}

impl MemoryTtlCache {
    pub fn new(label: &'static str, ttl: Duration) -> Self {
        let sweep_interval = ttl.min(MAX_SWEEP_INTERVAL).max(Duration::from_millis(1));
        Self {
            label,
            ttl,
            sweep_interval,
            inner: Mutex::new(MemoryEntries {
                entries: HashMap::new(),
                next_sweep: Instant::now() + sweep_interval,
            }),
        }
    }

    /// Live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    /// Entries held in memory, expired or not.
    pub fn stored(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TtlCache for MemoryTtlCache {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                inner.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        if now >= inner.next_sweep {
            let removed = inner.sweep(now);
            inner.next_sweep = now + self.sweep_interval;
            if removed > 0 {
                debug!(tier = self.label, removed, "Swept expired cache entries");
            }
        }
        inner
            .entries
            .insert(key.to_string(), (value.to_string(), now + self.ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.lock().entries.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

/// Shared cache tier on Redis (`GET` / `SET EX`).
pub struct RedisTtlCache {
    conn: MultiplexedConnection,
    prefix: String,
    ttl_secs: u64,
}

impl RedisTtlCache {
    /// Connect to Redis.
    pub async fn connect(url: &str, prefix: impl Into<String>, ttl: Duration) -> StorageResult<Self> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!(url = %url, "Connected shared state cache");
        Ok(Self {
            conn,
            prefix: prefix.into(),
            ttl_secs: ttl.as_secs().max(1),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl TtlCache for RedisTtlCache {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.full_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);
        let _: () = conn.set_ex(&full_key, value, self.ttl_secs).await?;
        debug!(key = %full_key, ttl_secs = self.ttl_secs, "Shared cache write");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.full_key(key)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
