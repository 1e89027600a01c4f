//! Ephemeral backend for `persist = session`.
//!
//! Read path: process cache, then shared cache, then TTL store, then empty.
//! A hit on a lower tier back-fills the process cache. Save writes the shared
//! cache and the TTL store, then the process cache, under a per-key lock.
//! A save that fails on any tier evicts the key everywhere, so no tier keeps
//! a value newer than the last successful save.
//! Any tier may lose data at any time; a miss is "no prior state".

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use state_protocol_types::StateData;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::{storage_key, StateStorage, StorageKind, StorageResult};

/// Bounded in-process map; evicts the least recently used key when full.
pub struct ProcessCache {
    entries: Mutex<LruCache<String, StateData>>,
}

impl ProcessCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<StateData> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &str, data: StateData) {
        self.entries.lock().put(key.to_string(), data);
    }

    pub fn remove(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type WriteLock = Arc<tokio::sync::Mutex<()>>;

/// Three-tier cache-with-fallback storage.
pub struct EphemeralStorage {
    process: ProcessCache,
    shared: Arc<dyn TtlCache>,
    ttl_store: Arc<dyn TtlCache>,
    writers: Mutex<HashMap<String, WriteLock>>,
}

impl EphemeralStorage {
    pub fn new(process_capacity: usize, shared: Arc<dyn TtlCache>, ttl_store: Arc<dyn TtlCache>) -> Self {
        Self {
            process: ProcessCache::new(process_capacity),
            shared,
            ttl_store,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Drop the process tier, as happens when a request lands on another node.
    pub fn clear_process_cache(&self) {
        self.process.clear();
    }

    async fn read_tier(tier: &dyn TtlCache, key: &str) -> Option<StateData> {
        let raw = match tier.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(tier = tier.name(), key = %key, error = %e, "Cache tier read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str::<StateData>(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(tier = tier.name(), key = %key, error = %e, "Cached state is not a JSON object, treating as miss");
                None
            }
        }
    }

    fn write_lock(&self, key: &str) -> WriteLock {
        self.writers
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_write_lock(&self, key: &str, lock: WriteLock) {
        let mut writers = self.writers.lock();
        // Only the map and this caller hold it: nobody is queued behind us.
        if Arc::strong_count(&lock) == 2 {
            writers.remove(key);
        }
    }

    async fn write_tiers(&self, key: &str, data: &StateData) -> StorageResult<()> {
        let raw = serde_json::to_string(data)?;

        for tier in [&self.shared, &self.ttl_store] {
            if let Err(e) = tier.set(key, &raw).await {
                warn!(tier = tier.name(), key = %key, error = %e, "Cache tier write failed, evicting key");
                self.evict(key).await;
                return Err(e);
            }
        }

        self.process.insert(key, data.clone());
        Ok(())
    }

    async fn evict(&self, key: &str) {
        self.process.remove(key);
        for tier in [&self.shared, &self.ttl_store] {
            if let Err(e) = tier.delete(key).await {
                warn!(tier = tier.name(), key = %key, error = %e, "Cache tier evict failed");
            }
        }
    }

    #[cfg(test)]
    fn pending_writers(&self) -> usize {
        self.writers.lock().len()
    }
}

#[async_trait]
impl StateStorage for EphemeralStorage {
    async fn get(&self, session_id: &str, name: &str) -> StorageResult<Option<StateData>> {
        let key = storage_key(session_id, name);

        if let Some(data) = self.process.get(&key) {
            debug!(key = %key, tier = "process", "State cache hit");
            return Ok(Some(data));
        }

        for tier in [&self.shared, &self.ttl_store] {
            if let Some(data) = Self::read_tier(tier.as_ref(), &key).await {
                debug!(key = %key, tier = tier.name(), "State cache hit");
                self.process.insert(&key, data.clone());
                return Ok(Some(data));
            }
        }

        debug!(key = %key, "State cache miss");
        Ok(None)
    }

    async fn save(&self, session_id: &str, name: &str, data: &StateData) -> StorageResult<()> {
        let key = storage_key(session_id, name);

        let lock = self.write_lock(&key);
        let result = {
            let _turn = lock.lock().await;
            self.write_tiers(&key, data).await
        };
        self.release_write_lock(&key, lock);

        result
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Ephemeral
    }
}
