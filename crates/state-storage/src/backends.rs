//! The set of backends a registry routes to, by persist mode.

use std::sync::Arc;
use std::time::Duration;

use state_config_and_utils::{Paths, StorageSettings};
use state_protocol_types::PersistMode;
use tracing::{info, warn};

use crate::cache::{MemoryTtlCache, RedisTtlCache, TtlCache};
use crate::{
    AsyncDatabase, ClientLocalStorage, DurableStorage, EphemeralStorage, StateStorage,
    StorageError, StorageResult,
};

/// One backend per server-side strategy.
#[derive(Clone)]
pub struct StorageBackends {
    pub session: Arc<dyn StateStorage>,
    pub database: Arc<dyn StateStorage>,
    pub local: Arc<dyn StateStorage>,
}

impl StorageBackends {
    pub fn new(
        session: Arc<dyn StateStorage>,
        database: Arc<dyn StateStorage>,
        local: Arc<dyn StateStorage>,
    ) -> Self {
        Self {
            session,
            database,
            local,
        }
    }

    /// Build backends from configuration. Redis backs the shared tier when a
    /// URL is configured; otherwise every tier lives in this process.
    pub async fn from_settings(settings: &StorageSettings, paths: &Paths) -> StorageResult<Self> {
        let ttl = Duration::from_secs(settings.cache_ttl_secs);

        let shared: Arc<dyn TtlCache> = match settings
            .redis_url()
            .map_err(|e| StorageError::Cache(e.to_string()))?
        {
            Some(url) => Arc::new(
                RedisTtlCache::connect(url.as_str(), settings.redis_key_prefix.clone(), ttl).await?,
            ),
            None => {
                warn!("No redis_url configured, shared state cache is process-local");
                Arc::new(MemoryTtlCache::new("shared", ttl))
            }
        };
        let ttl_store: Arc<dyn TtlCache> = Arc::new(MemoryTtlCache::new("ttl-store", ttl));

        let session = EphemeralStorage::new(settings.process_cache_capacity, shared, ttl_store);
        let database = DurableStorage::open(
            &settings.database_path(paths),
            Duration::from_secs(settings.session_ttl_secs),
        )
        .await?;

        info!(
            process_cache_capacity = settings.process_cache_capacity,
            cache_ttl_secs = settings.cache_ttl_secs,
            "State storage backends ready"
        );

        Ok(Self::new(
            Arc::new(session),
            Arc::new(database),
            Arc::new(ClientLocalStorage),
        ))
    }

    /// Fully in-process backends with an in-memory database.
    pub async fn in_memory() -> StorageResult<Self> {
        let ttl = Duration::from_secs(3600);
        let session = EphemeralStorage::new(
            256,
            Arc::new(MemoryTtlCache::new("shared", ttl)),
            Arc::new(MemoryTtlCache::new("ttl-store", ttl)),
        );
        let database = DurableStorage::with_database(
            AsyncDatabase::open_in_memory().await?,
            Duration::from_secs(24 * 60 * 60),
        );
        Ok(Self::new(
            Arc::new(session),
            Arc::new(database),
            Arc::new(ClientLocalStorage),
        ))
    }

    /// Backend for a persist mode. `None` for modes the server never stores.
    pub fn for_mode(&self, mode: PersistMode) -> Option<&Arc<dyn StateStorage>> {
        match mode {
            PersistMode::Session => Some(&self.session),
            PersistMode::Database => Some(&self.database),
            PersistMode::Local | PersistMode::None => None,
        }
    }

    /// Run `delete_expired` on every backend. Returns total rows removed.
    pub async fn sweep(&self) -> StorageResult<u64> {
        let mut removed = 0;
        for backend in [&self.session, &self.database, &self.local] {
            removed += backend.delete_expired().await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn routes_by_persist_mode() {
        let backends = StorageBackends::in_memory().await.unwrap();
        assert_eq!(
            backends.for_mode(PersistMode::Session).unwrap().kind(),
            StorageKind::Ephemeral
        );
        assert_eq!(
            backends.for_mode(PersistMode::Database).unwrap().kind(),
            StorageKind::Durable
        );
        assert!(backends.for_mode(PersistMode::Local).is_none());
        assert!(backends.for_mode(PersistMode::None).is_none());
    }

    #[tokio::test]
    async fn from_settings_without_redis_opens_database_under_paths() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let backends = StorageBackends::from_settings(&StorageSettings::default(), &paths)
            .await
            .unwrap();

        assert!(paths.database_file().exists());
        assert_eq!(backends.sweep().await.unwrap(), 0);
    }
}
