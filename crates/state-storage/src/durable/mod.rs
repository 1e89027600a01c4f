//! Durable backend for `persist = database`.
//!
//! One row per `(session_id, state_name)`; reads are point lookups and writes
//! are upserts. Rows outlive cache eviction and are only removed by the
//! maintenance sweep.

mod executor;
mod migrations;
pub mod queries;

pub use executor::AsyncDatabase;
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use queries::StateRecord;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use state_protocol_types::StateData;
use tracing::{debug, info};

use crate::{StateStorage, StorageKind, StorageResult};

/// SQLite-backed state storage.
#[derive(Clone)]
pub struct DurableStorage {
    db: AsyncDatabase,
    session_ttl: Duration,
}

impl DurableStorage {
    pub async fn open(path: &Path, session_ttl: Duration) -> StorageResult<Self> {
        Ok(Self::with_database(AsyncDatabase::open(path).await?, session_ttl))
    }

    pub fn with_database(db: AsyncDatabase, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    pub fn database(&self) -> &AsyncDatabase {
        &self.db
    }

    /// Raw row, including the stored timestamp.
    pub async fn record(&self, session_id: &str, name: &str) -> StorageResult<Option<StateRecord>> {
        let session_id = session_id.to_string();
        let name = name.to_string();
        self.db
            .call(move |conn| queries::get_record(conn, &session_id, &name))
            .await
    }

    /// Remove every row belonging to a session that no longer exists.
    pub async fn delete_session(&self, session_id: &str) -> StorageResult<u64> {
        let owned = session_id.to_string();
        let removed = self
            .db
            .call(move |conn| queries::delete_session(conn, &owned))
            .await?;
        info!(session_id = %session_id, removed, "Deleted session state");
        Ok(removed)
    }

    pub async fn count(&self) -> StorageResult<u64> {
        self.db.call(queries::count_records).await
    }
}

#[async_trait]
impl StateStorage for DurableStorage {
    async fn get(&self, session_id: &str, name: &str) -> StorageResult<Option<StateData>> {
        match self.record(session_id, name).await? {
            Some(record) => {
                let data: StateData = serde_json::from_slice(&record.data)?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session_id: &str, name: &str, data: &StateData) -> StorageResult<()> {
        let blob = serde_json::to_vec(data)?;
        let updated_at = queries::timestamp(Utc::now());
        let session = session_id.to_string();
        let state = name.to_string();
        self.db
            .call(move |conn| queries::upsert_record(conn, &session, &state, &blob, &updated_at))
            .await?;
        debug!(session_id = %session_id, state = %name, "Durable state saved");
        Ok(())
    }

    async fn delete_expired(&self) -> StorageResult<u64> {
        let ttl = chrono::Duration::from_std(self.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let cutoff = queries::timestamp(Utc::now() - ttl);
        let removed = self
            .db
            .call(move |conn| queries::delete_older_than(conn, &cutoff))
            .await?;
        info!(removed, ttl_secs = self.session_ttl.as_secs(), "Expired durable state swept");
        Ok(removed)
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Durable
    }
}
