//! Read/write counters around any backend.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use state_protocol_types::StateData;

use crate::{StateStorage, StorageKind, StorageResult};

pub struct CountingStorage<S> {
    inner: S,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl<S: StateStorage> CountingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Attempted saves, successful or not.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: StateStorage> StateStorage for CountingStorage<S> {
    async fn get(&self, session_id: &str, name: &str) -> StorageResult<Option<StateData>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(session_id, name).await
    }

    async fn save(&self, session_id: &str, name: &str, data: &StateData) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save(session_id, name, data).await
    }

    async fn delete_expired(&self) -> StorageResult<u64> {
        self.inner.delete_expired().await
    }

    fn kind(&self) -> StorageKind {
        self.inner.kind()
    }
}
