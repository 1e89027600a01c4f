//! Storage trait definitions.

use async_trait::async_trait;
use state_protocol_types::StateData;

use crate::StorageResult;

/// Which strategy a backend implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Ephemeral,
    Durable,
    ClientLocal,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Ephemeral => "ephemeral",
            StorageKind::Durable => "durable",
            StorageKind::ClientLocal => "client-local",
        }
    }
}

/// Pluggable persistence keyed by `(session id, state name)`.
///
/// Both identifiers are assumed to be sanitized by the caller.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Load a state's snapshot. `None` means no prior state.
    async fn get(&self, session_id: &str, name: &str) -> StorageResult<Option<StateData>>;

    /// Store a state's snapshot, replacing any previous one.
    async fn save(&self, session_id: &str, name: &str, data: &StateData) -> StorageResult<()>;

    /// Remove records whose owning session has expired. Returns rows removed.
    ///
    /// Backends that expire on their own return 0.
    async fn delete_expired(&self) -> StorageResult<u64> {
        Ok(0)
    }

    fn kind(&self) -> StorageKind;
}

#[async_trait]
impl<S: StateStorage + ?Sized> StateStorage for std::sync::Arc<S> {
    async fn get(&self, session_id: &str, name: &str) -> StorageResult<Option<StateData>> {
        (**self).get(session_id, name).await
    }

    async fn save(&self, session_id: &str, name: &str, data: &StateData) -> StorageResult<()> {
        (**self).save(session_id, name, data).await
    }

    async fn delete_expired(&self) -> StorageResult<u64> {
        (**self).delete_expired().await
    }

    fn kind(&self) -> StorageKind {
        (**self).kind()
    }
}

/// `session_id:name`
pub fn storage_key(session_id: &str, name: &str) -> String {
    format!("{}:{}", session_id, name)
}
