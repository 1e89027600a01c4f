//! Backend for `persist = local`: the client owns persistence, the server keeps nothing.

use async_trait::async_trait;
use state_protocol_types::StateData;

use crate::{StateStorage, StorageKind, StorageResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientLocalStorage;

#[async_trait]
impl StateStorage for ClientLocalStorage {
    async fn get(&self, _session_id: &str, _name: &str) -> StorageResult<Option<StateData>> {
        Ok(None)
    }

    async fn save(&self, _session_id: &str, _name: &str, _data: &StateData) -> StorageResult<()> {
        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::ClientLocal
    }
}
