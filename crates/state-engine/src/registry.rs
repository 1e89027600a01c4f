//! The state registry: name -> (concrete type, declaration).
//!
//! Constructed explicitly and shared behind an `Arc`; nothing is process-global.
//! Registration validates the declaration against the type's field and method
//! tables so a bad manifest fails at startup rather than on first request.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use state_protocol_types::{ActionsMetadata, StateData};
use state_storage::{StateStorage, StorageBackends};
use tracing::{debug, info};

use crate::broadcast::StateBroadcaster;
use crate::change::{ChangeSink, NullSink};
use crate::declaration::{derive_state_name, DescriptorSource, StateDeclaration};
use crate::model::{StateModel, StateType};
use crate::proxy::StateProxy;
use crate::{EngineError, EngineResult};

/// One registered state.
pub struct RegistryEntry {
    pub name: String,
    pub type_ident: &'static str,
    pub declaration: Arc<StateDeclaration>,
    type_id: TypeId,
    factory: fn() -> Box<dyn StateModel>,
}

impl RegistryEntry {
    /// A default instance of the concrete type.
    pub fn instantiate(&self) -> Box<dyn StateModel> {
        (self.factory)()
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("type_ident", &self.type_ident)
            .field("declaration", &self.declaration)
            .finish()
    }
}

fn instantiate<T: StateType>() -> Box<dyn StateModel> {
    Box::new(T::default())
}

pub struct StateRegistry {
    entries: RwLock<HashMap<String, Arc<RegistryEntry>>>,
    source: Arc<dyn DescriptorSource>,
    backends: StorageBackends,
    sink: Arc<dyn ChangeSink>,
    broadcaster: Option<Arc<dyn StateBroadcaster>>,
}

impl StateRegistry {
    pub fn new(source: Arc<dyn DescriptorSource>, backends: StorageBackends) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            source,
            backends,
            sink: Arc::new(NullSink),
            broadcaster: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn StateBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Register a state type. Returns its state name.
    pub fn register<T: StateType>(&self) -> EngineResult<String> {
        let type_ident = T::type_ident();
        let declaration = self.source.declaration(type_ident).ok_or_else(|| {
            EngineError::Config(format!("no state declaration for type {}", type_ident))
        })?;

        validate::<T>(type_ident, &declaration)?;

        let name = declaration
            .descriptor
            .name
            .clone()
            .unwrap_or_else(|| derive_state_name(type_ident));

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&name) {
            if existing.type_id == TypeId::of::<T>() {
                debug!(state = %name, "State already registered");
                return Ok(name);
            }
            return Err(EngineError::Config(format!(
                "state name '{}' is already registered to {}, cannot register {}",
                name, existing.type_ident, type_ident
            )));
        }

        info!(
            state = %name,
            type_ident,
            persist = ?declaration.descriptor.persist,
            sync = declaration.descriptor.sync,
            actions = declaration.actions.len(),
            "Registered state"
        );

        entries.insert(
            name.clone(),
            Arc::new(RegistryEntry {
                name: name.clone(),
                type_ident,
                declaration: Arc::new(declaration),
                type_id: TypeId::of::<T>(),
                factory: instantiate::<T>,
            }),
        );
        Ok(name)
    }

    pub fn entry(&self, name: &str) -> EngineResult<Arc<RegistryEntry>> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::StateNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Registered state names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn backends(&self) -> &StorageBackends {
        &self.backends
    }

    pub fn sink(&self) -> &Arc<dyn ChangeSink> {
        &self.sink
    }

    pub fn broadcaster(&self) -> Option<&Arc<dyn StateBroadcaster>> {
        self.broadcaster.as_ref()
    }

    fn storage_for(&self, entry: &RegistryEntry) -> Option<&Arc<dyn StateStorage>> {
        self.backends.for_mode(entry.declaration.descriptor.persist)
    }

    /// Load a fresh proxy for `name` in `session_id`.
    ///
    /// `none` and `local` states start from the type's defaults.
    pub async fn open_state(self: &Arc<Self>, session_id: &str, name: &str) -> EngineResult<StateProxy> {
        let entry = self.entry(name)?;
        let mut instance = entry.instantiate();

        if let Some(storage) = self.storage_for(&entry) {
            match storage.get(session_id, name).await? {
                Some(data) => {
                    let applied = instance.apply(&data)?;
                    debug!(session_id = %session_id, state = %name, applied, "Loaded persisted state");
                }
                None => debug!(session_id = %session_id, state = %name, "No persisted state, using defaults"),
            }
        }

        Ok(StateProxy::new(
            entry.name.clone(),
            session_id.to_string(),
            Arc::clone(&entry.declaration),
            instance,
            Arc::clone(self),
        ))
    }

    /// Write a snapshot to the state's backend. No-op for `none` and `local`.
    pub async fn save_state(&self, session_id: &str, name: &str, data: &StateData) -> EngineResult<()> {
        let entry = self.entry(name)?;
        let Some(storage) = self.storage_for(&entry) else {
            return Ok(());
        };
        storage.save(session_id, name, data).await?;
        debug!(session_id = %session_id, state = %name, backend = storage.kind().as_str(), "State saved");
        Ok(())
    }

    /// `{state -> {action -> descriptor}}` for every registered state.
    pub fn actions_metadata(&self) -> ActionsMetadata {
        self.entries
            .read()
            .values()
            .map(|entry| (entry.name.clone(), entry.declaration.actions.clone()))
            .collect()
    }
}

fn validate<T: StateType>(type_ident: &str, declaration: &StateDeclaration) -> EngineResult<()> {
    let fields = T::default().capture().map_err(|e| {
        EngineError::Config(format!("state type {} cannot be serialized: {}", type_ident, e))
    })?;

    for field in &declaration.observable {
        if !fields.contains_key(field) {
            return Err(EngineError::Config(format!(
                "{}: observable field '{}' is not a field of the type",
                type_ident, field
            )));
        }
    }

    for computed in &declaration.computed {
        if !T::computations().contains(&computed.name.as_str()) {
            return Err(EngineError::Config(format!(
                "{}: computed '{}' is not provided by the type",
                type_ident, computed.name
            )));
        }
        if fields.contains_key(&computed.name) {
            return Err(EngineError::Config(format!(
                "{}: computed '{}' collides with a field",
                type_ident, computed.name
            )));
        }
    }

    for action in declaration.actions.keys() {
        if !T::methods().contains(&action.as_str()) {
            return Err(EngineError::Config(format!(
                "{}: action '{}' is not a method of the type",
                type_ident, action
            )));
        }
    }

    Ok(())
}
