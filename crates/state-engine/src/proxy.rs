//! A live, wrapped state instance.
//!
//! Invariants:
//! - every observable write sets `dirty` and clears the whole computed cache
//! - `persist()` writes nothing unless dirty
//! - an action that fails, or whose persist fails, leaves the instance, the
//!   cache and the dirty flag as they were before the call

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use state_protocol_types::{StateData, StateDescriptor};
use tracing::{debug, warn};

use crate::change::StateChange;
use crate::declaration::StateDeclaration;
use crate::model::StateModel;
use crate::registry::StateRegistry;
use crate::EngineResult;

pub struct StateProxy {
    name: String,
    session_id: String,
    declaration: Arc<StateDeclaration>,
    instance: Box<dyn StateModel>,
    computed_cache: HashMap<String, Value>,
    dirty: bool,
    registry: Arc<StateRegistry>,
}

impl StateProxy {
    pub(crate) fn new(
        name: String,
        session_id: String,
        declaration: Arc<StateDeclaration>,
        instance: Box<dyn StateModel>,
        registry: Arc<StateRegistry>,
    ) -> Self {
        Self {
            name,
            session_id,
            declaration,
            instance,
            computed_cache: HashMap::new(),
            dirty: false,
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn descriptor(&self) -> &StateDescriptor {
        &self.declaration.descriptor
    }

    pub fn declaration(&self) -> &StateDeclaration {
        &self.declaration
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a computed value is currently memoized.
    pub fn is_cached(&self, name: &str) -> bool {
        self.computed_cache.contains_key(name)
    }

    /// Read a field or computed value. Absent values read as `null`.
    pub fn get(&mut self, field: &str) -> Value {
        if self.declaration.computed_spec(field).is_some() {
            return self.computed(field).unwrap_or(Value::Null);
        }
        match self.instance.read_field(field) {
            Ok(value) => value.unwrap_or(Value::Null),
            Err(e) => {
                warn!(state = %self.name, field = %field, error = %e, "Field read failed");
                Value::Null
            }
        }
    }

    fn computed(&mut self, name: &str) -> Option<Value> {
        let cached = self.declaration.computed_spec(name)?.cached;
        if cached {
            if let Some(value) = self.computed_cache.get(name) {
                return Some(value.clone());
            }
        }
        let value = self.instance.compute_value(name)?;
        if cached {
            self.computed_cache.insert(name.to_string(), value.clone());
        }
        Some(value)
    }

    /// Write through to the instance. Observable fields also mark dirty,
    /// invalidate computed values and emit a change.
    pub fn set(&mut self, field: &str, value: Value) -> EngineResult<()> {
        let old = self.instance.read_field(field)?.unwrap_or(Value::Null);
        self.instance.write_field(field, value.clone())?;

        if self.declaration.is_observable(field) {
            self.dirty = true;
            self.computed_cache.clear();
            self.registry.sink().emit(StateChange {
                state: self.name.clone(),
                field: field.to_string(),
                old,
                new: value,
            });
        }
        Ok(())
    }

    /// Call a method. Declared actions always mark dirty and persist.
    pub async fn call(&mut self, method: &str, args: Value) -> EngineResult<Value> {
        if self.declaration.actions.contains_key(method) {
            return self.run_action(method, args).await;
        }
        Ok(self.instance.call_method(method, &args)?)
    }

    async fn run_action(&mut self, action: &str, args: Value) -> EngineResult<Value> {
        let before = self.instance.capture()?;
        let was_dirty = self.dirty;

        let result = match self.instance.call_method(action, &args) {
            Ok(result) => result,
            Err(e) => {
                warn!(state = %self.name, action = %action, error = %e, "Action failed");
                self.roll_back(before, was_dirty);
                return Err(e.into());
            }
        };

        self.dirty = true;
        self.computed_cache.clear();

        if let Err(e) = self.persist().await {
            warn!(state = %self.name, action = %action, error = %e, "Persist after action failed, rolling back");
            self.roll_back(before, was_dirty);
            return Err(e);
        }

        self.emit_diff(&before);
        debug!(session_id = %self.session_id, state = %self.name, action = %action, "Action completed");
        Ok(result)
    }

    fn roll_back(&mut self, before: StateData, was_dirty: bool) {
        if let Err(e) = self.instance.restore(before) {
            warn!(state = %self.name, error = %e, "Failed to restore state after action");
        }
        self.computed_cache.clear();
        self.dirty = was_dirty;
    }

    fn emit_diff(&self, before: &StateData) {
        let after = match self.instance.capture() {
            Ok(after) => after,
            Err(e) => {
                warn!(state = %self.name, error = %e, "Failed to capture state after action");
                return;
            }
        };
        for field in &self.declaration.observable {
            let old = before.get(field).cloned().unwrap_or(Value::Null);
            let new = after.get(field).cloned().unwrap_or(Value::Null);
            if old != new {
                self.registry.sink().emit(StateChange {
                    state: self.name.clone(),
                    field: field.clone(),
                    old,
                    new,
                });
            }
        }
    }

    /// Observable fields by value plus every computed value. This is the
    /// shape stored and hydrated.
    pub fn snapshot(&mut self) -> EngineResult<StateData> {
        let fields = self.instance.capture()?;
        let mut snapshot = StateData::new();
        for field in &self.declaration.observable {
            snapshot.insert(
                field.clone(),
                fields.get(field).cloned().unwrap_or(Value::Null),
            );
        }
        let declaration = Arc::clone(&self.declaration);
        for computed in &declaration.computed {
            let value = self.computed(&computed.name).unwrap_or(Value::Null);
            snapshot.insert(computed.name.clone(), value);
        }
        Ok(snapshot)
    }

    /// Save through the registry if dirty. Returns whether a write happened.
    pub async fn persist(&mut self) -> EngineResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let snapshot = self.snapshot()?;
        self.registry
            .save_state(&self.session_id, &self.name, &snapshot)
            .await?;
        self.dirty = false;
        Ok(true)
    }
}

impl std::fmt::Debug for StateProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProxy")
            .field("name", &self.name)
            .field("session_id", &self.session_id)
            .field("dirty", &self.dirty)
            .field("cached", &self.computed_cache.len())
            .finish()
    }
}
