//! UI binding targets.
//!
//! Bindings are opaque `(state, key)` and `state.action` selectors the store
//! writes into. Rendering is not this crate's concern.

use serde_json::Value;
use state_protocol_types::{RealtimeEvent, StateData};

pub trait BindingSink: Send + Sync {
    /// One field changed locally.
    fn apply_field(&self, state: &str, key: &str, value: &Value);

    /// A whole state was replaced; re-apply every binding for it.
    fn apply_state(&self, state: &str, data: &StateData);

    /// Loading indicator for `state.action`.
    fn set_loading(&self, action_key: &str, loading: bool);

    /// A domain event (item created or updated) for targeted refresh.
    fn refresh_item(&self, _event: &RealtimeEvent) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBindings;

impl BindingSink for NoopBindings {
    fn apply_field(&self, _state: &str, _key: &str, _value: &Value) {}

    fn apply_state(&self, _state: &str, _data: &StateData) {}

    fn set_loading(&self, _action_key: &str, _loading: bool) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindingUpdate {
    Field { state: String, key: String, value: Value },
    State { state: String, data: StateData },
    Loading { action_key: String, loading: bool },
    Item { event: RealtimeEvent },
}

/// Records all binding updates for testing.
#[derive(Debug, Default)]
pub struct RecordingBindings {
    updates: std::sync::Mutex<Vec<BindingUpdate>>,
}

impl RecordingBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<BindingUpdate> {
        self.updates.lock().expect("lock poisoned").clone()
    }

    /// Loading transitions for one action key, in order.
    pub fn loading_transitions(&self, action_key: &str) -> Vec<bool> {
        self.updates()
            .into_iter()
            .filter_map(|update| match update {
                BindingUpdate::Loading { action_key: key, loading } if key == action_key => {
                    Some(loading)
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.updates.lock().expect("lock poisoned").clear();
    }

    fn push(&self, update: BindingUpdate) {
        self.updates.lock().expect("lock poisoned").push(update);
    }
}

impl BindingSink for RecordingBindings {
    fn apply_field(&self, state: &str, key: &str, value: &Value) {
        self.push(BindingUpdate::Field {
            state: state.to_string(),
            key: key.to_string(),
            value: value.clone(),
        });
    }

    fn apply_state(&self, state: &str, data: &StateData) {
        self.push(BindingUpdate::State {
            state: state.to_string(),
            data: data.clone(),
        });
    }

    fn set_loading(&self, action_key: &str, loading: bool) {
        self.push(BindingUpdate::Loading {
            action_key: action_key.to_string(),
            loading,
        });
    }

    fn refresh_item(&self, event: &RealtimeEvent) {
        self.push(BindingUpdate::Item {
            event: event.clone(),
        });
    }
}
