//! Change notifications for observable writes.
//!
//! The proxy emits; the sink decides what a change means.

use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub state: String,
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// Receives every observable mutation.
pub trait ChangeSink: Send + Sync {
    fn emit(&self, change: StateChange);
}

/// Discards all changes.
#[derive(Debug, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {
    fn emit(&self, _change: StateChange) {}
}

/// Logs each change at debug level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ChangeSink for TracingSink {
    fn emit(&self, change: StateChange) {
        debug!(
            state = %change.state,
            field = %change.field,
            old = %change.old,
            new = %change.new,
            "State field changed"
        );
    }
}

/// Records all changes for testing.
#[derive(Debug, Default)]
pub struct RecordingSink {
    changes: std::sync::Mutex<Vec<StateChange>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<StateChange> {
        self.changes.lock().expect("lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.changes.lock().expect("lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.changes.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeSink for RecordingSink {
    fn emit(&self, change: StateChange) {
        self.changes.lock().expect("lock poisoned").push(change);
    }
}
