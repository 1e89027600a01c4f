//! Types shared between the state engine (server) and the state client.
//!
//! - [`descriptor`] - per-state and per-action metadata
//! - [`wire`] - action dispatch request/response
//! - [`hydration`] - the one-shot page-load snapshot
//! - [`realtime`] - push-stream events and their SSE framing

pub mod descriptor;
pub mod hydration;
pub mod realtime;
pub mod wire;

pub use descriptor::{
    action_key, channel_name, ActionDescriptor, ActionMode, PersistMode, Scope, StateDescriptor,
};
pub use hydration::{ActionsMetadata, HydrationPayload, HYDRATION_ELEMENT_ID};
pub use realtime::{RealtimeEvent, StateUpdate};
pub use wire::{ActionRequest, ActionResponse, CSRF_HEADER, SESSION_HEADER};

/// Serialized state: field name to JSON value.
pub type StateData = serde_json::Map<String, serde_json::Value>;
