//! Action dispatch wire contract.
//!
//! Request: `{state, action, payload}` with CSRF and session headers.
//! Response: `{success, state?, result?, error?}`.

use serde::{Deserialize, Serialize};

use crate::StateData;

/// Header carrying the CSRF / nonce token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";
/// Header carrying the session identifier.
pub const SESSION_HEADER: &str = "X-Session-Id";

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Body of an action dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub state: String,
    pub action: String,
    #[serde(default = "empty_object")]
    pub payload: serde_json::Value,
}

impl ActionRequest {
    pub fn new(
        state: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            state: state.into(),
            action: action.into(),
            payload,
        }
    }
}

/// Result of an action dispatch.
///
/// On success `state` is the full authoritative snapshot and `result` the action's
/// return value. On failure only `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok(state: StateData, result: serde_json::Value) -> Self {
        Self {
            success: true,
            state: Some(state),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            state: None,
            result: None,
            error: Some(error.into()),
        }
    }
}
