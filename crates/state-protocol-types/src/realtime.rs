//! Named events carried by the realtime push stream.

use serde::{Deserialize, Serialize};

use crate::StateData;

pub const STATE_UPDATED_EVENT: &str = "state_updated";
pub const ITEM_CREATED_EVENT: &str = "item_created";
pub const ITEM_UPDATED_EVENT: &str = "item_updated";
pub const HEARTBEAT_EVENT: &str = "heartbeat";

/// Data of a `state_updated` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub state: String,
    pub data: StateData,
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Full replacement of one state's client mirror.
    StateUpdated(StateUpdate),
    /// Domain object created. Payload is opaque beyond an identifying key.
    ItemCreated(serde_json::Value),
    /// Domain object updated.
    ItemUpdated(serde_json::Value),
    /// Liveness only.
    Heartbeat,
    /// Event name this client has no handler for.
    Other { name: String, data: String },
}

impl RealtimeEvent {
    pub fn state_updated(state: impl Into<String>, data: StateData) -> Self {
        RealtimeEvent::StateUpdated(StateUpdate {
            state: state.into(),
            data,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            RealtimeEvent::StateUpdated(_) => STATE_UPDATED_EVENT,
            RealtimeEvent::ItemCreated(_) => ITEM_CREATED_EVENT,
            RealtimeEvent::ItemUpdated(_) => ITEM_UPDATED_EVENT,
            RealtimeEvent::Heartbeat => HEARTBEAT_EVENT,
            RealtimeEvent::Other { name, .. } => name,
        }
    }

    /// Decode an event from its name and raw data line(s).
    pub fn decode(name: &str, data: &str) -> Result<Self, serde_json::Error> {
        match name {
            STATE_UPDATED_EVENT => Ok(RealtimeEvent::StateUpdated(serde_json::from_str(data)?)),
            ITEM_CREATED_EVENT => Ok(RealtimeEvent::ItemCreated(serde_json::from_str(data)?)),
            ITEM_UPDATED_EVENT => Ok(RealtimeEvent::ItemUpdated(serde_json::from_str(data)?)),
            HEARTBEAT_EVENT => Ok(RealtimeEvent::Heartbeat),
            other => Ok(RealtimeEvent::Other {
                name: other.to_string(),
                data: data.to_string(),
            }),
        }
    }

    /// Data line(s) for the wire. Heartbeats carry none.
    pub fn encode_data(&self) -> Result<String, serde_json::Error> {
        match self {
            RealtimeEvent::StateUpdated(update) => serde_json::to_string(update),
            RealtimeEvent::ItemCreated(value) | RealtimeEvent::ItemUpdated(value) => {
                serde_json::to_string(value)
            }
            RealtimeEvent::Heartbeat => Ok(String::new()),
            RealtimeEvent::Other { data, .. } => Ok(data.clone()),
        }
    }

    /// Render as a server-sent-events frame, terminated by a blank line.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        let data = self.encode_data()?;
        let mut frame = format!("event: {}\n", self.name());
        if data.is_empty() {
            frame.push_str("data:\n");
        } else {
            for line in data.lines() {
                frame.push_str("data: ");
                frame.push_str(line);
                frame.push('\n');
            }
        }
        frame.push('\n');
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_state_update() {
        let event =
            RealtimeEvent::decode("state_updated", r#"{"state":"cart","data":{"items":3}}"#)
                .unwrap();
        match event {
            RealtimeEvent::StateUpdated(update) => {
                assert_eq!(update.state, "cart");
                assert_eq!(update.data["items"], 3);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn heartbeat_ignores_data() {
        assert_eq!(
            RealtimeEvent::decode("heartbeat", "").unwrap(),
            RealtimeEvent::Heartbeat
        );
    }

    #[test]
    fn malformed_state_update_is_an_error() {
        assert!(RealtimeEvent::decode("state_updated", "{not json").is_err());
    }

    #[test]
    fn unknown_names_are_kept() {
        let event = RealtimeEvent::decode("presence", "{}").unwrap();
        assert_eq!(event.name(), "presence");
    }

    #[test]
    fn sse_frame_layout() {
        let mut data = StateData::new();
        data.insert("items".into(), json!(1));
        let frame = RealtimeEvent::state_updated("cart", data).to_sse_frame().unwrap();
        assert_eq!(
            frame,
            "event: state_updated\ndata: {\"state\":\"cart\",\"data\":{\"items\":1}}\n\n"
        );

        let frame = RealtimeEvent::Heartbeat.to_sse_frame().unwrap();
        assert_eq!(frame, "event: heartbeat\ndata:\n\n");
    }
}
