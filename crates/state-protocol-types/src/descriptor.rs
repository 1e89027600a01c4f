//! State and action descriptors.

use serde::{Deserialize, Serialize};

/// Where a state's data survives between requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistMode {
    /// Rebuilt from defaults on every request.
    #[default]
    None,
    /// Ephemeral cache tiers keyed by session.
    Session,
    /// Owned by the client; the server neither loads nor saves.
    Local,
    /// Durable table keyed by session.
    Database,
}

impl PersistMode {
    /// Whether the server reads and writes storage for this mode.
    pub fn is_server_backed(self) -> bool {
        matches!(self, PersistMode::Session | PersistMode::Database)
    }
}

/// Visibility scope of a state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Page,
    User,
    Global,
}

/// Immutable per-type metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDescriptor {
    #[serde(default)]
    pub persist: PersistMode,
    #[serde(default)]
    pub sync: bool,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Explicit state name; derived from the type identifier when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StateDescriptor {
    pub fn new(persist: PersistMode) -> Self {
        Self {
            persist,
            ..Default::default()
        }
    }

    pub fn synced(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Where an action executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    /// A local handler in the client; never reaches the server.
    Client,
    /// Round trip to the action endpoint.
    #[default]
    Server,
    /// Round trip to the action endpoint; the client does not treat it as UI-blocking.
    Background,
}

/// Immutable per-action metadata. Serialized as `{mode, debounce, confirm}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(default)]
    pub mode: ActionMode,
    #[serde(default, rename = "debounce")]
    pub debounce_ms: Option<u64>,
    #[serde(default, rename = "confirm")]
    pub confirm_prompt: Option<String>,
}

impl ActionDescriptor {
    pub fn server() -> Self {
        Self::default()
    }

    pub fn client() -> Self {
        Self {
            mode: ActionMode::Client,
            ..Default::default()
        }
    }

    pub fn background() -> Self {
        Self {
            mode: ActionMode::Background,
            ..Default::default()
        }
    }

    pub fn with_debounce(mut self, ms: u64) -> Self {
        self.debounce_ms = Some(ms);
        self
    }

    pub fn with_confirm(mut self, prompt: impl Into<String>) -> Self {
        self.confirm_prompt = Some(prompt.into());
        self
    }

    pub fn runs_on_server(&self) -> bool {
        self.mode != ActionMode::Client
    }
}

/// `state.action`, the key used for debounce slots and loading bindings.
pub fn action_key(state: &str, action: &str) -> String {
    format!("{}.{}", state, action)
}

/// Push channel for a state: the bare name for global scope, otherwise
/// suffixed with the session so one session's updates stay private.
pub fn channel_name(state: &str, scope: Scope, session_id: &str) -> String {
    match scope {
        Scope::Global => state.to_string(),
        Scope::User | Scope::Page => format!("{}:{}", state, session_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_descriptor_wire_shape() {
        let descriptor = ActionDescriptor::server()
            .with_debounce(300)
            .with_confirm("Empty the cart?");
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "mode": "server", "debounce": 300, "confirm": "Empty the cart?" })
        );
    }

    #[test]
    fn action_descriptor_defaults_when_fields_missing() {
        let descriptor: ActionDescriptor = serde_json::from_str("{}").unwrap();
        assert_eq!(descriptor.mode, ActionMode::Server);
        assert!(descriptor.debounce_ms.is_none());
        assert!(descriptor.confirm_prompt.is_none());
    }

    #[test]
    fn state_descriptor_parses_lowercase_modes() {
        let descriptor: StateDescriptor =
            serde_json::from_str(r#"{ "persist": "database", "sync": true, "scope": "global" }"#)
                .unwrap();
        assert_eq!(descriptor.persist, PersistMode::Database);
        assert!(descriptor.sync);
        assert_eq!(descriptor.scope, Scope::Global);
    }

    #[test]
    fn only_session_and_database_are_server_backed() {
        assert!(PersistMode::Session.is_server_backed());
        assert!(PersistMode::Database.is_server_backed());
        assert!(!PersistMode::Local.is_server_backed());
        assert!(!PersistMode::None.is_server_backed());
    }

    #[test]
    fn channel_names_by_scope() {
        assert_eq!(channel_name("stats", Scope::Global, "s1"), "stats");
        assert_eq!(channel_name("cart", Scope::User, "s1"), "cart:s1");
        assert_eq!(channel_name("form", Scope::Page, "s2"), "form:s2");
    }
}
