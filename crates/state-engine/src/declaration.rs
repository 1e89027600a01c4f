//! State declarations and where they come from.
//!
//! A declaration is the already-parsed metadata for one state type: its
//! descriptor, which fields are observable, which computed values exist and
//! whether they are cached, and the declared actions.
//!
//! Manifest files are JSON objects keyed by type identifier:
//!
//! ```json
//! {
//!   "CartState": {
//!     "persist": "session",
//!     "sync": true,
//!     "scope": "user",
//!     "observable": ["items"],
//!     "computed": [{ "name": "total", "cached": true }],
//!     "actions": { "add_item": { "mode": "server", "debounce": 250 } }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use state_protocol_types::{ActionDescriptor, StateDescriptor};
use tracing::info;

use crate::{EngineError, EngineResult, StateType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedSpec {
    pub name: String,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDeclaration {
    #[serde(flatten)]
    pub descriptor: StateDescriptor,
    /// Fields included in snapshots, persistence and hydration.
    #[serde(default)]
    pub observable: Vec<String>,
    #[serde(default)]
    pub computed: Vec<ComputedSpec>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDescriptor>,
}

impl StateDeclaration {
    pub fn new(descriptor: StateDescriptor) -> Self {
        Self {
            descriptor,
            ..Default::default()
        }
    }

    pub fn observe<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observable.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn computed(mut self, name: impl Into<String>, cached: bool) -> Self {
        self.computed.push(ComputedSpec {
            name: name.into(),
            cached,
        });
        self
    }

    pub fn action(mut self, name: impl Into<String>, descriptor: ActionDescriptor) -> Self {
        self.actions.insert(name.into(), descriptor);
        self
    }

    pub fn is_observable(&self, field: &str) -> bool {
        self.observable.iter().any(|f| f == field)
    }

    pub fn computed_spec(&self, name: &str) -> Option<&ComputedSpec> {
        self.computed.iter().find(|c| c.name == name)
    }
}

/// Supplies declarations by type identifier.
pub trait DescriptorSource: Send + Sync {
    fn declaration(&self, type_ident: &str) -> Option<StateDeclaration>;
}

/// Declarations built in code or read from a manifest.
#[derive(Debug, Clone, Default)]
pub struct StaticDescriptorSource {
    declarations: HashMap<String, StateDeclaration>,
}

impl StaticDescriptorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_ident: impl Into<String>, declaration: StateDeclaration) {
        self.declarations.insert(type_ident.into(), declaration);
    }

    /// Builder form keyed by the state type's identifier.
    pub fn with<T: StateType>(mut self, declaration: StateDeclaration) -> Self {
        self.insert(T::type_ident(), declaration);
        self
    }

    pub fn from_json_str(raw: &str) -> EngineResult<Self> {
        let declarations: HashMap<String, StateDeclaration> = serde_json::from_str(raw)
            .map_err(|e| EngineError::Config(format!("invalid state manifest: {}", e)))?;
        Ok(Self { declarations })
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let source = Self::from_json_str(&raw)?;
        info!(path = %path.display(), states = source.len(), "Loaded state manifest");
        Ok(source)
    }

    pub fn type_idents(&self) -> Vec<&str> {
        let mut idents: Vec<&str> = self.declarations.keys().map(String::as_str).collect();
        idents.sort_unstable();
        idents
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl DescriptorSource for StaticDescriptorSource {
    fn declaration(&self, type_ident: &str) -> Option<StateDeclaration> {
        self.declarations.get(type_ident).cloned()
    }
}

/// `CartState` -> `cart`, `UserProfileState` -> `userProfile`.
pub fn derive_state_name(type_ident: &str) -> String {
    let stem = match type_ident.strip_suffix("State") {
        Some(stem) if !stem.is_empty() => stem,
        _ => type_ident,
    };
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
