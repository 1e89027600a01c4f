//! Hydration payload embedded once per page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ActionDescriptor, StateData};

/// DOM id of the `<script>` element carrying the payload.
pub const HYDRATION_ELEMENT_ID: &str = "state-sync-hydration";

/// `state name -> action name -> descriptor`.
pub type ActionsMetadata = BTreeMap<String, BTreeMap<String, ActionDescriptor>>;

/// `{states: {name: data}, actions: {name: {action: {mode, debounce, confirm}}}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HydrationPayload {
    #[serde(default)]
    pub states: BTreeMap<String, StateData>,
    #[serde(default)]
    pub actions: ActionsMetadata,
}

impl HydrationPayload {
    pub fn new(states: BTreeMap<String, StateData>, actions: ActionsMetadata) -> Self {
        Self { states, actions }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Render as an inert JSON script element.
    ///
    /// `</` is escaped so string values cannot close the element early.
    pub fn to_script_tag(&self) -> Result<String, serde_json::Error> {
        let json = self.to_json()?.replace("</", "<\\/");
        Ok(format!(
            r#"<script type="application/json" id="{}">{}</script>"#,
            HYDRATION_ELEMENT_ID, json
        ))
    }
}
