//! Per-request view of the registry.
//!
//! A context is bound to one session. It caches the proxies it opens so every
//! `get_state` for the same name within a request sees the same instance, and
//! it remembers which states were loaded so hydration only includes those.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use state_protocol_types::{HydrationPayload, StateData};
use tracing::{debug, warn};

use crate::proxy::StateProxy;
use crate::registry::StateRegistry;
use crate::{EngineError, EngineResult};

/// A proxy shared by the handlers of one request.
pub type SharedProxy = Arc<tokio::sync::Mutex<StateProxy>>;

pub struct RequestContext {
    registry: Arc<StateRegistry>,
    session_id: String,
    loaded: Mutex<HashMap<String, SharedProxy>>,
    hydration_emitted: AtomicBool,
}

impl RequestContext {
    pub fn new(registry: Arc<StateRegistry>, session_id: impl Into<String>) -> Self {
        Self {
            registry,
            session_id: session_id.into(),
            loaded: Mutex::new(HashMap::new()),
            hydration_emitted: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<StateRegistry> {
        &self.registry
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Load (first use) or return the already loaded proxy for `name`.
    pub async fn get_state(&self, name: &str) -> EngineResult<SharedProxy> {
        let existing = self.loaded.lock().get(name).cloned();
        if let Some(proxy) = existing {
            return Ok(proxy);
        }

        let proxy = self.registry.open_state(&self.session_id, name).await?;
        let mut loaded = self.loaded.lock();
        let shared = loaded
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(proxy)));
        Ok(Arc::clone(shared))
    }

    /// Names loaded so far in this request.
    pub fn loaded_states(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn loaded_proxies(&self) -> Vec<(String, SharedProxy)> {
        self.loaded
            .lock()
            .iter()
            .map(|(name, proxy)| (name.clone(), Arc::clone(proxy)))
            .collect()
    }

    /// Snapshots of every loaded `sync = true` state.
    pub async fn hydration_data(&self) -> EngineResult<BTreeMap<String, StateData>> {
        let mut states = BTreeMap::new();
        for (name, proxy) in self.loaded_proxies() {
            let mut proxy = proxy.lock().await;
            if !proxy.descriptor().sync {
                continue;
            }
            states.insert(name, proxy.snapshot()?);
        }
        Ok(states)
    }

    pub async fn hydration_payload(&self) -> EngineResult<HydrationPayload> {
        Ok(HydrationPayload::new(
            self.hydration_data().await?,
            self.registry.actions_metadata(),
        ))
    }

    /// The hydration `<script>` element, once per request. Later calls return `None`.
    pub async fn embed_hydration(&self) -> EngineResult<Option<String>> {
        if self.hydration_emitted.swap(true, Ordering::SeqCst) {
            debug!(session_id = %self.session_id, "Hydration already embedded");
            return Ok(None);
        }

        let rendered = match self.hydration_payload().await {
            Ok(payload) => payload.to_script_tag().map_err(EngineError::from),
            Err(e) => Err(e),
        };
        match rendered {
            Ok(tag) => Ok(Some(tag)),
            Err(e) => {
                self.hydration_emitted.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Persist every dirty proxy. Returns how many were written.
    pub async fn persist_all(&self) -> EngineResult<usize> {
        let mut written = 0;
        for (name, proxy) in self.loaded_proxies() {
            match proxy.lock().await.persist().await {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(session_id = %self.session_id, state = %name, error = %e, "End-of-request persist failed");
                    return Err(e);
                }
            }
        }
        Ok(written)
    }
}
