//! Client State Store.
//!
//! In-memory mirror of server state, keyed by state name. Written by local
//! `set`, by action responses and by realtime pushes. Server-backed mutation
//! only ever goes through [`ClientStateStore::action`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use state_protocol_types::{
    action_key, ActionDescriptor, ActionMode, ActionRequest, ActionsMetadata, HydrationPayload,
    RealtimeEvent, StateData,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::bindings::{BindingSink, NoopBindings};
use crate::confirm::{AlwaysConfirm, ConfirmPrompt};
use crate::transport::ActionTransport;
use crate::{ClientError, ClientResult};

/// What a subscriber receives on every change.
///
/// `key` is `None` when the whole state was replaced (action response or
/// realtime push); `new_value` is then the full new object.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotice {
    pub state_name: String,
    pub key: Option<String>,
    pub new_value: Value,
    pub old_value: Value,
    pub state: StateData,
}

/// How an `action()` call ended without an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The action ran (locally or on the server) and returned this value.
    Completed { result: Value },
    /// The user declined the confirmation prompt.
    Declined,
    /// Client-mode action with no registered handler.
    NoHandler,
}

impl ActionOutcome {
    pub fn result(&self) -> Option<&Value> {
        match self {
            ActionOutcome::Completed { result } => Some(result),
            _ => None,
        }
    }
}

type Listener = Arc<dyn Fn(&ChangeNotice) + Send + Sync>;

/// Local handler for a client-mode action.
pub type LocalHandler = Arc<dyn Fn(&ClientStateStore, Value) -> Value + Send + Sync>;

type Waiter = oneshot::Sender<ClientResult<ActionOutcome>>;

#[derive(Default)]
struct DebounceSlot {
    generation: u64,
    waiters: Vec<Waiter>,
    timer: Option<JoinHandle<()>>,
}

struct StoreInner {
    states: RwLock<HashMap<String, StateData>>,
    actions: RwLock<ActionsMetadata>,
    listeners: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
    next_listener_id: AtomicU64,
    handlers: RwLock<HashMap<String, LocalHandler>>,
    pending: Mutex<HashMap<String, usize>>,
    debounce: Mutex<HashMap<String, DebounceSlot>>,
    queues: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    hydrated: AtomicBool,
    transport: Arc<dyn ActionTransport>,
    confirm: Arc<dyn ConfirmPrompt>,
    bindings: Arc<dyn BindingSink>,
}

/// Browser-side state mirror. Cheap to clone; clones share one store.
#[derive(Clone)]
pub struct ClientStateStore {
    inner: Arc<StoreInner>,
}

impl ClientStateStore {
    /// Store with no confirmation UI and no bindings.
    pub fn new(transport: Arc<dyn ActionTransport>) -> Self {
        Self::with_parts(transport, Arc::new(AlwaysConfirm), Arc::new(NoopBindings))
    }

    pub fn with_parts(
        transport: Arc<dyn ActionTransport>,
        confirm: Arc<dyn ConfirmPrompt>,
        bindings: Arc<dyn BindingSink>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                states: RwLock::new(HashMap::new()),
                actions: RwLock::new(ActionsMetadata::new()),
                listeners: Mutex::new(HashMap::new()),
                next_listener_id: AtomicU64::new(1),
                handlers: RwLock::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                debounce: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
                hydrated: AtomicBool::new(false),
                transport,
                confirm,
                bindings,
            }),
        }
    }

    pub fn bindings(&self) -> &Arc<dyn BindingSink> {
        &self.inner.bindings
    }

    // =========================================================================
    // Hydration
    // =========================================================================

    /// Load the embedded hydration payload. Only the first call has any effect.
    ///
    /// A malformed payload is logged and leaves the store empty; it never
    /// fails the page. Returns whether state was loaded.
    pub fn hydrate(&self, raw: &str) -> bool {
        if self.inner.hydrated.swap(true, Ordering::SeqCst) {
            debug!("Store already hydrated, ignoring payload");
            return false;
        }

        match HydrationPayload::from_json(raw) {
            Ok(payload) => {
                self.load_payload(payload);
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to parse hydration payload, starting empty");
                false
            }
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.inner.hydrated.load(Ordering::SeqCst)
    }

    fn load_payload(&self, payload: HydrationPayload) {
        let state_count = payload.states.len();
        *self.inner.actions.write() = payload.actions;

        for (name, data) in payload.states {
            self.inner.bindings.apply_state(&name, &data);
            self.inner.states.write().insert(name, data);
        }

        info!(states = state_count, "Hydrated client state");
    }

    // =========================================================================
    // Reads and local writes
    // =========================================================================

    /// Whole state object, or `None` for an unknown state.
    pub fn get(&self, state: &str) -> Option<StateData> {
        self.inner.states.read().get(state).cloned()
    }

    /// One field, or `None` when the state or the field is unknown.
    pub fn get_field(&self, state: &str, key: &str) -> Option<Value> {
        self.inner
            .states
            .read()
            .get(state)
            .and_then(|data| data.get(key))
            .cloned()
    }

    pub fn state_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.states.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Local-only optimistic write. Never reaches the server.
    pub fn set(&self, state: &str, key: &str, value: Value) {
        let (old_value, snapshot) = {
            let mut states = self.inner.states.write();
            let data = states.entry(state.to_string()).or_default();
            let old = data.insert(key.to_string(), value.clone());
            (old.unwrap_or(Value::Null), data.clone())
        };

        self.inner.bindings.apply_field(state, key, &value);
        self.notify(ChangeNotice {
            state_name: state.to_string(),
            key: Some(key.to_string()),
            new_value: value,
            old_value,
            state: snapshot,
        });
    }

    /// Replace a whole state with an authoritative snapshot. Not a merge.
    pub fn replace_state(&self, state: &str, data: StateData) {
        let previous = self
            .inner
            .states
            .write()
            .insert(state.to_string(), data.clone());

        self.inner.bindings.apply_state(state, &data);
        self.notify(ChangeNotice {
            state_name: state.to_string(),
            key: None,
            new_value: Value::Object(data.clone()),
            old_value: previous.map(Value::Object).unwrap_or(Value::Null),
            state: data,
        });
    }

    /// Apply one decoded realtime event.
    pub fn apply_realtime_event(&self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::StateUpdated(update) => {
                debug!(state = %update.state, "Realtime state update");
                self.replace_state(&update.state, update.data);
            }
            item @ (RealtimeEvent::ItemCreated(_) | RealtimeEvent::ItemUpdated(_)) => {
                self.inner.bindings.refresh_item(&item);
            }
            RealtimeEvent::Heartbeat => trace!("Realtime heartbeat"),
            RealtimeEvent::Other { name, .. } => {
                debug!(event = %name, "Ignoring unhandled realtime event");
            }
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register a listener for one state. The listener lives as long as the
    /// returned [`Subscription`].
    #[must_use = "dropping the subscription removes the listener"]
    pub fn subscribe<F>(&self, state: &str, callback: F) -> Subscription
    where
        F: Fn(&ChangeNotice) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .entry(state.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            store: Arc::downgrade(&self.inner),
            state: state.to_string(),
            id,
        }
    }

    pub fn listener_count(&self, state: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .get(state)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn notify(&self, notice: ChangeNotice) {
        // Listeners may touch the store, so call them with no lock held.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .get(&notice.state_name)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in listeners {
            listener(&notice);
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Register the local handler for a client-mode action.
    pub fn register_handler<F>(&self, state: &str, action: &str, handler: F)
    where
        F: Fn(&ClientStateStore, Value) -> Value + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .write()
            .insert(action_key(state, action), Arc::new(handler));
    }

    pub fn action_descriptor(&self, state: &str, action: &str) -> Option<ActionDescriptor> {
        self.inner
            .actions
            .read()
            .get(state)
            .and_then(|actions| actions.get(action))
            .cloned()
    }

    /// Whether a server dispatch for `state.action` is in flight or queued.
    pub fn is_pending(&self, state: &str, action: &str) -> bool {
        self.inner
            .pending
            .lock()
            .contains_key(&action_key(state, action))
    }

    /// Run a declared action.
    ///
    /// Client-mode actions call the local handler. Everything else goes
    /// through confirmation, debounce and a server round trip whose snapshot
    /// replaces the local state. On failure the local state is untouched.
    pub async fn action(
        &self,
        state: &str,
        action: &str,
        payload: Value,
    ) -> ClientResult<ActionOutcome> {
        let Some(descriptor) = self.action_descriptor(state, action) else {
            error!(state = %state, action = %action, "Unknown action");
            return Err(ClientError::UnknownAction {
                state: state.to_string(),
                action: action.to_string(),
            });
        };

        if descriptor.mode == ActionMode::Client {
            return Ok(self.run_local(state, action, payload));
        }

        if let Some(prompt) = descriptor.confirm_prompt.as_deref() {
            if !self.inner.confirm.confirm(prompt).await {
                info!(state = %state, action = %action, "Action declined");
                return Ok(ActionOutcome::Declined);
            }
        }

        let loading = descriptor.mode != ActionMode::Background;
        match descriptor.debounce_ms {
            Some(ms) if ms > 0 => {
                self.debounced(state, action, payload, loading, Duration::from_millis(ms))
                    .await
            }
            _ => self
                .dispatch(state, action, payload, loading)
                .await
                .map(|result| ActionOutcome::Completed { result }),
        }
    }

    fn run_local(&self, state: &str, action: &str, payload: Value) -> ActionOutcome {
        let handler = self
            .inner
            .handlers
            .read()
            .get(&action_key(state, action))
            .cloned();

        match handler {
            Some(handler) => ActionOutcome::Completed {
                result: handler(self, payload),
            },
            None => {
                warn!(state = %state, action = %action, "No local handler for client action");
                ActionOutcome::NoHandler
            }
        }
    }

    /// Coalesce calls to one action key. Each call restarts the timer; when
    /// it fires, the last payload is sent and every waiting caller gets that
    /// one outcome.
    async fn debounced(
        &self,
        state: &str,
        action: &str,
        payload: Value,
        loading: bool,
        delay: Duration,
    ) -> ClientResult<ActionOutcome> {
        let key = action_key(state, action);
        let (tx, rx) = oneshot::channel();

        {
            let mut slots = self.inner.debounce.lock();
            let slot = slots.entry(key.clone()).or_default();
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            slot.generation += 1;
            slot.waiters.push(tx);

            let generation = slot.generation;
            let store = self.clone();
            let state = state.to_string();
            let action = action.to_string();
            slot.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(waiters) = store.take_waiters(&key, generation) else {
                    return;
                };
                debug!(key = %key, callers = waiters.len(), "Debounce window closed");

                let outcome = store
                    .dispatch(&state, &action, payload, loading)
                    .await
                    .map(|result| ActionOutcome::Completed { result });
                for waiter in waiters {
                    let _ = waiter.send(outcome.clone());
                }
            }));
        }

        rx.await.unwrap_or(Err(ClientError::Cancelled))
    }

    fn take_waiters(&self, key: &str, generation: u64) -> Option<Vec<Waiter>> {
        let mut slots = self.inner.debounce.lock();
        match slots.get(key) {
            Some(slot) if slot.generation == generation => {
                slots.remove(key).map(|slot| slot.waiters)
            }
            _ => None,
        }
    }

    /// Server round trip, serialized per state name in issue order.
    ///
    /// Background actions are tracked as pending but never toggle the loading
    /// binding.
    async fn dispatch(
        &self,
        state: &str,
        action: &str,
        payload: Value,
        loading: bool,
    ) -> ClientResult<Value> {
        let _pending = PendingGuard::begin(self, action_key(state, action), loading);

        let queue = self.queue_for(state);
        let _turn = queue.lock().await;

        let request = ActionRequest::new(state, action, payload);
        let response = self.inner.transport.send(&request).await.map_err(|e| {
            warn!(state = %state, action = %action, error = %e, "Action dispatch failed");
            e
        })?;

        if !response.success {
            let message = response
                .error
                .unwrap_or_else(|| "Action failed".to_string());
            warn!(state = %state, action = %action, error = %message, "Action rejected by server");
            return Err(ClientError::Server(message));
        }

        if let Some(snapshot) = response.state {
            self.replace_state(state, snapshot);
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    fn queue_for(&self, state: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .queues
            .lock()
            .entry(state.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Marks an action key pending for its lifetime, toggling the loading binding.
struct PendingGuard {
    store: ClientStateStore,
    key: String,
    loading: bool,
}

impl PendingGuard {
    fn begin(store: &ClientStateStore, key: String, loading: bool) -> Self {
        let first = {
            let mut pending = store.inner.pending.lock();
            let count = pending.entry(key.clone()).or_insert(0);
            *count += 1;
            *count == 1
        };
        if first && loading {
            store.inner.bindings.set_loading(&key, true);
        }
        Self {
            store: store.clone(),
            key,
            loading,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        // Several dispatches can share a key; stay pending until the last ends.
        let last = {
            let mut pending = self.store.inner.pending.lock();
            match pending.get_mut(&self.key) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                _ => {
                    pending.remove(&self.key);
                    true
                }
            }
        };
        if last && self.loading {
            self.store.inner.bindings.set_loading(&self.key, false);
        }
    }
}

/// Listener registration handle. Dropping it unsubscribes.
pub struct Subscription {
    store: Weak<StoreInner>,
    state: String,
    id: u64,
}

impl Subscription {
    /// Remove the listener now rather than at drop.
    pub fn unsubscribe(self) {}

    fn remove(&self) {
        if let Some(inner) = self.store.upgrade() {
            if let Some(list) = inner.listeners.lock().get_mut(&self.state) {
                list.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state)
            .field("id", &self.id)
            .finish()
    }
}
