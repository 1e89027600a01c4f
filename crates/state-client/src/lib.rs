//! # state-client
//!
//! Client half of state sync: an in-memory mirror of server state that
//! hydrates once per page, dispatches actions and follows realtime pushes.
//!
//! ```text
//! LOAD:     hydrate(payload) -> states + action metadata
//! LOCAL:    set(state, key, value) -> listeners + bindings
//! ACTION:   action(state, name, payload)
//!             client mode -> local handler
//!             otherwise   -> confirm -> debounce -> per-state queue
//!                         -> ActionTransport -> replace_state
//! PUSH:     RealtimeChannel -> EventSource -> SseParser -> replace_state
//! ```

pub mod bindings;
pub mod confirm;
mod error;
pub mod realtime;
pub mod store;
pub mod transport;

#[cfg(test)]
mod tests;

pub use bindings::{BindingSink, BindingUpdate, NoopBindings, RecordingBindings};
pub use confirm::{AlwaysConfirm, ConfirmPrompt, FnConfirm};
pub use error::{ClientError, ClientResult};
pub use realtime::{
    Backoff, ChannelStatus, EventSource, EventStream, HttpEventSource, RealtimeChannel,
    RealtimeConfig, SseEvent, SseParser,
};
pub use store::{ActionOutcome, ChangeNotice, ClientStateStore, LocalHandler, Subscription};
pub use transport::{ActionTransport, HttpActionTransport};
