//! # state-engine
//!
//! Server half of state sync: named, typed state that persists across
//! requests, changes only through declared actions, hydrates the client once
//! per page and pushes updates afterwards.
//!
//! ## Architecture
//!
//! ```text
//! REGISTER:
//!   DescriptorSource -> StateRegistry::register::<T>()
//!
//! REQUEST:
//!   RequestContext::get_state -> StateProxy (load on first use)
//!   StateProxy::set / call    -> dirty -> persist -> StateStorage
//!
//! PAGE:
//!   RequestContext::embed_hydration -> <script id="state-sync-hydration">
//!
//! ACTION:
//!   handle_action -> proxy.call -> persist -> ActionResponse
//!                                           -> StateBroadcaster (sync states)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let source = StaticDescriptorSource::load(&manifest)?;
//! let registry = Arc::new(StateRegistry::new(Arc::new(source), backends));
//! registry.register::<CartState>()?;
//!
//! let ctx = RequestContext::new(Arc::clone(&registry), session_id);
//! let cart = ctx.get_state("cart").await?;
//! cart.lock().await.call("add_item", json!({ "sku": "a-1" })).await?;
//! let script = ctx.embed_hydration().await?;
//! ```

pub mod broadcast;
pub mod change;
pub mod context;
pub mod declaration;
pub mod dispatch;
mod error;
pub mod model;
pub mod proxy;
pub mod registry;

#[cfg(test)]
mod tests;

pub use broadcast::{BroadcastHub, BroadcastSubscription, ChannelEvent, StateBroadcaster};
pub use change::{ChangeSink, NullSink, RecordingSink, StateChange, TracingSink};
pub use context::{RequestContext, SharedProxy};
pub use declaration::{
    derive_state_name, ComputedSpec, DescriptorSource, StateDeclaration, StaticDescriptorSource,
};
pub use dispatch::{execute_action, handle_action};
pub use error::{EngineError, EngineResult, ModelError};
pub use model::{parse_args, StateModel, StateType};
pub use proxy::StateProxy;
pub use registry::{RegistryEntry, StateRegistry};
