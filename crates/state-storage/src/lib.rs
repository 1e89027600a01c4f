//! State Storage: pluggable persistence keyed by `(session id, state name)`.
//!
//! - [`EphemeralStorage`] - process cache, shared TTL cache, TTL store (`persist = session`)
//! - [`DurableStorage`] - SQLite table behind a single-thread executor (`persist = database`)
//! - [`ClientLocalStorage`] - no-op on the server (`persist = local`)
//!
//! [`StorageBackends`] bundles one of each and routes by persist mode.

mod backends;
pub mod cache;
mod client_local;
mod counting;
pub mod durable;
mod ephemeral;
mod error;
mod traits;

pub use backends::StorageBackends;
pub use cache::{MemoryTtlCache, RedisTtlCache, TtlCache};
pub use client_local::ClientLocalStorage;
pub use counting::CountingStorage;
pub use durable::{AsyncDatabase, DurableStorage, StateRecord};
pub use ephemeral::{EphemeralStorage, ProcessCache};
pub use error::{StorageError, StorageResult};
pub use traits::{storage_key, StateStorage, StorageKind};
