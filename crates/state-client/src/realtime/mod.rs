//! Realtime push channel: connection loop, SSE parsing and reconnect backoff.

pub mod backoff;
pub mod channel;
pub mod source;
pub mod sse;

pub use backoff::Backoff;
pub use channel::{ChannelStatus, RealtimeChannel, RealtimeConfig};
pub use source::{EventSource, EventStream, HttpEventSource};
pub use sse::{SseEvent, SseParser};
