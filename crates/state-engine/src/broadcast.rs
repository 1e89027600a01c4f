//! Fan-out of realtime events to push-stream subscribers.
//!
//! The HTTP layer that serves `text/event-stream` is external; it subscribes
//! with the `channels` query parameter and writes [`BroadcastSubscription::next_frame`]
//! to the response body.

use std::collections::HashSet;

use state_protocol_types::RealtimeEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Publishes realtime events on named channels.
pub trait StateBroadcaster: Send + Sync {
    fn publish(&self, channel: &str, event: RealtimeEvent);
}

/// An event and the channel it was published on. `None` reaches every subscriber.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub channel: Option<String>,
    pub event: RealtimeEvent,
}

/// In-process broadcaster on a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<ChannelEvent>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe<I, S>(&self, channels: I) -> BroadcastSubscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BroadcastSubscription {
            channels: channels.into_iter().map(Into::into).collect(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Send a heartbeat to every subscriber.
    pub fn heartbeat(&self) {
        let _ = self.sender.send(ChannelEvent {
            channel: None,
            event: RealtimeEvent::Heartbeat,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl StateBroadcaster for BroadcastHub {
    fn publish(&self, channel: &str, event: RealtimeEvent) {
        let name = event.name().to_string();
        match self.sender.send(ChannelEvent {
            channel: Some(channel.to_string()),
            event,
        }) {
            Ok(receivers) => debug!(channel = %channel, event = %name, receivers, "Published realtime event"),
            Err(_) => debug!(channel = %channel, event = %name, "No realtime subscribers"),
        }
    }
}

/// One push-stream client's view of the hub.
pub struct BroadcastSubscription {
    channels: HashSet<String>,
    receiver: broadcast::Receiver<ChannelEvent>,
}

impl BroadcastSubscription {
    pub fn channels(&self) -> &HashSet<String> {
        &self.channels
    }

    fn wants(&self, channel: &Option<String>) -> bool {
        match channel {
            Some(channel) => self.channels.contains(channel),
            None => true,
        }
    }

    /// Next event on a subscribed channel. `None` once the hub is gone.
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(published) if self.wants(&published.channel) => return Some(published.event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Realtime subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event rendered as an SSE frame.
    pub async fn next_frame(&mut self) -> Option<String> {
        loop {
            let event = self.next_event().await?;
            match event.to_sse_frame() {
                Ok(frame) => return Some(frame),
                Err(e) => warn!(event = %event.name(), error = %e, "Failed to encode realtime event"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use state_protocol_types::StateData;

    fn update(state: &str) -> RealtimeEvent {
        RealtimeEvent::state_updated(state, StateData::new())
    }

    #[tokio::test]
    async fn subscribers_only_see_their_channels() {
        let hub = BroadcastHub::new(16);
        let mut cart = hub.subscribe(["cart:s1"]);
        let mut stats = hub.subscribe(["stats"]);

        hub.publish("cart:s2", update("cart"));
        hub.publish("cart:s1", update("cart"));
        hub.publish("stats", update("stats"));

        match cart.next_event().await.unwrap() {
            RealtimeEvent::StateUpdated(u) => assert_eq!(u.state, "cart"),
            other => panic!("unexpected event: {:?}", other),
        }
        match stats.next_event().await.unwrap() {
            RealtimeEvent::StateUpdated(u) => assert_eq!(u.state, "stats"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn heartbeat_reaches_everyone() {
        let hub = BroadcastHub::new(16);
        let mut a = hub.subscribe(["a"]);
        let mut b = hub.subscribe(Vec::<String>::new());
        hub.heartbeat();

        assert_eq!(a.next_event().await, Some(RealtimeEvent::Heartbeat));
        assert_eq!(b.next_frame().await.unwrap(), "event: heartbeat\ndata:\n\n");
    }

    #[tokio::test]
    async fn closed_hub_ends_subscription() {
        let hub = BroadcastHub::new(4);
        let mut sub = hub.subscribe(["a"]);
        drop(hub);
        assert!(sub.next_event().await.is_none());
    }
}
