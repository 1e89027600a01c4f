//! Realtime channel client with automatic reconnection.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use state_protocol_types::RealtimeEvent;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::source::{EventSource, EventStream};
use super::sse::SseEvent;
use crate::ClientStateStore;

/// Realtime channel configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Channel names to subscribe to.
    pub channels: Vec<String>,
    /// Delay after the first consecutive failure.
    pub backoff_floor: Duration,
    /// Upper bound on any reconnect delay.
    pub backoff_ceiling: Duration,
    /// Silence longer than this is treated as a dead connection.
    pub heartbeat_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            backoff_floor: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(45),
        }
    }
}

impl RealtimeConfig {
    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Disconnected,
    Connecting,
    Open,
    /// Waiting `delay` before reconnect attempt number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
}

/// Keeps one push connection open and feeds its events into the store.
pub struct RealtimeChannel {
    config: RealtimeConfig,
    source: Arc<dyn EventSource>,
    store: ClientStateStore,
    status_tx: watch::Sender<ChannelStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeChannel {
    pub fn new(config: RealtimeConfig, source: Arc<dyn EventSource>, store: ClientStateStore) -> Self {
        let (status_tx, _) = watch::channel(ChannelStatus::Disconnected);
        Self {
            config,
            source,
            store,
            status_tx,
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn status(&self) -> ChannelStatus {
        self.status_tx.borrow().clone()
    }

    /// Watch connection status transitions.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Start the connection loop. A no-op while it is already running.
    pub fn connect(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("Realtime channel already running");
            return;
        }

        info!(channels = ?self.config.channels, "Starting realtime channel");
        *task = Some(tokio::spawn(run_channel(
            self.config.clone(),
            Arc::clone(&self.source),
            self.store.clone(),
            self.status_tx.clone(),
        )));
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Realtime channel disconnected");
        }
        self.status_tx.send_replace(ChannelStatus::Disconnected);
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn run_channel(
    config: RealtimeConfig,
    source: Arc<dyn EventSource>,
    store: ClientStateStore,
    status: watch::Sender<ChannelStatus>,
) {
    let mut backoff = Backoff::new(config.backoff_floor, config.backoff_ceiling);

    loop {
        status.send_replace(ChannelStatus::Connecting);

        match source.open(&config.channels).await {
            Ok(mut stream) => {
                backoff.reset();
                status.send_replace(ChannelStatus::Open);
                info!("Realtime channel open");

                let reason = pump(stream.as_mut(), &store, config.heartbeat_timeout).await;
                warn!(reason = %reason, "Realtime connection lost");
            }
            Err(e) => {
                warn!(error = %e, "Failed to open realtime connection");
            }
        }

        let delay = backoff.next_delay();
        let attempt = backoff.failures();
        status.send_replace(ChannelStatus::Reconnecting { attempt, delay });
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
        tokio::time::sleep(delay).await;
    }
}

/// Read events until the connection fails. Returns why it ended.
async fn pump(
    stream: &mut dyn EventStream,
    store: &ClientStateStore,
    heartbeat_timeout: Duration,
) -> String {
    loop {
        match tokio::time::timeout(heartbeat_timeout, stream.next_event()).await {
            Err(_) => return "heartbeat timeout".to_string(),
            Ok(Err(e)) => return e.to_string(),
            Ok(Ok(None)) => return "stream closed".to_string(),
            Ok(Ok(Some(event))) => handle_event(store, event),
        }
    }
}

fn handle_event(store: &ClientStateStore, event: SseEvent) {
    match RealtimeEvent::decode(&event.name, &event.data) {
        Ok(decoded) => store.apply_realtime_event(decoded),
        Err(e) => warn!(event = %event.name, error = %e, "Malformed realtime event"),
    }
}
