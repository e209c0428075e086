//! Event transport towards presentation layers
//!
//! Discrete events (log chunks, traffic stats, state changes, notices) go out
//! on a broadcast channel; the latest [`StatusSnapshot`] is kept on a watch
//! channel so late subscribers can read the current state.

use crate::types::TrafficStats;
use crate::vpn::state::{ConnectionState, Notice, StatusSnapshot};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::trace;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Events pushed to presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// Raw output chunk, for display
    Log(String),

    /// Fresh traffic counters
    TrafficStats(TrafficStats),

    /// Connection state changed
    StateChanged(ConnectionState),

    /// Something the user should be told about
    Notice(Notice),
}

/// Sending side of the bridge, owned by the session controller
#[derive(Debug, Clone)]
pub struct EventBridge {
    events: broadcast::Sender<BridgeEvent>,
    status: watch::Sender<StatusSnapshot>,
}

impl EventBridge {
    /// Create a bridge starting from `initial`
    pub fn new(capacity: usize, initial: StatusSnapshot) -> Self {
        let (events, _) = broadcast::channel(capacity);
        let (status, _) = watch::channel(initial);
        Self { events, status }
    }

    /// Subscribe to discrete events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Watch the latest status snapshot
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    pub fn log(&self, text: impl Into<String>) {
        self.send(BridgeEvent::Log(text.into()));
    }

    pub fn traffic_stats(&self, stats: TrafficStats) {
        self.send(BridgeEvent::TrafficStats(stats));
    }

    pub fn state_changed(&self, state: ConnectionState) {
        self.send(BridgeEvent::StateChanged(state));
    }

    pub fn notice(&self, notice: Notice) {
        self.send(BridgeEvent::Notice(notice));
    }

    /// Replace the published snapshot
    pub fn publish_status(&self, snapshot: StatusSnapshot) {
        self.status.send_replace(snapshot);
    }

    fn send(&self, event: BridgeEvent) {
        // No subscriber is not an error
        if self.events.send(event).is_err() {
            trace!("Bridge event dropped, no subscribers");
        }
    }
}
