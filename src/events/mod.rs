//! Change notification and live-update fan-out.
//!
//! Two channels make up the push pipeline:
//!
//! - [`ChangeNotifier`] sits between the store and the rest of the process.
//!   The store publishes a [`ChangeDescriptor`] after every committed
//!   document write. Publishing with nobody listening is not an error:
//!   delivery is fire and forget, with no backlog or replay. The recovery
//!   path for a client that missed an event is always "pull current state".
//! - [`EventHub`] fans [`ServerEvent`]s out to every open live-update stream
//!   (one subscription per SSE connection). A dropped receiver prunes itself;
//!   a lagged receiver skips ahead. New subscribers see only future events.
//!   Streams terminate after the `server_shutdown` announcement so graceful
//!   shutdown never waits on connected clients.
//!
//! At startup a relay task bridges the two: it holds the process-lifetime
//! notifier subscription and forwards each descriptor to the hub as an
//! `itinerary_updated` event. If the relay stops, the server keeps serving
//! requests without live updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::models::ChangeDescriptor;

/// Interval between liveness pings on every open stream. Keeps intermediaries
/// from reclaiming an idle transport.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Buffered events per subscriber before a slow stream starts skipping.
const CHANNEL_CAPACITY: usize = 64;

/// An event delivered on the live-update stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First event on every newly registered stream.
    Connected,
    /// Periodic liveness ping.
    Heartbeat,
    /// A document was written; carries the change descriptor.
    ItineraryUpdated {
        data: ChangeDescriptor,
        timestamp: DateTime<Utc>,
    },
    /// The scratch-note list changed.
    TempNotesUpdated { timestamp: DateTime<Utc> },
    /// Planned shutdown; clients should reconnect proactively.
    ServerShutdown,
}

impl ServerEvent {
    pub fn itinerary_updated(descriptor: ChangeDescriptor) -> Self {
        Self::ItineraryUpdated {
            data: descriptor,
            timestamp: Utc::now(),
        }
    }

    pub fn temp_notes_updated() -> Self {
        Self::TempNotesUpdated {
            timestamp: Utc::now(),
        }
    }
}

/// Publish/subscribe channel bound to document-store writes.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeDescriptor>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Fire-and-forget publish. A publish with no active subscriber is
    /// simply not delivered.
    pub fn publish(&self, descriptor: ChangeDescriptor) {
        let _ = self.tx.send(descriptor);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeDescriptor> {
        self.tx.subscribe()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// One-to-many in-memory relay for live-update streams.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Register a new live-update stream. The SSE handler prepends the
    /// `connected` greeting before draining this receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Event stream for one live-update connection. A lagged connection
    /// skips ahead; the stream ends after relaying `server_shutdown`, so
    /// graceful shutdown is not held open by connected clients.
    pub fn event_stream(&self) -> impl futures::Stream<Item = ServerEvent> {
        futures::stream::unfold(Some(self.subscribe()), |rx| async move {
            let mut rx = rx?;
            loop {
                return match rx.recv().await {
                    Ok(ServerEvent::ServerShutdown) => {
                        Some((ServerEvent::ServerShutdown, None))
                    }
                    Ok(event) => Some((event, Some(rx))),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => None,
                };
            }
        })
    }

    /// Fan an event out to every registered stream in call order.
    /// Best-effort, at-most-once per stream, no retry.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of currently registered streams.
    pub fn stream_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Spawn the periodic liveness ping.
    pub fn spawn_heartbeat(&self) -> tokio::task::JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                hub.broadcast(ServerEvent::Heartbeat);
            }
        })
    }

    /// Announce planned shutdown so clients can distinguish it from a
    /// network failure. Every stream from [`EventHub::event_stream`] ends
    /// after delivering this event.
    pub fn announce_shutdown(&self) {
        self.broadcast(ServerEvent::ServerShutdown);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Bridge the store's change feed into the hub for the process lifetime.
///
/// Lag on the notifier side is tolerated: a skipped descriptor only means a
/// client refreshes one event later, since clients pull current state rather
/// than replaying history.
pub fn spawn_change_relay(notifier: &ChangeNotifier, hub: EventHub) -> tokio::task::JoinHandle<()> {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(descriptor) => {
                    tracing::debug!(id = %descriptor.id, "relaying document change");
                    hub.broadcast(ServerEvent::itinerary_updated(descriptor));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "change relay lagged; continuing");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!("change feed closed; live updates disabled");
                    break;
                }
            }
        }
    })
}
