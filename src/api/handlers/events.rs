//! Server-sent-event endpoint for live updates.
//!
//! Each connection registers one hub subscription. The stream opens with a
//! `connected` greeting, then relays hub events in broadcast order as JSON
//! `data:` frames. A stream that lags skips ahead rather than blocking the
//! fan-out; a dropped connection unregisters itself when the receiver drops.
//! The stream ends after the `server_shutdown` event, so graceful shutdown
//! is never held open by connected clients.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use futures::StreamExt;

use crate::events::ServerEvent;

use super::AppState;

pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(streams = state.hub.stream_count(), "live-update stream opened");

    let greeting = futures::stream::once(async { frame(&ServerEvent::Connected) });
    let updates = state.hub.event_stream().map(|event| frame(&event));

    Sse::new(greeting.chain(updates))
}

fn frame(event: &ServerEvent) -> Result<Event, Infallible> {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Ok(Event::default().data(payload))
}
