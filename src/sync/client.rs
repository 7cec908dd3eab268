use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::sync::watch;
use uuid::Uuid;

use crate::events::ServerEvent;
use crate::models::{Itinerary, ItineraryInput};

use super::document::{DocumentApi, DocumentSession, SyncOutcome};
use super::SyncError;

/// Live-update stream connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectWait,
}

/// Reconnect backoff: base delay, multiplied per failure up to a cap, reset
/// to base when a transport opens.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
}

impl Backoff {
    const BASE: Duration = Duration::from_secs(1);
    const MAX: Duration = Duration::from_secs(30);
    const FACTOR: f64 = 1.5;

    pub fn new() -> Self {
        Self { delay: Self::BASE }
    }

    /// The delay to wait now; the next failure waits longer.
    pub fn next(&mut self) -> Duration {
        let current = self.delay;
        self.delay = self.delay.mul_f64(Self::FACTOR).min(Self::MAX);
        current
    }

    pub fn reset(&mut self) {
        self.delay = Self::BASE;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// reqwest-backed document transport against the Wayfarer API.
#[derive(Debug, Clone)]
pub struct HttpDocumentApi {
    base_url: String,
    client: Client,
}

impl HttpDocumentApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }
}

#[derive(serde::Deserialize)]
struct SaveAck {
    id: Uuid,
}

impl DocumentApi for HttpDocumentApi {
    async fn fetch_latest(&self) -> Result<Itinerary, SyncError> {
        let response = self
            .client
            .get(format!("{}/api/itinerary", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn save_latest(&self, input: &ItineraryInput) -> Result<Uuid, SyncError> {
        let response = self
            .client
            .post(format!("{}/api/itinerary", self.base_url))
            .json(input)
            .send()
            .await?
            .error_for_status()?;
        let ack: SaveAck = response.json().await?;
        Ok(ack.id)
    }
}

/// Incremental SSE frame parser: feeds arbitrary byte chunks in, yields the
/// concatenated `data:` payload of each completed frame.
///
/// Buffers raw bytes and decodes only complete frames, so a multi-byte UTF-8
/// character split across two network chunks survives intact. Accepts both
/// `\n` and `\r\n` line endings.
#[derive(Debug, Default)]
pub(crate) struct SseFrameParser {
    buf: Vec<u8>,
}

impl SseFrameParser {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(end) = frame_boundary(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..end).collect();
            let frame = String::from_utf8_lossy(&frame);
            let mut data_lines = Vec::new();
            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
                }
            }
            if !data_lines.is_empty() {
                payloads.push(data_lines.join("\n"));
            }
        }
        payloads
    }
}

/// End (exclusive) of the first complete frame: a blank line in either
/// `\n\n` or `\r\n\r\n` form.
fn frame_boundary(buf: &[u8]) -> Option<usize> {
    buf.windows(2).enumerate().find_map(|(i, w)| match w {
        b"\n\n" => Some(i + 2),
        b"\r\n" if buf.get(i + 2..i + 4) == Some(b"\r\n".as_slice()) => Some(i + 4),
        _ => None,
    })
}

/// One browser-session equivalent: a live-update stream plus the held
/// document, reconciled per the conflict-avoidance rules in
/// [`DocumentSession`].
pub struct SyncClient<A> {
    events_url: String,
    http: Client,
    session: DocumentSession<A>,
    state: ConnectionState,
    backoff: Backoff,
    stop: watch::Receiver<bool>,
}

impl<A: DocumentApi> SyncClient<A> {
    /// `stop` is the disconnect switch: flip it to `true` (or drop the
    /// sender) to close the transport and cancel reconnection.
    pub fn new(base_url: &str, session: DocumentSession<A>, stop: watch::Receiver<bool>) -> Self {
        Self {
            events_url: format!("{base_url}/api/events"),
            http: Client::new(),
            session,
            state: ConnectionState::Disconnected,
            backoff: Backoff::new(),
            stop,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&mut self) -> &mut DocumentSession<A> {
        &mut self.session
    }

    // State transitions, kept as methods so the machine is testable without
    // a live transport.

    pub fn on_connect_started(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn on_transport_open(&mut self) {
        self.state = ConnectionState::Connected;
        self.backoff.reset();
    }

    /// Returns how long to wait before the next attempt.
    pub fn on_transport_error(&mut self) -> Duration {
        self.state = ConnectionState::ReconnectWait;
        self.backoff.next()
    }

    pub fn on_reconnect_timer(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn on_disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Run until disconnected: connect, stream events, reconnect with
    /// backoff on any transport failure.
    pub async fn run(&mut self) {
        let mut stop = self.stop.clone();
        loop {
            if *stop.borrow() {
                self.on_disconnect();
                return;
            }
            self.on_connect_started();

            match self.connect().await {
                Ok(response) => {
                    self.on_transport_open();
                    tracing::info!("live-update stream connected");
                    let mut stream = response.bytes_stream();
                    let mut parser = SseFrameParser::default();
                    loop {
                        tokio::select! {
                            _ = stop.changed() => {
                                self.on_disconnect();
                                return;
                            }
                            chunk = stream.next() => match chunk {
                                Some(Ok(bytes)) => {
                                    let mut server_closing = false;
                                    for payload in parser.push(&bytes) {
                                        server_closing |= self.dispatch(&payload).await;
                                    }
                                    if server_closing {
                                        break;
                                    }
                                }
                                Some(Err(e)) => {
                                    tracing::warn!("live-update stream error: {e}");
                                    break;
                                }
                                None => {
                                    tracing::info!("live-update stream closed by server");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!("live-update connect failed: {e}"),
            }

            let delay = self.on_transport_error();
            tokio::select! {
                _ = stop.changed() => {
                    self.on_disconnect();
                    return;
                }
                _ = tokio::time::sleep(delay) => self.on_reconnect_timer(),
            }
        }
    }

    async fn connect(&self) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .get(&self.events_url)
            .send()
            .await?
            .error_for_status()
    }

    /// Returns `true` when the server announced shutdown and the read loop
    /// should stop waiting on this transport.
    async fn dispatch(&mut self, payload: &str) -> bool {
        let event: ServerEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("undecodable live-update payload: {e}");
                return false;
            }
        };

        match event {
            ServerEvent::ItineraryUpdated { data, .. } => {
                match self.session.handle_change(data).await {
                    Ok(SyncOutcome::Applied) => {
                        tracing::info!("remote change applied; re-render");
                    }
                    Ok(SyncOutcome::Unchanged) => {
                        tracing::debug!("remote change matched held document");
                    }
                    Ok(SyncOutcome::Conflict(descriptor)) => {
                        tracing::warn!(
                            title = %descriptor.title,
                            "remote change pending; save or discard local edits first"
                        );
                    }
                    Ok(SyncOutcome::Stale) => {
                        tracing::debug!("discarded stale fetch response");
                    }
                    Err(e) => tracing::warn!("failed to pull remote change: {e}"),
                }
            }
            ServerEvent::TempNotesUpdated { .. } => {
                tracing::debug!("scratch notes changed remotely");
            }
            ServerEvent::ServerShutdown => {
                tracing::info!("server announced shutdown; reconnecting with backoff");
                return true;
            }
            ServerEvent::Connected | ServerEvent::Heartbeat => {}
        }
        false
    }
}
