//! Client-side live synchronization.
//!
//! A session holds one document and one live-update stream. Remote change
//! descriptors trigger a conditional pull: while the session is mid-edit the
//! pull is suppressed and a conflict advisory raised instead, so unsaved work
//! is never clobbered. Idle sessions fetch, deep-compare, and re-render only
//! when the document actually changed.
//!
//! No merge is attempted anywhere: the resolution path for a conflict is
//! always "save or discard, then absorb the remote copy".

mod client;
mod document;

pub use client::{Backoff, ConnectionState, HttpDocumentApi, SyncClient};
pub use document::{DocumentApi, DocumentSession, EditableItinerary, FetchTicket, SyncOutcome};

use thiserror::Error;

/// Sync-client failures.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode server payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Transport(String),
}
