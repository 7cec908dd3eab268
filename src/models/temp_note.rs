use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NoteKind;

/// A scratch note, independent of any itinerary.
///
/// Scratch notes are keyed by a client-supplied id so that an offline client
/// can create them locally and upsert on reconnect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TempNote {
    pub note_id: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert input for a scratch note. `note_id` is the upsert key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempNoteInput {
    pub note_id: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
}
