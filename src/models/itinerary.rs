use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A complete travel itinerary.
///
/// The itinerary is the unit of persistence: adding an item, deleting a note,
/// or reordering a day all arrive at the store as "replace this document with
/// that one". The store never merges; two racing saves resolve to whichever
/// commits last, and the losing session learns about it from the change feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Itinerary {
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub days: Vec<Day>,
    /// Notes keyed by item id. The store does not verify the key references
    /// an existing item; orphaned keys are tolerated.
    #[serde(default)]
    pub notes: BTreeMap<String, Vec<Note>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing an itinerary. Ids and timestamps are
/// assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryInput {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub days: Vec<Day>,
    #[serde(default)]
    pub notes: BTreeMap<String, Vec<Note>>,
}

impl From<Itinerary> for ItineraryInput {
    fn from(doc: Itinerary) -> Self {
        Self {
            title: doc.title,
            subtitle: doc.subtitle,
            days: doc.days,
            notes: doc.notes,
        }
    }
}

/// One calendar day. Item order within a day is significant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Day {
    pub id: String,
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub accommodation: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// A single timeline entry within a day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Free-text time label ("07:30", "14:00-18:00"). Never parsed.
    #[serde(default)]
    pub time: String,
    pub name: String,
    #[serde(default)]
    pub activity: String,
}

/// Item category. Controls display color/icon in clients, otherwise opaque.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Airport,
    Transport,
    City,
    Attraction,
    Accommodation,
    Event,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Airport => "airport",
            Self::Transport => "transport",
            Self::City => "city",
            Self::Attraction => "attraction",
            Self::Accommodation => "accommodation",
            Self::Event => "event",
        }
    }
}

/// A note attached to an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub priority: NotePriority,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    /// Derived from `content` on every write; accepted on input but always
    /// recomputed so it cannot drift from the content.
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
}

impl Note {
    /// Recompute the derived `kind` from the current content.
    pub fn normalize(&mut self) {
        self.kind = NoteKind::derive(&self.content);
    }
}

/// Cosmetic priority label for a note.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotePriority {
    High,
    #[default]
    Medium,
    Low,
}

/// Shape of a note's content: a URL renders as a link, anything else as text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Link,
    #[default]
    Text,
}

impl NoteKind {
    /// Pure derivation from content shape, recomputed at every save so the
    /// stored kind can never disagree with the content.
    pub fn derive(content: &str) -> Self {
        let trimmed = content.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Link
        } else {
            Self::Text
        }
    }
}

/// Listing entry for the itinerary picker, ordered by recency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItinerarySummary {
    pub id: Uuid,
    pub title: String,
    pub subtitle: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact payload published on every committed document write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDescriptor {
    pub id: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a note via the legacy note routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteInput {
    #[serde(default)]
    pub priority: NotePriority,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
}
