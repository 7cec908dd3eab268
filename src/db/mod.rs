mod schema;
mod seed;

pub use seed::seed_itinerary;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::events::ChangeNotifier;
use crate::models::*;

/// Store-layer failures.
///
/// Reads never surface `Unavailable` to callers; they degrade to the seed
/// document instead. Writes surface it so clients can fall back to local
/// persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("corrupt document: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The JSON blob column: everything document-shaped that isn't its own column.
#[derive(Serialize, Deserialize)]
struct DocumentData {
    days: Vec<Day>,
    #[serde(default)]
    notes: BTreeMap<String, Vec<Note>>,
}

/// Document store over SQLite.
///
/// One row per itinerary; the ordered days and keyed notes live in a JSON
/// blob. Every committed replace publishes a [`ChangeDescriptor`] through the
/// attached [`ChangeNotifier`].
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    notifier: ChangeNotifier,
    /// On-disk mirror for scratch notes, used when SQLite writes fail.
    temp_note_fallback: Option<PathBuf>,
}

impl Store {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let fallback = parent.join("temp_notes.json");
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            notifier: ChangeNotifier::new(),
            temp_note_fallback: Some(fallback),
        })
    }

    pub fn open_default() -> anyhow::Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "wayfarer")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("wayfarer.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            notifier: ChangeNotifier::new(),
            temp_note_fallback: None,
        })
    }

    pub fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// The change feed fed by this store's writes.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    // ============================================================
    // Itinerary operations
    // ============================================================

    /// Insert a new document with a fresh id. Never overwrites.
    pub fn create_itinerary(&self, input: ItineraryInput) -> Result<Itinerary, StoreError> {
        let input = normalized(input);
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let data = serde_json::to_string(&DocumentData {
            days: input.days.clone(),
            notes: input.notes.clone(),
        })?;

        conn.execute(
            "INSERT INTO itineraries (id, title, subtitle, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.title,
                &input.subtitle,
                &data,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Itinerary {
            id,
            title: input.title,
            subtitle: input.subtitle,
            days: input.days,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the most-recently-updated document, creating one if the store
    /// is empty. The save path for clients that track a single itinerary.
    pub fn replace_latest(&self, input: ItineraryInput) -> Result<Itinerary, StoreError> {
        let latest_id = {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.query_row(
                "SELECT id FROM itineraries ORDER BY updated_at DESC LIMIT 1",
                [],
                |row| row.get::<_, String>(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?
        };

        match latest_id {
            Some(id) => self.replace_itinerary(parse_uuid(id), input),
            None => {
                let doc = self.create_itinerary(input)?;
                self.notifier.publish(descriptor_of(&doc));
                Ok(doc)
            }
        }
    }

    /// Replace the document with the given id in place.
    pub fn replace_itinerary(
        &self,
        id: Uuid,
        input: ItineraryInput,
    ) -> Result<Itinerary, StoreError> {
        let input = normalized(input);
        let existing = self
            .read_itinerary(id)
            .ok_or(StoreError::NotFound("itinerary"))?;

        let now = Utc::now();
        let data = serde_json::to_string(&DocumentData {
            days: input.days.clone(),
            notes: input.notes.clone(),
        })?;

        let rows = {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE itineraries SET title = ?, subtitle = ?, data = ?, updated_at = ? WHERE id = ?",
                (&input.title, &input.subtitle, &data, now.to_rfc3339(), id.to_string()),
            )?
        };
        if rows == 0 {
            return Err(StoreError::NotFound("itinerary"));
        }

        let doc = Itinerary {
            id,
            title: input.title,
            subtitle: input.subtitle,
            days: input.days,
            notes: input.notes,
            created_at: existing.created_at,
            updated_at: now,
        };

        // Publish only after the write commits.
        self.notifier.publish(descriptor_of(&doc));
        Ok(doc)
    }

    /// The most-recently-updated document, or the built-in seed when the
    /// store is empty or unreachable. Never fails.
    pub fn read_latest(&self) -> Itinerary {
        match self.try_read_latest() {
            Ok(Some(doc)) => doc,
            Ok(None) => seed_itinerary(),
            Err(e) => {
                tracing::warn!("read_latest degraded to seed document: {e}");
                seed_itinerary()
            }
        }
    }

    fn try_read_latest(&self) -> Result<Option<Itinerary>, StoreError> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, title, subtitle, data, created_at, updated_at
             FROM itineraries ORDER BY updated_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(hydrate(row)?)),
            None => Ok(None),
        }
    }

    /// The document with the given id, or `None` if absent. An unreachable
    /// store degrades to the seed document, same as [`Store::read_latest`].
    pub fn read_itinerary(&self, id: Uuid) -> Option<Itinerary> {
        let result: Result<Option<Itinerary>, StoreError> = (|| {
            let conn = self.conn.lock().expect("database lock poisoned");
            let mut stmt = conn.prepare(
                "SELECT id, title, subtitle, data, created_at, updated_at
                 FROM itineraries WHERE id = ?",
            )?;
            let mut rows = stmt.query([id.to_string()])?;
            match rows.next()? {
                Some(row) => Ok(Some(hydrate(row)?)),
                None => Ok(None),
            }
        })();

        match result {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("read degraded to seed document: {e}");
                Some(seed_itinerary())
            }
        }
    }

    pub fn list_summaries(&self) -> Result<Vec<ItinerarySummary>, StoreError> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, title, subtitle, created_at, updated_at
             FROM itineraries ORDER BY updated_at DESC",
        )?;

        let summaries = stmt
            .query_map([], |row| {
                Ok(ItinerarySummary {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    title: row.get(1)?,
                    subtitle: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                    updated_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    pub fn delete_itinerary(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM itineraries WHERE id = ?", [id.to_string()])?;
        if rows == 0 {
            return Err(StoreError::NotFound("itinerary"));
        }
        Ok(())
    }

    // ============================================================
    // Note operations (legacy routes; read-modify-replace auto-save)
    // ============================================================

    pub fn list_notes(&self, item_id: &str) -> Vec<Note> {
        self.read_latest()
            .notes
            .get(item_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_note(&self, item_id: &str, input: NoteInput) -> Result<Note, StoreError> {
        validate_note(&input)?;

        let mut note = Note {
            id: Uuid::new_v4().to_string(),
            priority: input.priority,
            description: input.description,
            content: input.content,
            kind: NoteKind::default(),
        };
        note.normalize();

        let doc = self.read_latest();
        let mut next: ItineraryInput = doc.into();
        next.notes
            .entry(item_id.to_string())
            .or_default()
            .push(note.clone());
        self.replace_latest(next)?;
        Ok(note)
    }

    pub fn update_note(
        &self,
        item_id: &str,
        note_id: &str,
        input: NoteInput,
    ) -> Result<Note, StoreError> {
        validate_note(&input)?;

        let doc = self.read_latest();
        let mut next: ItineraryInput = doc.into();
        let notes = next
            .notes
            .get_mut(item_id)
            .ok_or(StoreError::NotFound("note"))?;
        let note = notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or(StoreError::NotFound("note"))?;

        note.priority = input.priority;
        note.description = input.description;
        note.content = input.content;
        note.normalize();
        let updated = note.clone();

        self.replace_latest(next)?;
        Ok(updated)
    }

    pub fn delete_note(&self, item_id: &str, note_id: &str) -> Result<(), StoreError> {
        let doc = self.read_latest();
        let mut next: ItineraryInput = doc.into();
        let notes = next
            .notes
            .get_mut(item_id)
            .ok_or(StoreError::NotFound("note"))?;
        let before = notes.len();
        notes.retain(|n| n.id != note_id);
        if notes.len() == before {
            return Err(StoreError::NotFound("note"));
        }
        if notes.is_empty() {
            next.notes.remove(item_id);
        }
        self.replace_latest(next)?;
        Ok(())
    }

    // ============================================================
    // Structural edits (reorder / cross-day move)
    // ============================================================

    /// Replace one day's item order. `item_ids` must be a permutation of the
    /// day's current items; no other day is touched.
    pub fn reorder_day(&self, day_id: &str, item_ids: &[String]) -> Result<Itinerary, StoreError> {
        let doc = self.read_latest();
        let mut next: ItineraryInput = doc.into();
        let day = next
            .days
            .iter_mut()
            .find(|d| d.id == day_id)
            .ok_or(StoreError::NotFound("day"))?;

        if item_ids.len() != day.items.len() {
            return Err(StoreError::Validation(
                "items must be a permutation of the day's current items".to_string(),
            ));
        }
        let mut reordered = Vec::with_capacity(item_ids.len());
        let mut remaining = std::mem::take(&mut day.items);
        for id in item_ids {
            let pos = remaining.iter().position(|i| &i.id == id).ok_or_else(|| {
                StoreError::Validation(format!("unknown or duplicate item id: {id}"))
            })?;
            reordered.push(remaining.remove(pos));
        }
        day.items = reordered;

        self.replace_latest(next)
    }

    /// Move an item across days (or within one), inserting at `target_index`
    /// clamped into bounds.
    pub fn move_item(
        &self,
        item_id: &str,
        from_day_id: &str,
        to_day_id: &str,
        target_index: usize,
    ) -> Result<Itinerary, StoreError> {
        let doc = self.read_latest();
        let mut next: ItineraryInput = doc.into();

        let from = next
            .days
            .iter_mut()
            .find(|d| d.id == from_day_id)
            .ok_or(StoreError::NotFound("day"))?;
        let pos = from
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or(StoreError::NotFound("item"))?;
        let item = from.items.remove(pos);

        let to = next
            .days
            .iter_mut()
            .find(|d| d.id == to_day_id)
            .ok_or(StoreError::NotFound("day"))?;
        let index = target_index.min(to.items.len());
        to.items.insert(index, item);

        self.replace_latest(next)
    }

    // ============================================================
    // Temp note operations (with file fallback)
    // ============================================================

    /// All scratch notes, newest first. Falls back to the on-disk mirror if
    /// SQLite is unreachable.
    pub fn list_temp_notes(&self) -> Vec<TempNote> {
        match self.try_list_temp_notes() {
            Ok(notes) => notes,
            Err(e) => {
                tracing::warn!("temp note list degraded to file fallback: {e}");
                self.read_fallback()
            }
        }
    }

    fn try_list_temp_notes(&self) -> Result<Vec<TempNote>, StoreError> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT note_id, title, content, type, created_at, updated_at
             FROM temp_notes ORDER BY updated_at DESC",
        )?;

        let notes = stmt
            .query_map([], |row| {
                Ok(TempNote {
                    note_id: row.get(0)?,
                    title: row.get(1)?,
                    content: row.get(2)?,
                    kind: parse_note_kind(row.get::<_, String>(3)?),
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                    updated_at: parse_datetime(row.get::<_, String>(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    /// Upsert a scratch note by its client-supplied id.
    pub fn upsert_temp_note(&self, input: TempNoteInput) -> Result<TempNote, StoreError> {
        if input.note_id.trim().is_empty() {
            return Err(StoreError::Validation("noteId is required".to_string()));
        }
        if input.content.trim().is_empty() {
            return Err(StoreError::Validation("content is required".to_string()));
        }

        let now = Utc::now();
        let kind = NoteKind::derive(&input.content);
        let note = TempNote {
            note_id: input.note_id,
            title: input.title,
            content: input.content,
            kind,
            created_at: now,
            updated_at: now,
        };

        let result: Result<TempNote, rusqlite::Error> = (|| {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO temp_notes (note_id, title, content, type, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(note_id) DO UPDATE SET
                     title = excluded.title,
                     content = excluded.content,
                     type = excluded.type,
                     updated_at = excluded.updated_at",
                (
                    &note.note_id,
                    &note.title,
                    &note.content,
                    kind_str(kind),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ),
            )?;
            // Re-read so an update keeps its original created_at.
            conn.query_row(
                "SELECT created_at FROM temp_notes WHERE note_id = ?",
                [&note.note_id],
                |row| row.get::<_, String>(0),
            )
            .map(|created| TempNote {
                created_at: parse_datetime(created),
                ..note.clone()
            })
        })();

        match result {
            Ok(stored) => Ok(stored),
            Err(e) => {
                tracing::warn!("temp note upsert degraded to file fallback: {e}");
                self.fallback_upsert(note)
            }
        }
    }

    pub fn delete_temp_note(&self, note_id: &str) -> Result<(), StoreError> {
        let result: Result<usize, rusqlite::Error> = {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute("DELETE FROM temp_notes WHERE note_id = ?", [note_id])
        };

        match result {
            Ok(0) => Err(StoreError::NotFound("temp note")),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!("temp note delete degraded to file fallback: {e}");
                let mut notes = self.read_fallback();
                let before = notes.len();
                notes.retain(|n| n.note_id != note_id);
                if notes.len() == before {
                    return Err(StoreError::NotFound("temp note"));
                }
                self.write_fallback(&notes);
                Ok(())
            }
        }
    }

    fn fallback_upsert(&self, note: TempNote) -> Result<TempNote, StoreError> {
        let mut notes = self.read_fallback();
        if let Some(existing) = notes.iter_mut().find(|n| n.note_id == note.note_id) {
            let created_at = existing.created_at;
            *existing = TempNote { created_at, ..note.clone() };
        } else {
            notes.insert(0, note.clone());
        }
        self.write_fallback(&notes);
        Ok(note)
    }

    fn read_fallback(&self) -> Vec<TempNote> {
        let Some(path) = &self.temp_note_fallback else {
            return Vec::new();
        };
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn write_fallback(&self, notes: &[TempNote]) {
        let Some(path) = &self.temp_note_fallback else {
            return;
        };
        match serde_json::to_string_pretty(notes) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::error!("failed to write temp note fallback file: {e}");
                }
            }
            Err(e) => tracing::error!("failed to serialize temp note fallback: {e}"),
        }
    }
}

fn validate_note(input: &NoteInput) -> Result<(), StoreError> {
    if input.description.trim().is_empty() && input.content.trim().is_empty() {
        return Err(StoreError::Validation(
            "note requires a description or content".to_string(),
        ));
    }
    Ok(())
}

/// Recompute every derived note kind before a write.
fn normalized(mut input: ItineraryInput) -> ItineraryInput {
    for notes in input.notes.values_mut() {
        for note in notes {
            note.normalize();
        }
    }
    input
}

fn descriptor_of(doc: &Itinerary) -> ChangeDescriptor {
    ChangeDescriptor {
        id: doc.id,
        title: doc.title.clone(),
        updated_at: doc.updated_at,
    }
}

fn hydrate(row: &rusqlite::Row<'_>) -> Result<Itinerary, StoreError> {
    let data: DocumentData = serde_json::from_str(&row.get::<_, String>(3)?)?;
    Ok(Itinerary {
        id: parse_uuid(row.get::<_, String>(0)?),
        title: row.get(1)?,
        subtitle: row.get(2)?,
        days: data.days,
        notes: data.notes,
        created_at: parse_datetime(row.get::<_, String>(4)?),
        updated_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn kind_str(kind: NoteKind) -> &'static str {
    match kind {
        NoteKind::Link => "link",
        NoteKind::Text => "text",
    }
}

fn parse_note_kind(s: String) -> NoteKind {
    match s.as_str() {
        "link" => NoteKind::Link,
        _ => NoteKind::Text,
    }
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
