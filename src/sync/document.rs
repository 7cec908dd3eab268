use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ChangeDescriptor, Itinerary, ItineraryInput, Note};

use super::SyncError;

/// Transport seam for the sync session: how it pulls and pushes documents.
///
/// The production implementation is [`super::HttpDocumentApi`]; tests script
/// responses instead of standing up a server.
#[allow(async_fn_in_trait)]
pub trait DocumentApi {
    async fn fetch_latest(&self) -> Result<Itinerary, SyncError>;
    async fn save_latest(&self, input: &ItineraryInput) -> Result<Uuid, SyncError>;
}

/// The client-held document plus the snapshot taken at edit-start.
///
/// `enter_edit` deep-clones the document; `cancel_edit` restores that clone,
/// `finish_edit` discards it. Mutations apply to the held document
/// synchronously; persistence happens only at an explicit save.
#[derive(Debug, Clone)]
pub struct EditableItinerary {
    current: Itinerary,
    snapshot: Option<Itinerary>,
}

impl EditableItinerary {
    pub fn new(doc: Itinerary) -> Self {
        Self {
            current: doc,
            snapshot: None,
        }
    }

    pub fn document(&self) -> &Itinerary {
        &self.current
    }

    pub fn is_editing(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Begin an edit: snapshot the current document for cancel-to-snapshot.
    /// Re-entering edit mode keeps the original snapshot.
    pub fn enter_edit(&mut self) {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.current.clone());
        }
    }

    /// Discard local changes and restore the edit-start snapshot.
    pub fn cancel_edit(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.current = snapshot;
        }
    }

    /// Commit path: keep the held document, drop the snapshot.
    pub fn finish_edit(&mut self) {
        self.snapshot = None;
    }

    /// Mutate the held document in place. Callers persist via
    /// [`DocumentSession::save`] when done.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Itinerary) -> R) -> R {
        f(&mut self.current)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.current.title = title.into();
    }

    /// Remove an item wherever it lives, along with its notes.
    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let mut removed = false;
        for day in &mut self.current.days {
            let before = day.items.len();
            day.items.retain(|i| i.id != item_id);
            removed |= day.items.len() != before;
        }
        if removed {
            self.current.notes.remove(item_id);
        }
        removed
    }

    pub fn add_note(&mut self, item_id: &str, mut note: Note) {
        note.normalize();
        self.current
            .notes
            .entry(item_id.to_string())
            .or_default()
            .push(note);
    }

    pub fn remove_note(&mut self, item_id: &str, note_id: &str) -> bool {
        let Some(notes) = self.current.notes.get_mut(item_id) else {
            return false;
        };
        let before = notes.len();
        notes.retain(|n| n.id != note_id);
        let removed = notes.len() != before;
        if notes.is_empty() {
            self.current.notes.remove(item_id);
        }
        removed
    }

    /// Absorb a freshly fetched remote document. Only called while idle.
    fn replace(&mut self, doc: Itinerary) {
        debug_assert!(self.snapshot.is_none());
        self.current = doc;
    }
}

/// What a remote change descriptor led to.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Remote change arrived mid-edit; advisory raised, nothing fetched.
    /// The user must save or discard before the change can be absorbed.
    Conflict(ChangeDescriptor),
    /// Fresh document absorbed; the caller should re-render.
    Applied,
    /// Fetched document deep-equals the held one; no re-render.
    Unchanged,
    /// A newer descriptor arrived while this fetch was in flight; the
    /// response was discarded (last descriptor wins).
    Stale,
}

/// Tags an in-flight fetch with the descriptor that triggered it, so a
/// response can be discarded when a newer descriptor has since arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchTicket {
    tag: DateTime<Utc>,
}

/// One client session: the editable document, its transport, and the
/// reconciliation rules for remote changes.
pub struct DocumentSession<A> {
    api: A,
    doc: EditableItinerary,
    /// Newest descriptor timestamp observed so far.
    latest_seen: Option<DateTime<Utc>>,
    /// Where to keep a local copy when a save fails.
    backup_path: Option<PathBuf>,
}

impl<A: DocumentApi> DocumentSession<A> {
    pub fn new(api: A, initial: Itinerary) -> Self {
        Self {
            api,
            doc: EditableItinerary::new(initial),
            latest_seen: None,
            backup_path: None,
        }
    }

    pub fn with_backup_path(mut self, path: PathBuf) -> Self {
        self.backup_path = Some(path);
        self
    }

    pub fn editable(&mut self) -> &mut EditableItinerary {
        &mut self.doc
    }

    pub fn document(&self) -> &Itinerary {
        self.doc.document()
    }

    pub fn is_editing(&self) -> bool {
        self.doc.is_editing()
    }

    /// Record an incoming descriptor and decide whether to fetch.
    ///
    /// Returns `Err(Conflict)` while editing: the caller surfaces the
    /// advisory and fetches nothing. Otherwise returns a ticket to pass to
    /// [`DocumentSession::complete_fetch`] with the fetched document.
    pub fn observe(&mut self, descriptor: ChangeDescriptor) -> Result<FetchTicket, SyncOutcome> {
        let newer = self
            .latest_seen
            .map_or(true, |seen| descriptor.updated_at > seen);
        if newer {
            self.latest_seen = Some(descriptor.updated_at);
        }

        if self.doc.is_editing() {
            return Err(SyncOutcome::Conflict(descriptor));
        }
        Ok(FetchTicket {
            tag: descriptor.updated_at,
        })
    }

    /// Apply a fetched document, unless a newer descriptor superseded the
    /// fetch or the content is unchanged.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, fetched: Itinerary) -> SyncOutcome {
        if self.latest_seen.is_some_and(|seen| seen > ticket.tag) {
            return SyncOutcome::Stale;
        }
        // Edit mode may have been entered while the fetch was in flight.
        if self.doc.is_editing() {
            return SyncOutcome::Conflict(ChangeDescriptor {
                id: fetched.id,
                title: fetched.title,
                updated_at: ticket.tag,
            });
        }
        if &fetched == self.doc.document() {
            return SyncOutcome::Unchanged;
        }
        self.doc.replace(fetched);
        SyncOutcome::Applied
    }

    /// Full reconciliation for one descriptor: observe, fetch, apply.
    pub async fn handle_change(&mut self, descriptor: ChangeDescriptor) -> Result<SyncOutcome, SyncError> {
        let ticket = match self.observe(descriptor) {
            Ok(ticket) => ticket,
            Err(outcome) => return Ok(outcome),
        };
        let fetched = self.api.fetch_latest().await?;
        Ok(self.complete_fetch(ticket, fetched))
    }

    /// Persist the held document. On success edit mode ends; on failure edit
    /// mode stays active and a local backup is written so work is not lost.
    pub async fn save(&mut self) -> Result<Uuid, SyncError> {
        let input = ItineraryInput::from(self.doc.document().clone());
        match self.api.save_latest(&input).await {
            Ok(id) => {
                self.doc.finish_edit();
                Ok(id)
            }
            Err(e) => {
                self.write_backup();
                Err(e)
            }
        }
    }

    fn write_backup(&self) {
        let Some(path) = &self.backup_path else {
            return;
        };
        match serde_json::to_string_pretty(self.doc.document()) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::error!("failed to write local backup: {e}");
                } else {
                    tracing::info!(path = %path.display(), "unsaved work backed up locally");
                }
            }
            Err(e) => tracing::error!("failed to serialize local backup: {e}"),
        }
    }
}
