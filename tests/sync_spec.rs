use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use wayfarer::models::{ChangeDescriptor, Itinerary, ItineraryInput, Note, NoteKind, NotePriority};
use wayfarer::sync::{
    ConnectionState, DocumentApi, DocumentSession, SyncClient, SyncError, SyncOutcome,
};

/// Scripted transport: tests queue fetch/save results up front and assert on
/// how many fetches the session actually issued.
struct MockApi {
    fetches: RefCell<VecDeque<Result<Itinerary, SyncError>>>,
    saves: RefCell<VecDeque<Result<Uuid, SyncError>>>,
    fetch_calls: Cell<usize>,
}

impl MockApi {
    fn new() -> Self {
        Self {
            fetches: RefCell::new(VecDeque::new()),
            saves: RefCell::new(VecDeque::new()),
            fetch_calls: Cell::new(0),
        }
    }

    fn queue_fetch(&self, result: Result<Itinerary, SyncError>) {
        self.fetches.borrow_mut().push_back(result);
    }

    fn queue_save(&self, result: Result<Uuid, SyncError>) {
        self.saves.borrow_mut().push_back(result);
    }
}

impl DocumentApi for &MockApi {
    async fn fetch_latest(&self) -> Result<Itinerary, SyncError> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        self.fetches
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Transport("no scripted fetch".into())))
    }

    async fn save_latest(&self, _input: &ItineraryInput) -> Result<Uuid, SyncError> {
        self.saves
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Transport("no scripted save".into())))
    }
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 22, 9, minute, 0).unwrap()
}

fn doc(title: &str, minute: u32) -> Itinerary {
    Itinerary {
        id: Uuid::nil(),
        title: title.to_string(),
        subtitle: String::new(),
        days: Vec::new(),
        notes: Default::default(),
        created_at: at(0),
        updated_at: at(minute),
    }
}

fn descriptor(minute: u32) -> ChangeDescriptor {
    ChangeDescriptor {
        id: Uuid::nil(),
        title: "Trip".to_string(),
        updated_at: at(minute),
    }
}

#[tokio::test]
async fn idle_change_is_fetched_and_applied() {
    let api = MockApi::new();
    api.queue_fetch(Ok(doc("Remote", 1)));

    let mut session = DocumentSession::new(&api, doc("Local", 0));
    let outcome = session.handle_change(descriptor(1)).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Applied);
    assert_eq!(session.document().title, "Remote");
    assert_eq!(api.fetch_calls.get(), 1);
}

#[tokio::test]
async fn identical_fetch_reports_unchanged() {
    let api = MockApi::new();
    api.queue_fetch(Ok(doc("Same", 1)));

    let mut session = DocumentSession::new(&api, doc("Same", 1));
    let outcome = session.handle_change(descriptor(1)).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Unchanged);
}

#[tokio::test]
async fn change_during_edit_raises_conflict_without_fetching() {
    let api = MockApi::new();
    let mut session = DocumentSession::new(&api, doc("Local", 0));
    session.editable().enter_edit();
    session.editable().set_title("Local draft");

    let outcome = session.handle_change(descriptor(1)).await.unwrap();

    assert!(matches!(outcome, SyncOutcome::Conflict(d) if d.updated_at == at(1)));
    assert_eq!(api.fetch_calls.get(), 0, "conflict must not trigger a fetch");
    assert_eq!(session.document().title, "Local draft");
}

#[tokio::test]
async fn superseded_fetch_response_is_discarded() {
    let api = MockApi::new();
    let mut session = DocumentSession::new(&api, doc("Local", 0));

    // Two descriptors arrive before either fetch resolves.
    let first = session.observe(descriptor(1)).unwrap();
    let second = session.observe(descriptor(2)).unwrap();

    assert_eq!(
        session.complete_fetch(first, doc("Older", 1)),
        SyncOutcome::Stale
    );
    assert_eq!(session.document().title, "Local");

    assert_eq!(
        session.complete_fetch(second, doc("Newer", 2)),
        SyncOutcome::Applied
    );
    assert_eq!(session.document().title, "Newer");
}

#[tokio::test]
async fn edit_entered_mid_fetch_turns_into_conflict() {
    let api = MockApi::new();
    let mut session = DocumentSession::new(&api, doc("Local", 0));

    let ticket = session.observe(descriptor(1)).unwrap();
    session.editable().enter_edit();

    let outcome = session.complete_fetch(ticket, doc("Remote", 1));
    assert!(matches!(outcome, SyncOutcome::Conflict(_)));
    assert_eq!(session.document().title, "Local");
    assert!(session.is_editing());
}

#[tokio::test]
async fn cancel_edit_restores_the_snapshot() {
    let api = MockApi::new();
    let mut session = DocumentSession::new(&api, doc("Original", 0));

    let editable = session.editable();
    editable.enter_edit();
    editable.set_title("Scribbles");
    editable.add_note(
        "i1",
        Note {
            id: "n1".to_string(),
            priority: NotePriority::Medium,
            description: "check in".to_string(),
            content: "https://example.com".to_string(),
            kind: NoteKind::Text,
        },
    );
    assert_eq!(editable.document().notes["i1"][0].kind, NoteKind::Link);

    editable.cancel_edit();
    assert!(!session.is_editing());
    assert_eq!(session.document().title, "Original");
    assert!(session.document().notes.is_empty());
}

#[tokio::test]
async fn successful_save_ends_the_edit() {
    let api = MockApi::new();
    api.queue_save(Ok(Uuid::new_v4()));

    let mut session = DocumentSession::new(&api, doc("Local", 0));
    session.editable().enter_edit();
    session.editable().set_title("Edited");

    session.save().await.unwrap();
    assert!(!session.is_editing());
    assert_eq!(session.document().title, "Edited");
}

#[tokio::test]
async fn failed_save_keeps_the_edit_and_writes_a_backup() {
    let dir = tempfile::tempdir().unwrap();
    let backup = dir.path().join("backup.json");

    let api = MockApi::new();
    api.queue_save(Err(SyncError::Transport("server down".into())));

    let mut session =
        DocumentSession::new(&api, doc("Local", 0)).with_backup_path(backup.clone());
    session.editable().enter_edit();
    session.editable().set_title("Unsaved work");

    assert!(session.save().await.is_err());
    assert!(session.is_editing(), "edit must survive a failed save");

    let saved: Itinerary =
        serde_json::from_str(&std::fs::read_to_string(&backup).unwrap()).unwrap();
    assert_eq!(saved.title, "Unsaved work");
}

#[tokio::test]
async fn remove_item_drops_its_notes_too() {
    let api = MockApi::new();
    let mut base = doc("Local", 0);
    base.days.push(wayfarer::models::Day {
        id: "d1".to_string(),
        date: "11/22".to_string(),
        title: "Day 1".to_string(),
        accommodation: String::new(),
        items: vec![wayfarer::models::Item {
            id: "i1".to_string(),
            kind: wayfarer::models::ItemKind::City,
            time: "10:00".to_string(),
            name: "stop".to_string(),
            activity: String::new(),
        }],
    });
    base.notes.insert(
        "i1".to_string(),
        vec![Note {
            id: "n1".to_string(),
            priority: NotePriority::Low,
            description: "x".to_string(),
            content: String::new(),
            kind: NoteKind::Text,
        }],
    );

    let mut session = DocumentSession::new(&api, base);
    let editable = session.editable();
    editable.enter_edit();
    assert!(editable.remove_item("i1"));
    assert!(editable.document().days[0].items.is_empty());
    assert!(editable.document().notes.is_empty());
}

#[tokio::test]
async fn connection_state_walks_the_reconnect_cycle() {
    let api = MockApi::new();
    let session = DocumentSession::new(&api, doc("Local", 0));
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut client = SyncClient::new("http://127.0.0.1:0", session, stop_rx);

    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.on_connect_started();
    assert_eq!(client.state(), ConnectionState::Connecting);

    client.on_transport_open();
    assert_eq!(client.state(), ConnectionState::Connected);

    let first = client.on_transport_error();
    assert_eq!(client.state(), ConnectionState::ReconnectWait);
    assert_eq!(first, Duration::from_secs(1));

    client.on_reconnect_timer();
    let second = client.on_transport_error();
    assert_eq!(second, Duration::from_millis(1500));

    // A successful open resets the backoff schedule.
    client.on_transport_open();
    assert_eq!(client.on_transport_error(), Duration::from_secs(1));

    client.on_disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
