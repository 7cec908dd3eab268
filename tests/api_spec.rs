use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;
use uuid::Uuid;
use wayfarer::api::create_router;
use wayfarer::db::Store;
use wayfarer::events::EventHub;
use wayfarer::models::*;

fn setup() -> (TestServer, Store) {
    let store = Store::open_memory().expect("Failed to create store");
    store.migrate().expect("Failed to migrate");
    let hub = EventHub::new();
    let app = create_router(store.clone(), hub);
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, store)
}

fn sample_input() -> ItineraryInput {
    let item = |id: &str, name: &str| Item {
        id: id.to_string(),
        kind: ItemKind::Attraction,
        time: "09:00".to_string(),
        name: name.to_string(),
        activity: String::new(),
    };
    ItineraryInput {
        title: "Kansai Trip".to_string(),
        subtitle: "8 days".to_string(),
        days: vec![
            Day {
                id: "d1".to_string(),
                date: "11/22".to_string(),
                title: "Day 1".to_string(),
                accommodation: "Airport Hotel".to_string(),
                items: vec![item("i1", "Castle"), item("i2", "Market"), item("i3", "Shrine")],
            },
            Day {
                id: "d2".to_string(),
                date: "11/23".to_string(),
                title: "Day 2".to_string(),
                accommodation: "City Hotel".to_string(),
                items: vec![item("i4", "Museum")],
            },
        ],
        notes: Default::default(),
    }
}

#[derive(serde::Deserialize)]
struct SaveResponse {
    success: bool,
    id: Uuid,
}

async fn save_sample(server: &TestServer) -> Uuid {
    let response = server.post("/api/itinerary").json(&sample_input()).await;
    response.assert_status_ok();
    let ack: SaveResponse = response.json();
    assert!(ack.success);
    ack.id
}

mod document {
    use super::*;

    #[tokio::test]
    async fn latest_returns_seed_when_store_is_empty() {
        let (server, _store) = setup();

        let response = server.get("/api/itinerary").await;
        response.assert_status_ok();
        let doc: Itinerary = response.json();
        assert_eq!(doc.id, Uuid::nil());
        assert!(!doc.days.is_empty());
    }

    #[tokio::test]
    async fn save_then_read_back_round_trips() {
        let (server, _store) = setup();
        let mut input = sample_input();
        input.notes.insert(
            "i1".to_string(),
            vec![Note {
                id: "n1".to_string(),
                priority: NotePriority::High,
                description: "tickets".to_string(),
                content: "buy at the gate".to_string(),
                kind: NoteKind::Text,
            }],
        );

        let response = server.post("/api/itinerary").json(&input).await;
        response.assert_status_ok();
        let ack: SaveResponse = response.json();

        let fetched: Itinerary = server
            .get(&format!("/api/itinerary/{}", ack.id))
            .await
            .json();
        assert_eq!(fetched.id, ack.id);
        assert_eq!(fetched.title, input.title);
        assert_eq!(fetched.days, input.days);
        assert_eq!(fetched.notes, input.notes);
    }

    #[tokio::test]
    async fn save_replaces_the_latest_document_in_place() {
        let (server, _store) = setup();
        let first = save_sample(&server).await;

        let mut input = sample_input();
        input.title = "Renamed Trip".to_string();
        let response = server.post("/api/itinerary").json(&input).await;
        let ack: SaveResponse = response.json();

        assert_eq!(ack.id, first, "save must update, not create a second row");
        let latest: Itinerary = server.get("/api/itinerary").await.json();
        assert_eq!(latest.title, "Renamed Trip");
    }

    #[tokio::test]
    async fn replace_by_unknown_id_is_404() {
        let (server, _store) = setup();
        let response = server
            .put(&format!("/api/itinerary/{}", Uuid::new_v4()))
            .json(&sample_input())
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn delete_removes_the_document() {
        let (server, _store) = setup();
        let id = save_sample(&server).await;

        let response = server.delete(&format!("/api/itinerary/{}", id)).await;
        response.assert_status(StatusCode::NO_CONTENT);

        server
            .get(&format!("/api/itinerary/{}", id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format!("/api/itinerary/{}", id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn summaries_are_ordered_by_recency() {
        let (server, store) = setup();
        let old = store
            .create_itinerary(sample_input())
            .expect("create failed");
        let mut newer = sample_input();
        newer.title = "Newer Trip".to_string();
        store.create_itinerary(newer).expect("create failed");

        let summaries: Vec<ItinerarySummary> = server.get("/api/itineraries").await.json();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].title, "Newer Trip");
        assert_eq!(summaries[1].id, old.id);
    }
}

mod notes {
    use super::*;

    #[tokio::test]
    async fn url_content_creates_a_link_note() {
        let (server, _store) = setup();
        save_sample(&server).await;

        let response = server
            .post("/api/itinerary/notes/i1")
            .json(&json!({ "description": "map", "content": "https://example.com" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let note: Note = response.json();
        assert_eq!(note.kind, NoteKind::Link);
    }

    #[tokio::test]
    async fn plain_content_creates_a_text_note() {
        let (server, _store) = setup();
        save_sample(&server).await;

        let note: Note = server
            .post("/api/itinerary/notes/i1")
            .json(&json!({ "description": "reminder", "content": "hello" }))
            .await
            .json();
        assert_eq!(note.kind, NoteKind::Text);
    }

    #[tokio::test]
    async fn empty_note_is_rejected() {
        let (server, _store) = setup();
        save_sample(&server).await;

        let response = server
            .post("/api/itinerary/notes/i1")
            .json(&json!({ "description": "", "content": "  " }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn created_notes_appear_in_the_document() {
        let (server, _store) = setup();
        save_sample(&server).await;

        let note: Note = server
            .post("/api/itinerary/notes/i2")
            .json(&json!({ "description": "lunch", "content": "ramen street" }))
            .await
            .json();

        let doc: Itinerary = server.get("/api/itinerary").await.json();
        assert_eq!(doc.notes["i2"], vec![note]);
    }

    #[tokio::test]
    async fn updating_a_note_recomputes_its_type() {
        let (server, _store) = setup();
        save_sample(&server).await;

        let note: Note = server
            .post("/api/itinerary/notes/i1")
            .json(&json!({ "description": "map", "content": "paper map" }))
            .await
            .json();
        assert_eq!(note.kind, NoteKind::Text);

        let updated: Note = server
            .put(&format!("/api/itinerary/notes/i1/{}", note.id))
            .json(&json!({ "description": "map", "content": "https://maps.example.com" }))
            .await
            .json();
        assert_eq!(updated.kind, NoteKind::Link);
    }

    #[tokio::test]
    async fn deleting_a_missing_note_is_404() {
        let (server, _store) = setup();
        save_sample(&server).await;

        server
            .delete("/api/itinerary/notes/i1/no-such-note")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

mod structure {
    use super::*;

    #[tokio::test]
    async fn reorder_changes_only_the_target_day() {
        let (server, _store) = setup();
        save_sample(&server).await;

        let response = server
            .put("/api/itinerary/reorder")
            .json(&json!({ "dayId": "d1", "items": ["i3", "i1", "i2"] }))
            .await;
        response.assert_status_ok();
        let doc: Itinerary = response.json();

        let ids: Vec<&str> = doc.days[0].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["i3", "i1", "i2"]);
        let other: Vec<&str> = doc.days[1].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(other, ["i4"]);
    }

    #[tokio::test]
    async fn reorder_rejects_a_non_permutation() {
        let (server, _store) = setup();
        save_sample(&server).await;

        server
            .put("/api/itinerary/reorder")
            .json(&json!({ "dayId": "d1", "items": ["i3", "i1"] }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .put("/api/itinerary/reorder")
            .json(&json!({ "dayId": "d1", "items": ["i3", "i1", "i1"] }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn move_item_across_days_preserves_everything_else() {
        let (server, _store) = setup();
        save_sample(&server).await;

        let response = server
            .put("/api/itinerary/move-item")
            .json(&json!({
                "itemId": "i3",
                "fromDayId": "d1",
                "toDayId": "d2",
                "targetIndex": 0
            }))
            .await;
        response.assert_status_ok();
        let doc: Itinerary = response.json();

        let d1: Vec<&str> = doc.days[0].items.iter().map(|i| i.id.as_str()).collect();
        let d2: Vec<&str> = doc.days[1].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(d1, ["i1", "i2"]);
        assert_eq!(d2, ["i3", "i4"]);
    }

    #[tokio::test]
    async fn move_item_clamps_the_target_index() {
        let (server, _store) = setup();
        save_sample(&server).await;

        let doc: Itinerary = server
            .put("/api/itinerary/move-item")
            .json(&json!({
                "itemId": "i1",
                "fromDayId": "d1",
                "toDayId": "d2",
                "targetIndex": 99
            }))
            .await
            .json();

        let d2: Vec<&str> = doc.days[1].items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(d2, ["i4", "i1"]);
    }

    #[tokio::test]
    async fn move_item_to_unknown_day_is_404() {
        let (server, _store) = setup();
        save_sample(&server).await;

        server
            .put("/api/itinerary/move-item")
            .json(&json!({
                "itemId": "i1",
                "fromDayId": "d1",
                "toDayId": "nope",
                "targetIndex": 0
            }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

mod temp_notes {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_then_updates_by_id() {
        let (server, _store) = setup();

        let created: TempNote = server
            .post("/api/temp-notes")
            .json(&json!({ "noteId": "scratch-1", "title": "packing", "content": "bring charger" }))
            .await
            .json();
        assert_eq!(created.kind, NoteKind::Text);

        let updated: TempNote = server
            .post("/api/temp-notes")
            .json(&json!({ "noteId": "scratch-1", "title": "packing", "content": "https://packlist.example" }))
            .await
            .json();
        assert_eq!(updated.kind, NoteKind::Link);
        assert_eq!(updated.created_at, created.created_at);

        let all: Vec<TempNote> = server.get("/api/temp-notes").await.json();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "https://packlist.example");
    }

    #[tokio::test]
    async fn upsert_without_content_is_rejected() {
        let (server, _store) = setup();

        server
            .post("/api/temp-notes")
            .json(&json!({ "noteId": "scratch-1", "title": "x", "content": "" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_removes_the_note() {
        let (server, _store) = setup();
        server
            .post("/api/temp-notes")
            .json(&json!({ "noteId": "scratch-1", "content": "x" }))
            .await
            .assert_status_ok();

        server
            .delete("/api/temp-notes/scratch-1")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete("/api/temp-notes/scratch-1")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}

mod meta {
    use super::*;

    #[tokio::test]
    async fn version_reports_crate_metadata() {
        let (server, _store) = setup();
        let body: serde_json::Value = server.get("/api/version").await.json();
        assert_eq!(body["name"], "wayfarer");
        assert!(body["version"].is_string());
        assert!(body["description"].is_string());
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (server, _store) = setup();
        let body: serde_json::Value = server.get("/api/health").await.json();
        assert_eq!(body["status"], "ok");
    }
}
