mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Store;
use crate::events::EventHub;

/// Shared handler state: the document store and the live-update hub.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub hub: EventHub,
}

pub fn create_router(store: Store, hub: EventHub) -> Router {
    let api = Router::new()
        // Itinerary document
        .route("/itinerary", get(handlers::get_latest_itinerary))
        .route("/itinerary", post(handlers::save_itinerary))
        .route("/itinerary/{id}", get(handlers::get_itinerary))
        .route("/itinerary/{id}", put(handlers::replace_itinerary))
        .route("/itinerary/{id}", delete(handlers::delete_itinerary))
        .route("/itineraries", get(handlers::list_itineraries))
        // Structural edits
        .route("/itinerary/reorder", put(handlers::reorder_day))
        .route("/itinerary/move-item", put(handlers::move_item))
        // Item notes (legacy auto-save path)
        .route("/itinerary/notes/{item_id}", get(handlers::list_notes))
        .route("/itinerary/notes/{item_id}", post(handlers::create_note))
        .route(
            "/itinerary/notes/{item_id}/{note_id}",
            put(handlers::update_note),
        )
        .route(
            "/itinerary/notes/{item_id}/{note_id}",
            delete(handlers::delete_note),
        )
        // Scratch notes
        .route("/temp-notes", get(handlers::list_temp_notes))
        .route("/temp-notes", post(handlers::upsert_temp_note))
        .route("/temp-notes/{note_id}", delete(handlers::delete_temp_note))
        // Live updates
        .route("/events", get(handlers::event_stream))
        // Meta
        .route("/version", get(handlers::version))
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { store, hub })
}
