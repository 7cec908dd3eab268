mod events;

pub use events::event_stream;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::StoreError;
use crate::events::ServerEvent;
use crate::models::*;

use super::AppState;

// ============================================================
// Error Handling
// ============================================================

/// Error response body: every failing route answers `{"error": …}`.
///
/// Store failures are logged server-side in full; clients see the taxonomy
/// message (not found / validation) or a generic message for anything
/// internal, so SQL details never leak.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: e.to_string(),
            },
            StoreError::Validation(_) => Self {
                status: StatusCode::BAD_REQUEST,
                message: e.to_string(),
            },
            StoreError::Unavailable(_) => {
                tracing::error!("store unavailable: {e}");
                Self {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "store unavailable".to_string(),
                }
            }
            StoreError::Corrupt(_) => {
                tracing::error!("internal error: {e}");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal server error".to_string(),
                }
            }
        }
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: format!("{what} not found"),
    }
}

// ============================================================
// Itinerary document
// ============================================================

pub async fn get_latest_itinerary(State(state): State<AppState>) -> Json<Itinerary> {
    Json(state.store.read_latest())
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub id: Uuid,
}

/// The client save path: replace the latest document (or create the first).
pub async fn save_itinerary(
    State(state): State<AppState>,
    Json(input): Json<ItineraryInput>,
) -> Result<Json<SaveResponse>, ApiError> {
    let doc = state.store.replace_latest(input)?;
    Ok(Json(SaveResponse {
        success: true,
        id: doc.id,
    }))
}

pub async fn get_itinerary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Itinerary>, ApiError> {
    state
        .store
        .read_itinerary(id)
        .map(Json)
        .ok_or_else(|| not_found("itinerary"))
}

pub async fn replace_itinerary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ItineraryInput>,
) -> Result<Json<Itinerary>, ApiError> {
    Ok(Json(state.store.replace_itinerary(id, input)?))
}

pub async fn delete_itinerary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_itinerary(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_itineraries(
    State(state): State<AppState>,
) -> Result<Json<Vec<ItinerarySummary>>, ApiError> {
    Ok(Json(state.store.list_summaries()?))
}

// ============================================================
// Structural edits
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderInput {
    pub day_id: String,
    /// The day's item ids in their new order.
    pub items: Vec<String>,
}

pub async fn reorder_day(
    State(state): State<AppState>,
    Json(input): Json<ReorderInput>,
) -> Result<Json<Itinerary>, ApiError> {
    Ok(Json(state.store.reorder_day(&input.day_id, &input.items)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveItemInput {
    pub item_id: String,
    pub from_day_id: String,
    pub to_day_id: String,
    pub target_index: usize,
}

pub async fn move_item(
    State(state): State<AppState>,
    Json(input): Json<MoveItemInput>,
) -> Result<Json<Itinerary>, ApiError> {
    Ok(Json(state.store.move_item(
        &input.item_id,
        &input.from_day_id,
        &input.to_day_id,
        input.target_index,
    )?))
}

// ============================================================
// Item notes
// ============================================================

pub async fn list_notes(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Json<Vec<Note>> {
    Json(state.store.list_notes(&item_id))
}

pub async fn create_note(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(input): Json<NoteInput>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let note = state.store.add_note(&item_id, input)?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn update_note(
    State(state): State<AppState>,
    Path((item_id, note_id)): Path<(String, String)>,
    Json(input): Json<NoteInput>,
) -> Result<Json<Note>, ApiError> {
    Ok(Json(state.store.update_note(&item_id, &note_id, input)?))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path((item_id, note_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_note(&item_id, &note_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Scratch notes
// ============================================================

pub async fn list_temp_notes(State(state): State<AppState>) -> Json<Vec<TempNote>> {
    Json(state.store.list_temp_notes())
}

pub async fn upsert_temp_note(
    State(state): State<AppState>,
    Json(input): Json<TempNoteInput>,
) -> Result<Json<TempNote>, ApiError> {
    let note = state.store.upsert_temp_note(input)?;
    state.hub.broadcast(ServerEvent::temp_notes_updated());
    Ok(Json(note))
}

pub async fn delete_temp_note(
    State(state): State<AppState>,
    Path(note_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_temp_note(&note_id)?;
    state.hub.broadcast(ServerEvent::temp_notes_updated());
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Meta
// ============================================================

pub async fn version() -> impl IntoResponse {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": env!("CARGO_PKG_NAME"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
