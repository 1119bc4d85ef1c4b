//! Note routes.
//!
//! - POST /note - Create a note (`add_note`)
//! - DELETE /note/t/{timestamp} - Delete a note by timestamp (`delete_note`)
//! - GET /note/n/{note_id} - Fetch a note by id (`get_note`)
//! - GET /notes - List the caller's notes, newest first (`get_notes`)
//! - PATCH /note - Replace an existing note (`update_note`)
//!
//! Each route only translates between HTTP and envelopes. The caller's
//! identity comes from the `app_user_id` and `app_user_name` headers, taken
//! as-is; authentication has to happen in front of this service.

use std::collections::HashMap;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post},
};

use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::ApiResult;
use crate::middleware::request_id::request_id_from;
use crate::requests::Operation;
use crate::state::AppState;

type Params = HashMap<String, String>;

// ============================================================================
// Envelope Construction
// ============================================================================

/// Builds the envelope for one HTTP request.
///
/// Header names arrive lowercased. Values that are not valid text are
/// dropped, and when a header repeats the first value wins. Empty maps and
/// an empty body are treated as absent.
pub fn envelope_from_parts(
    headers: &HeaderMap,
    path: Params,
    query: Params,
    body: String,
) -> RequestEnvelope {
    let mut header_map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            header_map
                .entry(name.as_str().to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    RequestEnvelope {
        headers: Some(header_map),
        path_parameters: non_empty(path),
        query_string_parameters: non_empty(query),
        body: (!body.is_empty()).then_some(body),
        request_id: request_id_from(headers),
    }
}

fn non_empty(params: Params) -> Option<Params> {
    (!params.is_empty()).then_some(params)
}

async fn run(
    state: &AppState,
    operation: Operation,
    envelope: RequestEnvelope,
) -> ApiResult<ResponseEnvelope> {
    Ok(state.handler().handle(operation, &envelope).await?)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /note - Create a note.
///
/// Body: `{ "Item": { ... } }`. Responds with the stored item.
async fn add_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<ResponseEnvelope> {
    let envelope = envelope_from_parts(&headers, Params::new(), Params::new(), body);
    run(&state, Operation::AddNote, envelope).await
}

/// DELETE /note/t/{timestamp} - Delete one of the caller's notes.
async fn delete_note(
    State(state): State<AppState>,
    Path(path): Path<Params>,
    headers: HeaderMap,
) -> ApiResult<ResponseEnvelope> {
    let envelope = envelope_from_parts(&headers, path, Params::new(), String::new());
    run(&state, Operation::DeleteNote, envelope).await
}

/// GET /note/n/{note_id} - Fetch a note; 204 when there is none.
async fn get_note(
    State(state): State<AppState>,
    Path(path): Path<Params>,
    headers: HeaderMap,
) -> ApiResult<ResponseEnvelope> {
    let envelope = envelope_from_parts(&headers, path, Params::new(), String::new());
    run(&state, Operation::GetNote, envelope).await
}

/// GET /notes?limit=&start= - One page of the caller's notes.
async fn get_notes(
    State(state): State<AppState>,
    Query(query): Query<Params>,
    headers: HeaderMap,
) -> ApiResult<ResponseEnvelope> {
    let envelope = envelope_from_parts(&headers, Params::new(), query, String::new());
    run(&state, Operation::GetNotes, envelope).await
}

/// PATCH /note - Replace a note identified by `note_id` and `timestamp`.
async fn update_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<ResponseEnvelope> {
    let envelope = envelope_from_parts(&headers, Params::new(), Params::new(), body);
    run(&state, Operation::UpdateNote, envelope).await
}

/// Build note routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/note", post(add_note).patch(update_note))
        .route("/note/t/{timestamp}", delete(delete_note))
        .route("/note/n/{note_id}", get(get_note))
        .route("/notes", get(get_notes))
}
