//! The five note operations.
//!
//! Each operation takes a [`RequestEnvelope`], validates it into its typed
//! request, runs one store call and renders a [`ResponseEnvelope`]:
//!
//! - `add_note`    - unconditional put of a freshly identified note
//! - `delete_note` - delete by `(user_id, timestamp)`, idempotent
//! - `get_note`    - lookup through the `note_id` index, 204 when absent
//! - `get_notes`   - newest-first page of a user's notes
//! - `update_note` - replace, conditional on the stored timestamp and note_id
//!
//! Validation failures and store rejections are ordinary responses.
//! Failures inside the store, or before it answered, come back as
//! [`HandlerError`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use notes_core::{Item, Note, NoteKey, attr, decimal};
use notes_store::{Condition, NoteStore, Query, StoreError};

use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::requests::{
    CreateNoteRequest, DeleteNoteRequest, GetNoteRequest, ListNotesRequest, Operation,
    UpdateNoteRequest, ValidationError,
};

/// Store message for a key that does not fit the table's key schema.
pub const KEY_SCHEMA_MISMATCH: &str = "The provided key element does not match the schema";

/// Result of one operation.
pub type HandlerResult = Result<ResponseEnvelope, HandlerError>;

/// A failure the handler cannot turn into a response.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The store failed internally, or could not be reached.
    #[error("{operation}() - {source}")]
    Store {
        operation: Operation,
        #[source]
        source: StoreError,
    },

    /// A response body could not be serialized.
    #[error("{operation}() - cannot encode response: {message}")]
    Encode {
        operation: Operation,
        message: String,
    },
}

impl HandlerError {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Store { operation, .. } | Self::Encode { operation, .. } => *operation,
        }
    }
}

/// Body returned when the store refuses a request.
#[derive(Debug, Serialize)]
struct StoreErrorBody {
    operation: &'static str,
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<Item>,
}

/// Runs the note operations against one store.
#[derive(Clone)]
pub struct NotesHandler {
    store: Arc<dyn NoteStore>,
    note_id_index: String,
    clock: fn() -> DateTime<Utc>,
}

impl NotesHandler {
    pub fn new(store: Arc<dyn NoteStore>, note_id_index: impl Into<String>) -> Self {
        Self {
            store,
            note_id_index: note_id_index.into(),
            clock: Utc::now,
        }
    }

    /// Replace the wall clock, for tests.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    /// Dispatch `envelope` to the operation named by `operation`.
    pub async fn handle(&self, operation: Operation, envelope: &RequestEnvelope) -> HandlerResult {
        match operation {
            Operation::AddNote => self.add_note(envelope).await,
            Operation::DeleteNote => self.delete_note(envelope).await,
            Operation::GetNote => self.get_note(envelope).await,
            Operation::GetNotes => self.get_notes(envelope).await,
            Operation::UpdateNote => self.update_note(envelope).await,
        }
    }

    pub async fn add_note(&self, envelope: &RequestEnvelope) -> HandlerResult {
        let operation = Operation::AddNote;
        let request = match CreateNoteRequest::from_envelope(envelope) {
            Ok(request) => request,
            Err(e) => return Ok(reject(operation, envelope, e)),
        };

        let note = Note::create(
            request.user_id,
            request.user_name,
            request.attributes,
            (self.clock)(),
        );
        let item = note.into_item();

        if let Err(e) = self.store.put(&item).await {
            return store_failure(operation, envelope, e, None, None);
        }

        let note_id = item.get(attr::NOTE_ID).and_then(Value::as_str);
        tracing::info!(
            operation = %operation,
            request_id = envelope.request_id.as_deref(),
            note_id,
            "Note created"
        );

        ok(operation, &item)
    }

    pub async fn delete_note(&self, envelope: &RequestEnvelope) -> HandlerResult {
        let operation = Operation::DeleteNote;
        let request = match DeleteNoteRequest::from_envelope(envelope) {
            Ok(request) => request,
            Err(e) => return Ok(reject(operation, envelope, e)),
        };

        if let Err(e) = self.store.delete(&request.key).await {
            // Echo the key back when it does not fit the table's schema
            let key = e
                .fault()
                .filter(|fault| fault.message == KEY_SCHEMA_MISMATCH)
                .map(|_| decimal::encode_item(request.key.to_item()));
            return store_failure(operation, envelope, e, None, key);
        }

        tracing::info!(
            operation = %operation,
            request_id = envelope.request_id.as_deref(),
            user_id = %request.key.user_id,
            timestamp = request.key.timestamp,
            "Note deleted"
        );

        Ok(ResponseEnvelope::ok_empty())
    }

    pub async fn get_note(&self, envelope: &RequestEnvelope) -> HandlerResult {
        let operation = Operation::GetNote;
        let request = match GetNoteRequest::from_envelope(envelope) {
            Ok(request) => request,
            Err(e) => return Ok(reject(operation, envelope, e)),
        };

        let query = Query::index(&self.note_id_index, attr::NOTE_ID, request.note_id.as_str())
            .limit(1);
        let page = match self.store.query(&query).await {
            Ok(page) => page,
            Err(e) => return store_failure(operation, envelope, e, None, None),
        };

        match page.items.into_iter().next() {
            Some(item) => ok(operation, &item),
            None => {
                tracing::debug!(
                    operation = %operation,
                    note_id = %request.note_id,
                    "No note with this id"
                );
                Ok(ResponseEnvelope::no_content())
            }
        }
    }

    pub async fn get_notes(&self, envelope: &RequestEnvelope) -> HandlerResult {
        let operation = Operation::GetNotes;
        let request = match ListNotesRequest::from_envelope(envelope) {
            Ok(request) => request,
            Err(e) => return Ok(reject(operation, envelope, e)),
        };

        let mut query = Query::partition(&request.user_id)
            .limit(request.limit)
            .newest_first();
        if let Some(start) = request.start {
            query = query.start_after(NoteKey::new(&request.user_id, start));
        }

        let page = match self.store.query(&query).await {
            Ok(page) => page,
            Err(e) => return store_failure(operation, envelope, e, None, None),
        };

        tracing::debug!(
            operation = %operation,
            user_id = %request.user_id,
            count = page.count,
            more = page.last_evaluated_key.is_some(),
            "Listed notes"
        );

        ok(operation, &page)
    }

    pub async fn update_note(&self, envelope: &RequestEnvelope) -> HandlerResult {
        let operation = Operation::UpdateNote;
        let request = match UpdateNoteRequest::from_envelope(envelope) {
            Ok(request) => request,
            Err(e) => return Ok(reject(operation, envelope, e)),
        };

        let timestamp = request.timestamp;
        // The stored note must carry the same note_id, which can never change
        let condition = Condition::attribute_equals(attr::TIMESTAMP, timestamp)
            .and_equals(attr::NOTE_ID, request.note_id.as_str());

        let note = Note::revise(
            request.user_id,
            request.user_name,
            request.note_id,
            timestamp,
            request.attributes,
            (self.clock)(),
        );
        let item = note.into_item();

        // Concurrent updates of the same note can still overwrite each other

        if let Err(e) = self.store.put_if(&item, &condition).await {
            let debug = matches!(e, StoreError::ConditionalCheckFailed(_))
                .then(|| format!("No matching notes with timestamp='{}'", timestamp));
            return store_failure(operation, envelope, e, debug, None);
        }

        let note_id = item.get(attr::NOTE_ID).and_then(Value::as_str);
        tracing::info!(
            operation = %operation,
            request_id = envelope.request_id.as_deref(),
            note_id,
            "Note updated"
        );

        ok(operation, &item)
    }
}

impl fmt::Debug for NotesHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesHandler")
            .field("backend", &self.store.backend())
            .field("note_id_index", &self.note_id_index)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Responses
// ============================================================================

fn ok<T: Serialize>(operation: Operation, value: &T) -> HandlerResult {
    decimal::to_body(value)
        .map(ResponseEnvelope::ok)
        .map_err(|e| HandlerError::Encode {
            operation,
            message: e.to_string(),
        })
}

fn reject(
    operation: Operation,
    envelope: &RequestEnvelope,
    error: ValidationError,
) -> ResponseEnvelope {
    let message = format!("{}() - {}", operation, error);
    tracing::warn!(
        operation = %operation,
        request_id = envelope.request_id.as_deref(),
        error = %error,
        "Rejected request"
    );
    ResponseEnvelope::rejected(operation.rejection_status(), message)
}

/// Turns a store error into a response, or propagates it when the store
/// failed internally or never answered.
fn store_failure(
    operation: Operation,
    envelope: &RequestEnvelope,
    error: StoreError,
    debug: Option<String>,
    key: Option<Item>,
) -> HandlerResult {
    let fault = match &error {
        StoreError::ConditionalCheckFailed(fault) | StoreError::Rejected(fault) => fault,
        _ => {
            tracing::error!(
                severity = "critical",
                operation = %operation,
                request_id = envelope.request_id.as_deref(),
                store_request_id = error.fault().and_then(|f| f.request_id.as_deref()),
                status = error.fault().map(|f| f.status),
                error = %error,
                "Store failure"
            );
            return Err(HandlerError::Store {
                operation,
                source: error,
            });
        }
    };

    tracing::warn!(
        operation = %operation,
        request_id = envelope.request_id.as_deref(),
        store_request_id = fault.request_id.as_deref(),
        code = %fault.code,
        status = fault.status,
        store_message = %fault.message,
        "Store refused request"
    );

    let body = StoreErrorBody {
        operation: operation.name(),
        code: fault.code.clone(),
        message: fault.message.clone(),
        debug: debug.clone(),
        key,
    };
    let body = serde_json::to_string(&body).map_err(|e| HandlerError::Encode {
        operation,
        message: e.to_string(),
    })?;

    Ok(ResponseEnvelope::store_error(fault.status, body, debug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use notes_store::{MemoryStore, Page, StoreFault, StoreResult};
    use serde_json::json;

    use crate::requests::{USER_ID_HEADER, USER_NAME_HEADER};

    const NOW: i64 = 1_723_331_552;

    fn object(value: Value) -> Item {
        value.as_object().cloned().unwrap()
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW, 0).unwrap()
    }

    fn handler() -> (NotesHandler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let handler = NotesHandler::new(store.clone(), "note_id-index").with_clock(fixed_clock);
        (handler, store)
    }

    fn user(envelope: RequestEnvelope) -> RequestEnvelope {
        envelope
            .with_header(USER_ID_HEADER, "u1")
            .with_header(USER_NAME_HEADER, "U One")
    }

    async fn seed(store: &MemoryStore, user_id: &str, timestamp: i64) {
        let item = object(json!({
            "user_id": user_id,
            "user_name": "seeded",
            "note_id": format!("{}:{}", user_id, timestamp),
            "timestamp": timestamp,
            "expires": timestamp + 15_552_000,
            "title": format!("note {}", timestamp),
        }));
        store.put(&item).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_note() {
        let (handler, store) = handler();
        let envelope = user(RequestEnvelope::new().with_body(
            json!({"Item": {"title": "t", "content": "c"}}).to_string(),
        ));

        let response = handler.add_note(&envelope).await.unwrap();
        assert_eq!(response.status_code, 200);

        let body = response.json_body().unwrap();
        assert_eq!(body["user_id"], json!("u1"));
        assert_eq!(body["user_name"], json!("U One"));
        assert_eq!(body["title"], json!("t"));
        // Numbers come back as decimal strings
        assert_eq!(body["timestamp"], json!(NOW.to_string()));
        assert_eq!(body["expires"], json!((NOW + 15_552_000).to_string()));

        let note_id = body["note_id"].as_str().unwrap();
        let suffix = note_id.strip_prefix("u1:").unwrap();
        assert!(uuid::Uuid::parse_str(suffix).is_ok());

        let stored = store.get(&NoteKey::new("u1", NOW)).await.unwrap();
        assert_eq!(stored["timestamp"], json!(NOW));
    }

    #[tokio::test]
    async fn test_add_note_without_user_writes_nothing() {
        let (handler, store) = handler();
        let envelope = RequestEnvelope::new()
            .with_body(json!({"Item": {"title": "t"}}).to_string())
            .with_header(USER_NAME_HEADER, "U One");

        let response = handler.add_note(&envelope).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.error.as_deref(),
            Some("add_note() - Cannot find 'app_user_id' in 'headers'")
        );
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_note_is_idempotent() {
        let (handler, store) = handler();
        seed(&store, "u1", 100).await;
        let envelope = user(RequestEnvelope::new().with_path_parameter("timestamp", "100"));

        let first = handler.delete_note(&envelope).await.unwrap();
        let second = handler.delete_note(&envelope).await.unwrap();
        assert_eq!(first.status_code, 200);
        assert_eq!(second.status_code, 200);
        assert_eq!(first.body, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_note_without_user() {
        let (handler, store) = handler();
        let envelope = RequestEnvelope::new().with_path_parameter("timestamp", "123");

        let response = handler.delete_note(&envelope).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_get_note_found_and_absent() {
        let (handler, store) = handler();
        seed(&store, "u1", 100).await;

        let found = handler
            .get_note(&RequestEnvelope::new().with_path_parameter("note_id", "u1:100"))
            .await
            .unwrap();
        assert_eq!(found.status_code, 200);
        assert_eq!(found.json_body().unwrap()["title"], json!("note 100"));

        let absent = handler
            .get_note(&RequestEnvelope::new().with_path_parameter("note_id", "u1:nope"))
            .await
            .unwrap();
        assert_eq!(absent.status_code, 204);
        assert_eq!(absent.body, None);
    }

    #[tokio::test]
    async fn test_get_note_without_id_is_not_found() {
        let (handler, _) = handler();
        let response = handler.get_note(&RequestEnvelope::new()).await.unwrap();
        assert_eq!(response.status_code, 404);
        assert_eq!(
            response.error.as_deref(),
            Some("get_note() - No 'note_id' in 'pathParameters'")
        );
    }

    #[tokio::test]
    async fn test_get_notes_pages_newest_first() {
        let (handler, store) = handler();
        for ts in [100, 200, 300, 400] {
            seed(&store, "u1", ts).await;
        }
        seed(&store, "u2", 250).await;

        let envelope = RequestEnvelope::new()
            .with_header(USER_ID_HEADER, "u1")
            .with_query_parameter("limit", "2");
        let first = handler.get_notes(&envelope).await.unwrap().json_body().unwrap();
        assert_eq!(first["Count"], json!("2"));
        assert_eq!(first["Items"][0]["timestamp"], json!("400"));
        assert_eq!(first["Items"][1]["timestamp"], json!("300"));
        assert_eq!(first["LastEvaluatedKey"]["timestamp"], json!("300"));

        let envelope = envelope.with_query_parameter("start", "300");
        let second = handler.get_notes(&envelope).await.unwrap().json_body().unwrap();
        assert_eq!(second["Count"], json!("2"));
        assert_eq!(second["Items"][0]["timestamp"], json!("200"));
        assert_eq!(second["Items"][1]["timestamp"], json!("100"));
        assert!(second.get("LastEvaluatedKey").is_none());
    }

    #[tokio::test]
    async fn test_get_notes_default_limit() {
        let (handler, store) = handler();
        for ts in 1..=7 {
            seed(&store, "u1", ts).await;
        }
        let envelope = RequestEnvelope::new().with_header(USER_ID_HEADER, "u1");
        let page = handler.get_notes(&envelope).await.unwrap().json_body().unwrap();
        assert_eq!(page["Items"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_get_notes_without_user_is_not_found() {
        let (handler, _) = handler();
        let response = handler.get_notes(&RequestEnvelope::new()).await.unwrap();
        assert_eq!(response.status_code, 404);
    }

    #[tokio::test]
    async fn test_update_note() {
        let (handler, store) = handler();
        seed(&store, "u1", 100).await;
        let envelope = user(RequestEnvelope::new().with_body(
            json!({"Item": {"note_id": "u1:100", "timestamp": "100", "title": "edited"}})
                .to_string(),
        ));

        let response = handler.update_note(&envelope).await.unwrap();
        assert_eq!(response.status_code, 200);
        let body = response.json_body().unwrap();
        assert_eq!(body["title"], json!("edited"));
        assert_eq!(body["timestamp"], json!("100"));
        assert_eq!(body["expires"], json!((NOW + 15_552_000).to_string()));

        let stored = store.get(&NoteKey::new("u1", 100)).await.unwrap();
        assert_eq!(stored["title"], json!("edited"));
        assert_eq!(stored["user_name"], json!("U One"));
    }

    #[tokio::test]
    async fn test_update_unknown_timestamp_fails_condition() {
        let (handler, store) = handler();
        let envelope = user(RequestEnvelope::new().with_body(
            json!({"Item": {"note_id": "u1:999", "timestamp": 999, "title": "x"}}).to_string(),
        ));

        let response = handler.update_note(&envelope).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.debug.as_deref(),
            Some("No matching notes with timestamp='999'")
        );
        let body = response.json_body().unwrap();
        assert_eq!(body["operation"], json!("update_note"));
        assert_eq!(body["code"], json!("ConditionalCheckFailedException"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_cannot_change_note_id() {
        let (handler, store) = handler();
        seed(&store, "u1", 100).await;
        let envelope = user(RequestEnvelope::new().with_body(
            json!({"Item": {"note_id": "u1:hijacked", "timestamp": 100, "title": "x"}})
                .to_string(),
        ));

        let response = handler.update_note(&envelope).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.json_body().unwrap()["code"],
            json!("ConditionalCheckFailedException")
        );

        let stored = store.get(&NoteKey::new("u1", 100)).await.unwrap();
        assert_eq!(stored["note_id"], json!("u1:100"));
        assert_eq!(stored["title"], json!("note 100"));

        let found = handler
            .get_note(&RequestEnvelope::new().with_path_parameter("note_id", "u1:100"))
            .await
            .unwrap();
        assert_eq!(found.status_code, 200);
    }

    #[tokio::test]
    async fn test_update_without_user_writes_nothing() {
        let (handler, store) = handler();
        let envelope = RequestEnvelope::new()
            .with_body(json!({"Item": {"note_id": "u1:1", "timestamp": 1}}).to_string());

        let response = handler.update_note(&envelope).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert_eq!(store.write_count(), 0);
    }

    /// Store that fails every call with a fixed error.
    struct FailingStore(fn() -> StoreError);

    #[async_trait]
    impl NoteStore for FailingStore {
        fn backend(&self) -> &'static str {
            "failing"
        }

        async fn put(&self, _item: &Item) -> StoreResult<()> {
            Err((self.0)())
        }

        async fn put_if(&self, _item: &Item, _condition: &Condition) -> StoreResult<()> {
            Err((self.0)())
        }

        async fn delete(&self, _key: &NoteKey) -> StoreResult<()> {
            Err((self.0)())
        }

        async fn query(&self, _query: &Query) -> StoreResult<Page> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn test_internal_store_error_propagates() {
        let store = Arc::new(FailingStore(|| {
            StoreError::from_fault(StoreFault::new("InternalServerError", "boom", 500))
        }));
        let handler = NotesHandler::new(store, "note_id-index");
        let envelope = RequestEnvelope::new().with_header(USER_ID_HEADER, "u1");

        let err = handler.get_notes(&envelope).await.unwrap_err();
        assert_eq!(err.operation(), Operation::GetNotes);
        assert!(matches!(err, HandlerError::Store { .. }));
    }

    #[tokio::test]
    async fn test_rejected_store_error_passes_through() {
        let store = Arc::new(FailingStore(|| {
            StoreError::from_fault(StoreFault::new(
                "ResourceNotFoundException",
                "Requested resource not found",
                400,
            ))
        }));
        let handler = NotesHandler::new(store, "note_id-index");
        let envelope = RequestEnvelope::new().with_path_parameter("note_id", "u1:1");

        let response = handler.get_note(&envelope).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.json_body().unwrap(),
            json!({
                "operation": "get_note",
                "code": "ResourceNotFoundException",
                "message": "Requested resource not found"
            })
        );
    }

    #[tokio::test]
    async fn test_delete_key_schema_mismatch_echoes_key() {
        let store = Arc::new(FailingStore(|| {
            StoreError::from_fault(StoreFault::new(
                "ValidationException",
                KEY_SCHEMA_MISMATCH,
                400,
            ))
        }));
        let handler = NotesHandler::new(store, "note_id-index");
        let envelope = RequestEnvelope::new()
            .with_path_parameter("timestamp", "123")
            .with_header(USER_ID_HEADER, "u1");

        let response = handler.delete_note(&envelope).await.unwrap();
        let body = response.json_body().unwrap();
        assert_eq!(body["key"], json!({"user_id": "u1", "timestamp": "123"}));
    }

    #[tokio::test]
    async fn test_handle_dispatches() {
        let (handler, _) = handler();
        let response = handler
            .handle(Operation::GetNote, &RequestEnvelope::new())
            .await
            .unwrap();
        assert_eq!(response.status_code, 404);
    }
}
