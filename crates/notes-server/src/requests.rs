//! Typed requests, one per operation.
//!
//! Every envelope is validated up front into its operation's request type.
//! Checks run in a fixed order and the first failure wins, so a caller
//! always learns about the earliest missing piece.

use std::fmt;

use notes_core::decimal::parse_epoch_seconds;
use notes_core::{Item, NoteId, NoteKey, attr};
use serde_json::Value;

use crate::envelope::RequestEnvelope;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "app_user_id";
/// Header carrying the caller's display name.
pub const USER_NAME_HEADER: &str = "app_user_name";
/// Body field wrapping the note attributes.
pub const ITEM_FIELD: &str = "Item";

/// Page size for list requests without `limit`.
pub const DEFAULT_LIST_LIMIT: u32 = 5;

/// The five note operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddNote,
    DeleteNote,
    GetNote,
    GetNotes,
    UpdateNote,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::AddNote => "add_note",
            Self::DeleteNote => "delete_note",
            Self::GetNote => "get_note",
            Self::GetNotes => "get_notes",
            Self::UpdateNote => "update_note",
        }
    }

    /// Status for a request that fails validation.
    pub fn rejection_status(self) -> u16 {
        match self {
            Self::GetNote | Self::GetNotes => 404,
            Self::AddNote | Self::DeleteNote | Self::UpdateNote => 400,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an envelope was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Cannot find 'body' in event")]
    MissingBody,

    #[error("Cannot parse 'body' as a JSON object: {0}")]
    MalformedBody(String),

    #[error("Cannot find 'Item' in body")]
    MissingItem,

    #[error("Cannot find '{0}' in 'headers'")]
    MissingHeader(&'static str),

    #[error("No '{0}' in 'pathParameters'")]
    MissingPathParameter(&'static str),

    #[error("Cannot find '{0}' in 'Item'")]
    MissingItemField(&'static str),

    #[error("Invalid '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

// ============================================================================
// Requests
// ============================================================================

/// Create a note (`add_note`).
#[derive(Debug, Clone, PartialEq)]
pub struct CreateNoteRequest {
    pub user_id: String,
    pub user_name: String,
    pub attributes: Item,
}

impl CreateNoteRequest {
    pub fn from_envelope(envelope: &RequestEnvelope) -> Result<Self, ValidationError> {
        let attributes = item_from_body(envelope)?;
        let user_id = required_header(envelope, USER_ID_HEADER)?;
        let user_name = required_header(envelope, USER_NAME_HEADER)?;
        Ok(Self {
            user_id,
            user_name,
            attributes,
        })
    }
}

/// Delete a note by key (`delete_note`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteNoteRequest {
    pub key: NoteKey,
}

impl DeleteNoteRequest {
    pub fn from_envelope(envelope: &RequestEnvelope) -> Result<Self, ValidationError> {
        let raw_timestamp = envelope
            .path_parameter(attr::TIMESTAMP)
            .ok_or(ValidationError::MissingPathParameter(attr::TIMESTAMP))?;
        let timestamp = epoch_seconds(attr::TIMESTAMP, &Value::from(raw_timestamp))?;
        let user_id = required_header(envelope, USER_ID_HEADER)?;
        Ok(Self {
            key: NoteKey::new(user_id, timestamp),
        })
    }
}

/// Look a note up by id (`get_note`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetNoteRequest {
    pub note_id: NoteId,
}

impl GetNoteRequest {
    pub fn from_envelope(envelope: &RequestEnvelope) -> Result<Self, ValidationError> {
        let note_id = envelope
            .path_parameter(attr::NOTE_ID)
            .and_then(|raw| raw.parse::<NoteId>().ok())
            .ok_or(ValidationError::MissingPathParameter(attr::NOTE_ID))?;
        Ok(Self { note_id })
    }
}

/// List a user's notes, newest first (`get_notes`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListNotesRequest {
    pub user_id: String,
    pub limit: u32,
    /// Resume strictly before this timestamp.
    pub start: Option<i64>,
}

impl ListNotesRequest {
    pub fn from_envelope(envelope: &RequestEnvelope) -> Result<Self, ValidationError> {
        let user_id = required_header(envelope, USER_ID_HEADER)?;

        let limit = match envelope.query_parameter("limit") {
            None => DEFAULT_LIST_LIMIT,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(ValidationError::InvalidValue {
                        field: "limit",
                        reason: format!("expected a positive integer, got '{}'", raw),
                    });
                }
            },
        };

        let start = match envelope.query_parameter("start") {
            None => None,
            Some(raw) => Some(epoch_seconds("start", &Value::from(raw))?),
        }
        .filter(|start| *start > 0);

        Ok(Self {
            user_id,
            limit,
            start,
        })
    }
}

/// Replace an existing note (`update_note`).
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateNoteRequest {
    pub user_id: String,
    pub user_name: String,
    pub note_id: NoteId,
    pub timestamp: i64,
    pub attributes: Item,
}

impl UpdateNoteRequest {
    pub fn from_envelope(envelope: &RequestEnvelope) -> Result<Self, ValidationError> {
        let attributes = item_from_body(envelope)?;
        let user_id = required_header(envelope, USER_ID_HEADER)?;
        let user_name = required_header(envelope, USER_NAME_HEADER)?;

        let timestamp = attributes
            .get(attr::TIMESTAMP)
            .filter(|v| !v.is_null())
            .ok_or(ValidationError::MissingItemField(attr::TIMESTAMP))
            .and_then(|v| epoch_seconds(attr::TIMESTAMP, v))?;

        let note_id = match attributes.get(attr::NOTE_ID) {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingItemField(attr::NOTE_ID));
            }
            Some(Value::String(s)) => {
                s.parse::<NoteId>()
                    .map_err(|e| ValidationError::InvalidValue {
                        field: attr::NOTE_ID,
                        reason: e.to_string(),
                    })?
            }
            Some(_) => {
                return Err(ValidationError::InvalidValue {
                    field: attr::NOTE_ID,
                    reason: "expected a string".to_string(),
                });
            }
        };

        Ok(Self {
            user_id,
            user_name,
            note_id,
            timestamp,
            attributes,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn required_header(
    envelope: &RequestEnvelope,
    name: &'static str,
) -> Result<String, ValidationError> {
    envelope
        .header(name)
        .map(str::to_string)
        .ok_or(ValidationError::MissingHeader(name))
}

fn epoch_seconds(field: &'static str, value: &Value) -> Result<i64, ValidationError> {
    parse_epoch_seconds(value).ok_or_else(|| ValidationError::InvalidValue {
        field,
        reason: format!("expected whole seconds since epoch, got {}", value),
    })
}

/// Parses the body and extracts its `Item` object.
fn item_from_body(envelope: &RequestEnvelope) -> Result<Item, ValidationError> {
    let raw = envelope.body.as_deref().ok_or(ValidationError::MissingBody)?;

    let body: Value =
        serde_json::from_str(raw).map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
    let Value::Object(mut body) = body else {
        return Err(ValidationError::MalformedBody(
            "top-level value is not an object".to_string(),
        ));
    };

    match body.remove(ITEM_FIELD) {
        None | Some(Value::Null) => Err(ValidationError::MissingItem),
        Some(Value::Object(item)) => Ok(item),
        Some(_) => Err(ValidationError::InvalidValue {
            field: ITEM_FIELD,
            reason: "expected a JSON object".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_user(envelope: RequestEnvelope) -> RequestEnvelope {
        envelope
            .with_header(USER_ID_HEADER, "u1")
            .with_header(USER_NAME_HEADER, "U One")
    }

    fn body(value: Value) -> String {
        value.to_string()
    }

    #[test]
    fn test_create_valid() {
        let envelope =
            with_user(RequestEnvelope::new().with_body(body(json!({"Item": {"title": "t"}}))));
        let request = CreateNoteRequest::from_envelope(&envelope).unwrap();
        assert_eq!(request.user_id, "u1");
        assert_eq!(request.user_name, "U One");
        assert_eq!(request.attributes["title"], json!("t"));
    }

    #[test]
    fn test_create_validation_order() {
        // No body beats missing headers
        let envelope = RequestEnvelope::new();
        assert_eq!(
            CreateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingBody)
        );

        let envelope = RequestEnvelope::new().with_body("not json");
        assert!(matches!(
            CreateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MalformedBody(_))
        ));

        let envelope = RequestEnvelope::new().with_body(body(json!({"Thing": {}})));
        assert_eq!(
            CreateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingItem)
        );

        let envelope = RequestEnvelope::new()
            .with_body(body(json!({"Item": {}})))
            .with_header(USER_NAME_HEADER, "U One");
        assert_eq!(
            CreateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingHeader(USER_ID_HEADER))
        );

        let envelope = RequestEnvelope::new()
            .with_body(body(json!({"Item": {}})))
            .with_header(USER_ID_HEADER, "u1");
        assert_eq!(
            CreateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingHeader(USER_NAME_HEADER))
        );
    }

    #[test]
    fn test_create_item_must_be_object() {
        let envelope = with_user(RequestEnvelope::new().with_body(body(json!({"Item": [1]}))));
        assert!(matches!(
            CreateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::InvalidValue { field: "Item", .. })
        ));
    }

    #[test]
    fn test_delete_requires_path_then_header() {
        let envelope = RequestEnvelope::new();
        assert_eq!(
            DeleteNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingPathParameter("timestamp"))
        );

        let envelope = RequestEnvelope::new().with_path_parameter("timestamp", "123");
        assert_eq!(
            DeleteNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingHeader(USER_ID_HEADER))
        );

        let envelope = RequestEnvelope::new()
            .with_path_parameter("timestamp", "123")
            .with_header(USER_ID_HEADER, "u1");
        assert_eq!(
            DeleteNoteRequest::from_envelope(&envelope).unwrap().key,
            NoteKey::new("u1", 123)
        );
    }

    #[test]
    fn test_delete_rejects_non_numeric_timestamp() {
        let envelope = RequestEnvelope::new()
            .with_path_parameter("timestamp", "yesterday")
            .with_header(USER_ID_HEADER, "u1");
        assert!(matches!(
            DeleteNoteRequest::from_envelope(&envelope),
            Err(ValidationError::InvalidValue { field: "timestamp", .. })
        ));
    }

    #[test]
    fn test_get_requires_note_id() {
        assert_eq!(
            GetNoteRequest::from_envelope(&RequestEnvelope::new()),
            Err(ValidationError::MissingPathParameter("note_id"))
        );
        let envelope = RequestEnvelope::new().with_path_parameter("note_id", "u1:abc");
        assert_eq!(
            GetNoteRequest::from_envelope(&envelope).unwrap().note_id.as_str(),
            "u1:abc"
        );
    }

    #[test]
    fn test_list_defaults() {
        let envelope = RequestEnvelope::new().with_header(USER_ID_HEADER, "u1");
        let request = ListNotesRequest::from_envelope(&envelope).unwrap();
        assert_eq!(request.limit, DEFAULT_LIST_LIMIT);
        assert_eq!(request.start, None);
    }

    #[test]
    fn test_list_with_cursor() {
        let envelope = RequestEnvelope::new()
            .with_header(USER_ID_HEADER, "u1")
            .with_query_parameter("limit", "10")
            .with_query_parameter("start", "1723331552");
        let request = ListNotesRequest::from_envelope(&envelope).unwrap();
        assert_eq!(request.limit, 10);
        assert_eq!(request.start, Some(1723331552));
    }

    #[test]
    fn test_list_zero_start_means_no_cursor() {
        let envelope = RequestEnvelope::new()
            .with_header(USER_ID_HEADER, "u1")
            .with_query_parameter("start", "0");
        assert_eq!(ListNotesRequest::from_envelope(&envelope).unwrap().start, None);
    }

    #[test]
    fn test_list_rejects_bad_limit() {
        for raw in ["0", "-1", "many"] {
            let envelope = RequestEnvelope::new()
                .with_header(USER_ID_HEADER, "u1")
                .with_query_parameter("limit", raw);
            assert!(matches!(
                ListNotesRequest::from_envelope(&envelope),
                Err(ValidationError::InvalidValue { field: "limit", .. })
            ));
        }
    }

    #[test]
    fn test_list_requires_user() {
        assert_eq!(
            ListNotesRequest::from_envelope(&RequestEnvelope::new()),
            Err(ValidationError::MissingHeader(USER_ID_HEADER))
        );
    }

    #[test]
    fn test_update_accepts_decimal_string_timestamp() {
        let envelope = with_user(RequestEnvelope::new().with_body(body(json!({
            "Item": {"note_id": "u1:abc", "timestamp": "1723331552", "title": "t2"}
        }))));
        let request = UpdateNoteRequest::from_envelope(&envelope).unwrap();
        assert_eq!(request.timestamp, 1723331552);
        assert_eq!(request.note_id.as_str(), "u1:abc");
    }

    #[test]
    fn test_update_requires_timestamp_before_note_id() {
        let envelope = with_user(RequestEnvelope::new().with_body(body(json!({"Item": {}}))));
        assert_eq!(
            UpdateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingItemField("timestamp"))
        );

        let envelope = with_user(
            RequestEnvelope::new().with_body(body(json!({"Item": {"timestamp": 5}}))),
        );
        assert_eq!(
            UpdateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingItemField("note_id"))
        );
    }

    #[test]
    fn test_update_missing_user_id_checked_before_item_fields() {
        let envelope = RequestEnvelope::new()
            .with_body(body(json!({"Item": {}})))
            .with_header(USER_NAME_HEADER, "U One");
        assert_eq!(
            UpdateNoteRequest::from_envelope(&envelope),
            Err(ValidationError::MissingHeader(USER_ID_HEADER))
        );
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::MissingHeader(USER_ID_HEADER).to_string(),
            "Cannot find 'app_user_id' in 'headers'"
        );
        assert_eq!(
            ValidationError::MissingPathParameter("note_id").to_string(),
            "No 'note_id' in 'pathParameters'"
        );
    }

    #[test]
    fn test_rejection_status_per_operation() {
        assert_eq!(Operation::AddNote.rejection_status(), 400);
        assert_eq!(Operation::DeleteNote.rejection_status(), 400);
        assert_eq!(Operation::UpdateNote.rejection_status(), 400);
        assert_eq!(Operation::GetNote.rejection_status(), 404);
        assert_eq!(Operation::GetNotes.rejection_status(), 404);
    }
}
