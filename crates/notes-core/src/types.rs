//! Core data types for the notes backend.
//!
//! A note is stored as a flat document keyed by `(user_id, timestamp)`:
//!
//! - `user_id` is the partition key
//! - `timestamp` (seconds since epoch, UTC) is the sort key
//! - `note_id` is independently indexed for direct lookup
//! - `expires` is the retention deadline, recomputed on every write
//!
//! Any other attribute (title, content, category, ...) is opaque caller data.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use crate::decimal::parse_epoch_seconds;
use crate::identity::NoteId;

/// A stored document: attribute name to JSON value.
pub type Item = Map<String, Value>;

/// Attribute names with a fixed meaning.
pub mod attr {
    pub const USER_ID: &str = "user_id";
    pub const USER_NAME: &str = "user_name";
    pub const NOTE_ID: &str = "note_id";
    pub const TIMESTAMP: &str = "timestamp";
    pub const EXPIRES: &str = "expires";
}

/// Number of days a note is retained after its last write.
pub const RETENTION_DAYS: i64 = 180;

/// The retention window as a duration.
#[must_use]
pub fn retention_window() -> Duration {
    Duration::days(RETENTION_DAYS)
}

/// Expiry (seconds since epoch) for a note written at `written_at`.
///
/// Computed in UTC, so `expiry_for(t) - t.timestamp()` is always exactly
/// `RETENTION_DAYS * 86400` seconds.
#[must_use]
pub fn expiry_for(written_at: DateTime<Utc>) -> i64 {
    (written_at + retention_window()).timestamp()
}

/// Whether `name` is an attribute the handler owns and callers cannot set.
#[must_use]
pub fn reserved_attribute(name: &str) -> bool {
    matches!(
        name,
        attr::USER_ID | attr::USER_NAME | attr::NOTE_ID | attr::TIMESTAMP | attr::EXPIRES
    )
}

// ============================================================================
// NoteKey
// ============================================================================

/// Primary key of a stored note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteKey {
    pub user_id: String,
    pub timestamp: i64,
}

impl NoteKey {
    pub fn new(user_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp,
        }
    }

    /// Extracts the key attributes from an item.
    ///
    /// `timestamp` may be a JSON number or a decimal string.
    pub fn from_item(item: &Item) -> Option<Self> {
        let user_id = item.get(attr::USER_ID)?.as_str()?;
        let timestamp = parse_epoch_seconds(item.get(attr::TIMESTAMP)?)?;
        Some(Self::new(user_id, timestamp))
    }

    /// The key as a two-attribute item.
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(attr::USER_ID.to_string(), Value::from(self.user_id.clone()));
        item.insert(attr::TIMESTAMP.to_string(), Value::from(self.timestamp));
        item
    }
}

// ============================================================================
// Note
// ============================================================================

/// A note with its handler-owned attributes resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub user_id: String,
    pub user_name: String,
    pub note_id: NoteId,
    /// Creation time, seconds since epoch. Never changes.
    pub timestamp: i64,
    /// Retention deadline, seconds since epoch.
    pub expires: i64,
    /// Caller-supplied attributes, without any reserved names.
    pub attributes: Item,
}

impl Note {
    /// Builds a brand new note written at `now`.
    ///
    /// Reserved attributes in `attributes` are discarded.
    pub fn create(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        attributes: Item,
        now: DateTime<Utc>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            note_id: NoteId::generate(&user_id),
            user_id,
            user_name: user_name.into(),
            timestamp: now.timestamp(),
            expires: expiry_for(now),
            attributes: strip_reserved(attributes),
        }
    }

    /// Builds the replacement for an existing note, rewritten at `now`.
    ///
    /// `note_id` and `timestamp` are carried over unchanged; `expires` is
    /// pushed out from `now`.
    pub fn revise(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        note_id: NoteId,
        timestamp: i64,
        attributes: Item,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            note_id,
            timestamp,
            expires: expiry_for(now),
            attributes: strip_reserved(attributes),
        }
    }

    pub fn key(&self) -> NoteKey {
        NoteKey::new(self.user_id.clone(), self.timestamp)
    }

    /// Flattens the note into a storable item.
    pub fn into_item(self) -> Item {
        let mut item = self.attributes;
        item.insert(attr::USER_ID.to_string(), Value::from(self.user_id));
        item.insert(attr::USER_NAME.to_string(), Value::from(self.user_name));
        item.insert(attr::NOTE_ID.to_string(), Value::from(self.note_id.into_string()));
        item.insert(attr::TIMESTAMP.to_string(), Value::from(self.timestamp));
        item.insert(attr::EXPIRES.to_string(), Value::from(self.expires));
        item
    }
}

fn strip_reserved(mut attributes: Item) -> Item {
    attributes.retain(|name, _| !reserved_attribute(name));
    attributes
}
