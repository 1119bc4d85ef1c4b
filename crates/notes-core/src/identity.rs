//! Note identity.
//!
//! # NoteId Format
//!
//! A NoteId is the owning user's id, a `:` separator, and a random UUID v4:
//!
//! ```
//! use notes_core::identity::NoteId;
//!
//! let id = NoteId::generate("u1");
//! assert!(id.as_str().starts_with("u1:"));
//! assert_eq!(id.owner(), "u1");
//! ```
//!
//! The owner prefix is informational only. Lookups go through the `note_id`
//! secondary index, never by parsing the prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Separator between the owner prefix and the unique suffix.
pub const SEPARATOR: char = ':';

/// Globally unique identifier of a note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Creates a new NoteId owned by `user_id`.
    #[must_use]
    pub fn generate(user_id: &str) -> Self {
        Self(format!("{}{}{}", user_id, SEPARATOR, Uuid::new_v4()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the owner prefix (everything before the last separator).
    #[must_use]
    pub fn owner(&self) -> &str {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(owner, _)| owner)
            .unwrap_or_default()
    }

    /// Consumes the id, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error when parsing a NoteId from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteIdParseError {
    /// The string is empty.
    Empty,
}

impl fmt::Display for NoteIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "note_id must not be empty"),
        }
    }
}

impl std::error::Error for NoteIdParseError {}

// Ids minted before the owner prefix existed are still accepted, so parsing
// only rejects the empty string.
impl FromStr for NoteId {
    type Err = NoteIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NoteIdParseError::Empty);
        }
        Ok(Self(s.to_string()))
    }
}
