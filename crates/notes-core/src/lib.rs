//! notes-core: Core types for the notes backend
//!
//! This crate provides:
//! - The `Note` entity and its storage key (`NoteKey`)
//! - The `NoteId` identity scheme (`<user_id>:<uuid>`)
//! - The retention policy that computes `expires`
//! - Decimal-string encoding for numbers in response bodies
//!
//! Items travel between the handler and the store as untyped JSON objects
//! (`Item`); `Note` is the typed view the handler builds before writing.

pub mod decimal;
pub mod identity;
pub mod types;

pub use identity::{NoteId, NoteIdParseError};
pub use types::{
    Item, Note, NoteKey, RETENTION_DAYS, attr, expiry_for, reserved_attribute, retention_window,
};
