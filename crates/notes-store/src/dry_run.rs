//! Dry-run note store.
//!
//! Used when no table is configured: every write is logged and accepted,
//! nothing is kept, and every query returns an empty page.

use async_trait::async_trait;
use notes_core::{Item, NoteKey};

use crate::error::StoreResult;
use crate::store::{Condition, NoteStore, Page, Query};

/// [`NoteStore`] that performs no storage.
#[derive(Debug, Clone)]
pub struct DryRunStore {
    table_name: String,
}

impl DryRunStore {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl NoteStore for DryRunStore {
    fn backend(&self) -> &'static str {
        "dry-run"
    }

    async fn put(&self, item: &Item) -> StoreResult<()> {
        tracing::debug!(
            table = %self.table_name,
            attributes = item.len(),
            "Not writing item - dry-run mode"
        );
        Ok(())
    }

    async fn put_if(&self, item: &Item, condition: &Condition) -> StoreResult<()> {
        tracing::debug!(
            table = %self.table_name,
            attributes = item.len(),
            ?condition,
            "Not writing conditional item - dry-run mode"
        );
        Ok(())
    }

    async fn delete(&self, key: &NoteKey) -> StoreResult<()> {
        tracing::info!(
            table = %self.table_name,
            user_id = %key.user_id,
            timestamp = key.timestamp,
            "Not deleting item - dry-run mode"
        );
        Ok(())
    }

    async fn query(&self, query: &Query) -> StoreResult<Page> {
        tracing::info!(
            table = %self.table_name,
            index = ?query.index,
            key = %query.key.attribute,
            limit = ?query.limit,
            "Returning empty page - dry-run mode"
        );
        Ok(Page::default())
    }
}
