//! In-memory note store.
//!
//! Behaves like the table it stands in for: items are keyed by
//! `(user_id, timestamp)`, partition queries walk the sort key in either
//! direction, index queries match any attribute, and conditional writes
//! fail with the same code the real store uses.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use notes_core::decimal::parse_epoch_seconds;
use notes_core::{Item, NoteKey};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{CONDITIONAL_CHECK_FAILED, StoreError, StoreFault, StoreResult};
use crate::store::{Condition, NoteStore, Page, Query};

/// Process-local [`NoteStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<NoteKey, Item>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write attempts (put, put_if, delete) that reached the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of items currently stored.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Direct read by primary key.
    pub async fn get(&self, key: &NoteKey) -> Option<Item> {
        self.items.read().await.get(key).cloned()
    }

    fn key_of(item: &Item) -> StoreResult<NoteKey> {
        NoteKey::from_item(item).ok_or_else(|| {
            StoreError::from_fault(StoreFault::new(
                "ValidationException",
                "One or more parameter values were invalid: \
                 Missing the key user_id or timestamp in the item",
                400,
            ))
        })
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, item: &Item) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let key = Self::key_of(item)?;
        self.items.write().await.insert(key, item.clone());
        Ok(())
    }

    async fn put_if(&self, item: &Item, condition: &Condition) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let key = Self::key_of(item)?;
        let mut items = self.items.write().await;

        let holds = items.get(&key).is_some_and(|stored| {
            condition.equalities().iter().all(|(attribute, value)| {
                stored
                    .get(attribute)
                    .is_some_and(|current| same_value(current, value))
            })
        });

        if !holds {
            return Err(StoreError::from_fault(StoreFault::new(
                CONDITIONAL_CHECK_FAILED,
                "The conditional request failed",
                400,
            )));
        }

        items.insert(key, item.clone());
        Ok(())
    }

    async fn delete(&self, key: &NoteKey) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn query(&self, query: &Query) -> StoreResult<Page> {
        let items = self.items.read().await;
        let wanted = Value::String(query.key.value.clone());

        let mut matches: Vec<(&NoteKey, &Item)> = items
            .iter()
            .filter(|(_, item)| item.get(&query.key.attribute) == Some(&wanted))
            .collect();

        // BTreeMap order is already ascending by (user_id, timestamp)
        if !query.scan_forward {
            matches.reverse();
        }

        if let Some(start) = &query.exclusive_start_key {
            matches.retain(|(key, _)| {
                if query.scan_forward {
                    **key > *start
                } else {
                    **key < *start
                }
            });
        }

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        let more = matches.len() > limit;
        matches.truncate(limit);

        let last_evaluated_key = if more {
            matches.last().map(|(key, _)| key.to_item())
        } else {
            None
        };

        let page_items = matches.into_iter().map(|(_, item)| item.clone()).collect();
        Ok(Page::new(page_items, last_evaluated_key))
    }
}

/// Numbers compare by value (`5` equals `5.0`); a string never equals a number.
fn same_value(stored: &Value, expected: &Value) -> bool {
    if stored == expected {
        return true;
    }
    match (parse_epoch_seconds(stored), parse_epoch_seconds(expected)) {
        (Some(a), Some(b)) => a == b && !stored.is_string() && !expected.is_string(),
        _ => false,
    }
}
