//! The store contract and store configuration.
//!
//! Handlers only ever talk to a `dyn NoteStore`. Which implementation sits
//! behind it is decided once, at startup, from [`StoreConfig`].

use std::sync::Arc;

use async_trait::async_trait;
use notes_core::{Item, NoteKey, attr};
use serde::Serialize;
use serde_json::Value;

use crate::dry_run::DryRunStore;
use crate::dynamo::DynamoStore;
use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;

/// Default name of the secondary index on `note_id`.
pub const DEFAULT_NOTE_ID_INDEX: &str = "note_id-index";

// ============================================================================
// Contract
// ============================================================================

/// Precondition for a conditional write, evaluated against the stored item
/// currently occupying the written item's key.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The stored item exists and each `(attribute, value)` pair matches it.
    AllEqual(Vec<(String, Value)>),
}

impl Condition {
    pub fn attribute_equals(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::AllEqual(vec![(attribute.into(), value.into())])
    }

    /// Adds another equality that must hold alongside the existing ones.
    pub fn and_equals(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        let Self::AllEqual(mut pairs) = self;
        pairs.push((attribute.into(), value.into()));
        Self::AllEqual(pairs)
    }

    /// The `(attribute, value)` pairs that must all match.
    pub fn equalities(&self) -> &[(String, Value)] {
        let Self::AllEqual(pairs) = self;
        pairs
    }
}

/// Equality condition on a query's hash key (`attribute = value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub attribute: String,
    pub value: String,
}

/// A range query over the table or one of its secondary indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Secondary index to query, or `None` for the table itself.
    pub index: Option<String>,
    pub key: KeyCondition,
    pub limit: Option<u32>,
    /// Resume strictly after this key.
    pub exclusive_start_key: Option<NoteKey>,
    /// Ascending sort-key order when true, newest first when false.
    pub scan_forward: bool,
}

impl Query {
    /// Query a user's partition.
    pub fn partition(user_id: impl Into<String>) -> Self {
        Self {
            index: None,
            key: KeyCondition {
                attribute: attr::USER_ID.to_string(),
                value: user_id.into(),
            },
            limit: None,
            exclusive_start_key: None,
            scan_forward: true,
        }
    }

    /// Query a secondary index on `attribute`.
    pub fn index(
        index: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            index: Some(index.into()),
            key: KeyCondition {
                attribute: attribute.into(),
                value: value.into(),
            },
            limit: None,
            exclusive_start_key: None,
            scan_forward: true,
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, key: NoteKey) -> Self {
        self.exclusive_start_key = Some(key);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.scan_forward = false;
        self
    }
}

/// One page of query results.
///
/// Serializes with the store's own field names so the page can be handed to
/// callers as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    #[serde(rename = "Items")]
    pub items: Vec<Item>,
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "LastEvaluatedKey", skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Item>,
}

impl Page {
    pub fn new(items: Vec<Item>, last_evaluated_key: Option<Item>) -> Self {
        Self {
            count: items.len(),
            items,
            last_evaluated_key,
        }
    }
}

/// Document store holding notes, keyed by `(user_id, timestamp)`.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Short name of the backend, for logs.
    fn backend(&self) -> &'static str;

    /// Unconditional insert or replace.
    async fn put(&self, item: &Item) -> StoreResult<()>;

    /// Replace, only if `condition` holds for the stored item at the same key.
    ///
    /// Fails with [`StoreError::ConditionalCheckFailed`] otherwise.
    async fn put_if(&self, item: &Item, condition: &Condition) -> StoreResult<()>;

    /// Delete by key. Deleting an absent key succeeds.
    async fn delete(&self, key: &NoteKey) -> StoreResult<()>;

    /// Run a range query, returning one page.
    async fn query(&self, query: &Query) -> StoreResult<Page>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Which [`NoteStore`] implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// A DynamoDB table.
    DynamoDb,
    /// Process-local map; contents are lost on exit.
    Memory,
    /// Accepts every write, stores nothing, returns empty pages.
    DryRun,
}

impl std::str::FromStr for StoreBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" | "ddb" => Ok(Self::DynamoDb),
            "memory" | "in-memory" => Ok(Self::Memory),
            "dry-run" | "dryrun" | "none" => Ok(Self::DryRun),
            other => Err(StoreError::ConfigError(format!(
                "unknown store backend '{}' (expected dynamodb, memory or dry-run)",
                other
            ))),
        }
    }
}

/// Configuration for the note store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Table holding the notes.
    pub table_name: String,
    /// Secondary index on `note_id`.
    pub note_id_index: String,
    /// AWS region; the default provider chain is consulted when unset.
    pub region: Option<String>,
    /// Endpoint override, e.g. a local DynamoDB.
    pub endpoint_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            table_name: "notes_table".to_string(),
            note_id_index: DEFAULT_NOTE_ID_INDEX.to_string(),
            region: None,
            endpoint_url: None,
        }
    }
}

impl StoreConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads:
    /// - `NOTES_STORE` - Optional backend (`dynamodb`, `memory`, `dry-run`), defaults to `dynamodb`
    /// - `TABLE_NAME` - Required for the `dynamodb` backend
    /// - `NOTE_ID_INDEX` - Optional, defaults to `note_id-index`
    /// - `AWS_REGION` - Optional
    /// - `DYNAMODB_ENDPOINT_URL` - Optional
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`StoreConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("NOTES_STORE") {
            Some(s) => s.parse()?,
            None => StoreBackend::DynamoDb,
        };

        let table_name = match (lookup("TABLE_NAME"), backend) {
            (Some(name), _) if !name.trim().is_empty() => name,
            (_, StoreBackend::DynamoDb) => {
                return Err(StoreError::ConfigError(
                    "TABLE_NAME environment variable not set".to_string(),
                ));
            }
            _ => "notes_table_dummy".to_string(),
        };

        let note_id_index =
            lookup("NOTE_ID_INDEX").unwrap_or_else(|| DEFAULT_NOTE_ID_INDEX.to_string());

        Ok(Self {
            backend,
            table_name,
            note_id_index,
            region: lookup("AWS_REGION"),
            endpoint_url: lookup("DYNAMODB_ENDPOINT_URL"),
        })
    }
}

/// Construct the store selected by `config`.
pub async fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn NoteStore>> {
    let store: Arc<dyn NoteStore> = match config.backend {
        StoreBackend::DynamoDb => Arc::new(DynamoStore::connect(config).await?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::DryRun => Arc::new(DryRunStore::new(config.table_name.clone())),
    };

    tracing::info!(
        backend = store.backend(),
        table = %config.table_name,
        "Note store ready"
    );

    Ok(store)
}
