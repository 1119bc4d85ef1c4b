//! notes-store: Storage layer for the notes backend
//!
//! This crate provides:
//! - The `NoteStore` contract: put, conditional put, delete, query
//! - A DynamoDB implementation (`DynamoStore`)
//! - An in-memory implementation for local runs and tests (`MemoryStore`)
//! - A dry-run implementation that stores nothing (`DryRunStore`)
//! - The store error taxonomy, carrying the store's code, message, status
//!   and request id through to callers
//!
//! # Usage
//!
//! ```rust,ignore
//! use notes_store::{StoreConfig, open_store, Query};
//!
//! let config = StoreConfig::from_env()?;
//! let store = open_store(&config).await?;
//!
//! let page = store.query(&Query::partition("u1").limit(5).newest_first()).await?;
//! ```

pub mod dry_run;
pub mod dynamo;
pub mod error;
pub mod memory;
pub mod store;

pub use dry_run::DryRunStore;
pub use dynamo::DynamoStore;
pub use error::{CONDITIONAL_CHECK_FAILED, StoreError, StoreFault, StoreResult};
pub use memory::MemoryStore;
pub use store::{
    Condition, DEFAULT_NOTE_ID_INDEX, KeyCondition, NoteStore, Page, Query, StoreBackend,
    StoreConfig, open_store,
};

// Re-export notes-core for downstream crates
pub use notes_core;
