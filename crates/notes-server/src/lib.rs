//! notes-server: Request handlers and HTTP API for the notes backend
//!
//! This crate provides:
//! - Request and response envelopes (`RequestEnvelope`, `ResponseEnvelope`)
//! - Typed, validated requests for each operation
//! - The five note operations (`NotesHandler`)
//! - An Axum HTTP surface over those operations
//!
//! # Architecture
//!
//! Handlers work on envelopes only and never see HTTP types. The Axum
//! routes translate requests into envelopes and render envelopes back, with
//! a middleware stack for:
//! - Request ID generation and propagation
//! - Request tracing and logging
//! - CORS handling
//! - JSON error responses
//!
//! # Usage
//!
//! ```rust,ignore
//! use notes_server::{AppState, ServerConfig, build_app};
//! use notes_store::{StoreConfig, open_store};
//!
//! let store_config = StoreConfig::from_env()?;
//! let store = open_store(&store_config).await?;
//! let state = AppState::with_store(store, store_config.note_id_index, ServerConfig::from_env()?);
//! axum::serve(listener, build_app(state)).await?;
//! ```

pub mod app;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod requests;
pub mod routes;
pub mod state;

// Re-exports for convenience
pub use app::build_app;
pub use config::{ConfigError, LogFormat, ServerConfig};
pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use error::{ApiError, ApiResult};
pub use handlers::{HandlerError, HandlerResult, NotesHandler};
pub use requests::{Operation, ValidationError};
pub use state::AppState;

// Re-export dependent crates
pub use notes_core;
pub use notes_store;
