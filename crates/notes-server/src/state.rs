//! Application state shared across handlers.

use std::sync::Arc;

use notes_store::NoteStore;

use crate::config::ServerConfig;
use crate::handlers::NotesHandler;

/// Application state shared across all route handlers.
///
/// This is cloneable and can be extracted in handlers using `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Note operations, bound to the configured store.
    handler: Arc<NotesHandler>,
    /// Server configuration.
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Create new application state.
    pub fn new(handler: NotesHandler, config: ServerConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            config: Arc::new(config),
        }
    }

    /// State over `store` with the given `note_id` index name.
    pub fn with_store(
        store: Arc<dyn NoteStore>,
        note_id_index: impl Into<String>,
        config: ServerConfig,
    ) -> Self {
        Self::new(NotesHandler::new(store, note_id_index), config)
    }

    /// Get a reference to the note handler.
    pub fn handler(&self) -> &NotesHandler {
        &self.handler
    }

    /// Get a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("handler", &self.handler)
            .field("config", &self.config)
            .finish()
    }
}
