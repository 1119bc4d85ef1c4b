//! Error types for the storage layer.

use std::fmt;

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error code the store reports when a conditional write's precondition fails.
pub const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";

/// Error codes the store uses for its own internal failures.
const INTERNAL_CODES: &[&str] = &["InternalError", "InternalServerError"];

/// Metadata a store attaches to a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFault {
    /// Machine-readable error code (e.g. `ValidationException`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// HTTP-equivalent status code.
    pub status: u16,
    /// Store-side request identifier, when the store returned one.
    pub request_id: Option<String>,
}

impl StoreFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Whether this fault describes a failure inside the store itself.
    pub fn is_internal(&self) -> bool {
        self.status >= 500 || INTERNAL_CODES.contains(&self.code.as_str())
    }
}

impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)?;
        if let Some(id) = &self.request_id {
            write!(f, " [request {}]", id)?;
        }
        Ok(())
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write's precondition did not hold.
    #[error("conditional check failed: {0}")]
    ConditionalCheckFailed(StoreFault),

    /// The store refused the request (bad key, throttling, missing table, ...).
    #[error("store rejected request: {0}")]
    Rejected(StoreFault),

    /// The store failed internally.
    #[error("internal store error: {0}")]
    Internal(StoreFault),

    /// The request never produced a store response (network, timeout, credentials).
    #[error("store unreachable: {0}")]
    Transport(String),

    /// An item could not be converted to or from the store's representation.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl StoreError {
    /// Classifies a fault reported by the store.
    pub fn from_fault(fault: StoreFault) -> Self {
        if fault.code == CONDITIONAL_CHECK_FAILED {
            Self::ConditionalCheckFailed(fault)
        } else if fault.is_internal() {
            Self::Internal(fault)
        } else {
            Self::Rejected(fault)
        }
    }

    /// The store's fault metadata, for errors the store itself reported.
    pub fn fault(&self) -> Option<&StoreFault> {
        match self {
            Self::ConditionalCheckFailed(f) | Self::Rejected(f) | Self::Internal(f) => Some(f),
            _ => None,
        }
    }
}
