//! Error types for shadowcal.

use thiserror::Error;

use crate::backend::{BackendError, Operation};

/// Errors that can occur while running a sync pass.
#[derive(Error, Debug)]
pub enum ShadowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Sync token is no longer valid, a full sync is required")]
    StaleSyncToken,

    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Backend {
        operation: Operation,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error(
        "{operation} hit a usage limit after {attempts} attempt(s): {source}\n\
        The calendar API is refusing requests. This usually means too many guest \
        notifications were sent to external attendees today, or too many requests \
        were made in a short burst. Wait a while before syncing again."
    )]
    UsageLimit {
        operation: Operation,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),
}

/// Result type alias for shadowcal operations.
pub type ShadowResult<T> = Result<T, ShadowError>;
