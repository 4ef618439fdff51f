//! The narrow interface the sync engine uses to talk to a calendar service.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;
use crate::shadow::ShadowPayload;

/// Classification of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// The calendar or event does not exist
    NotFound,
    /// The sync token was not recognized or has expired
    InvalidSyncToken,
    /// Quota or rate limit exceeded
    RateLimited,
    /// Network failure, timeout or server-side error
    Transient,
    /// Anything else; not worth retrying
    #[default]
    Fatal,
}

impl BackendErrorKind {
    /// Whether a call failing this way may succeed if repeated.
    pub fn is_retryable(self) -> bool {
        matches!(self, BackendErrorKind::Transient | BackendErrorKind::RateLimited)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        BackendError {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transient, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }
}

/// Backend operations, named for logs and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetCalendar,
    ListEvents,
    InsertEvent,
    PatchEvent,
    DeleteEvent,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::GetCalendar => "get calendar",
            Operation::ListEvents => "list events",
            Operation::InsertEvent => "insert event",
            Operation::PatchEvent => "patch event",
            Operation::DeleteEvent => "delete event",
        };
        write!(f, "{}", name)
    }
}

/// Basic information about a calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
}

/// Parameters for a single `list_events` page request.
///
/// When `sync_token` is set the backend returns only changes since that
/// token and the time bounds must be left unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_min: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_max: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

/// One page of a `list_events` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub items: Vec<Event>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Only present on the last page
    #[serde(default)]
    pub next_sync_token: Option<String>,
}

/// Calendar service operations.
///
/// Mutating calls take a `notify` flag; when set, the service emails the
/// event's guests about the change.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn get_calendar(&self, calendar_id: &str) -> Result<Option<CalendarInfo>, BackendError>;

    async fn list_events(
        &self,
        calendar_id: &str,
        params: &ListParams,
    ) -> Result<EventPage, BackendError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> Result<Event, BackendError>;

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> Result<Event, BackendError>;

    async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        notify: bool,
    ) -> Result<(), BackendError>;
}
