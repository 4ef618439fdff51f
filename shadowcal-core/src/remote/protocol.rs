//! Defines the JSON protocol used for communication between shadowcal
//! and provider binaries over stdin/stdout.
//!
//! Each request is a single line `{"command": ..., "params": {...}}`. The
//! provider answers with a single line, either
//! `{"status":"success","data":...}` or
//! `{"status":"error","error":"...","kind":"not_found"}`.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::backend::{BackendErrorKind, CalendarInfo, EventPage, ListParams};
use crate::config::RemoteConfig;
use crate::event::Event;
use crate::shadow::ShadowPayload;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    GetCalendar,
    ListEvents,
    InsertEvent,
    PatchEvent,
    DeleteEvent,
}

/// Request sent from shadowcal to provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from provider to shadowcal.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success {
        data: T,
    },
    Error {
        error: String,
        #[serde(default)]
        kind: BackendErrorKind,
    },
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> String {
        serde_json::to_string(&Response::Success { data })
            .unwrap_or_else(|e| Response::<()>::error(&e.to_string(), BackendErrorKind::Fatal))
    }
}

impl Response<()> {
    pub fn error(msg: &str, kind: BackendErrorKind) -> String {
        // A struct of two plain fields always serializes
        serde_json::to_string(&Response::<()>::Error {
            error: msg.to_string(),
            kind,
        })
        .unwrap_or_default()
    }
}

/// Look up a calendar by id.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetCalendar {
    #[serde(flatten)]
    pub remote_config: RemoteConfig,
    pub calendar_id: String,
}

impl ProviderCommand for GetCalendar {
    type Response = Option<CalendarInfo>;
    fn command() -> Command {
        Command::GetCalendar
    }
}

/// Fetch one page of events.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    #[serde(flatten)]
    pub remote_config: RemoteConfig,
    pub calendar_id: String,
    #[serde(flatten)]
    pub params: ListParams,
}

impl ProviderCommand for ListEvents {
    type Response = EventPage;
    fn command() -> Command {
        Command::ListEvents
    }
}

/// Create a shadow event.
#[derive(Debug, Serialize, Deserialize)]
pub struct InsertEvent {
    #[serde(flatten)]
    pub remote_config: RemoteConfig,
    pub calendar_id: String,
    pub payload: ShadowPayload,
    pub notify: bool,
}

impl ProviderCommand for InsertEvent {
    type Response = Event;
    fn command() -> Command {
        Command::InsertEvent
    }
}

/// Overwrite the mirrored fields of a shadow event.
#[derive(Debug, Serialize, Deserialize)]
pub struct PatchEvent {
    #[serde(flatten)]
    pub remote_config: RemoteConfig,
    pub calendar_id: String,
    pub event_id: String,
    pub payload: ShadowPayload,
    pub notify: bool,
}

impl ProviderCommand for PatchEvent {
    type Response = Event;
    fn command() -> Command {
        Command::PatchEvent
    }
}

/// Delete an event by ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    #[serde(flatten)]
    pub remote_config: RemoteConfig,
    pub calendar_id: String,
    pub event_id: String,
    pub notify: bool,
}

impl ProviderCommand for DeleteEvent {
    type Response = ();
    fn command() -> Command {
        Command::DeleteEvent
    }
}
