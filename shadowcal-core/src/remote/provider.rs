//! Provider subprocess protocol.
//!
//! This module handles communication with external provider binaries
//! (e.g., `shadowcal-provider-google`) using JSON over stdin/stdout.
//!
//! Providers manage their own credentials and tokens. shadowcal just passes
//! the `[remote]` table from its config along with every request.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::trace;

use crate::backend::{
    BackendError, BackendErrorKind, CalendarBackend, CalendarInfo, EventPage, ListParams,
};
use crate::config::RemoteConfig;
use crate::error::{ShadowError, ShadowResult};
use crate::event::Event;
use crate::remote::protocol::{
    Command, DeleteEvent, GetCalendar, InsertEvent, ListEvents, PatchEvent, ProviderCommand,
    Request, Response,
};
use crate::shadow::ShadowPayload;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct Provider(String);

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn binary_name(&self) -> String {
        format!("shadowcal-provider-{}", self.0)
    }

    /// Locate the provider executable in PATH.
    pub fn binary_path(&self) -> ShadowResult<PathBuf> {
        let binary_name = self.binary_name();
        which::which(&binary_name).map_err(|_| ShadowError::ProviderNotInstalled(binary_name))
    }

    /// Call a typed provider command and return the result.
    ///
    /// A timeout counts as a transient failure; an error reported by the
    /// provider keeps the kind the provider gave it.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> Result<C::Response, BackendError> {
        timeout(PROVIDER_TIMEOUT, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| {
                BackendError::transient(format!(
                    "Provider request timed out after {}s",
                    PROVIDER_TIMEOUT.as_secs()
                ))
            })?
    }

    /// Low-level call that sends a command with params and deserializes the response.
    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> Result<R, BackendError> {
        let fatal = |msg: String| BackendError::new(BackendErrorKind::Fatal, msg);

        let params = serde_json::to_value(params).map_err(|e| fatal(e.to_string()))?;
        let request = Request { command, params };
        let request_json = serde_json::to_string(&request).map_err(|e| fatal(e.to_string()))?;

        let binary_path = self.binary_path().map_err(|e| fatal(e.to_string()))?;
        trace!(provider = %self.0, ?command, "Calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| fatal(format!("Failed to spawn {}: {}", binary_path.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| fatal("Provider stdin was not piped".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await
            .map_err(|e| BackendError::transient(format!("Failed to write to provider: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BackendError::transient(format!("Failed to wait for provider: {e}")))?;

        if !output.status.success() {
            return Err(fatal(format!(
                "Provider exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(fatal("Provider returned no response".into()));
        }

        parse_response(&response_str)
    }
}

fn parse_response<R: DeserializeOwned>(line: &str) -> Result<R, BackendError> {
    let response: Response<R> = serde_json::from_str(line.trim()).map_err(|e| {
        BackendError::new(
            BackendErrorKind::Fatal,
            format!("Failed to parse provider response: {}", e),
        )
    })?;

    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error, kind } => Err(BackendError::new(kind, error)),
    }
}

/// A `CalendarBackend` served by a provider binary.
#[derive(Clone, Debug)]
pub struct ProviderBackend {
    provider: Provider,
    remote_config: RemoteConfig,
}

impl ProviderBackend {
    pub fn new(provider: Provider, remote_config: RemoteConfig) -> Self {
        ProviderBackend {
            provider,
            remote_config,
        }
    }
}

#[async_trait]
impl CalendarBackend for ProviderBackend {
    async fn get_calendar(&self, calendar_id: &str) -> Result<Option<CalendarInfo>, BackendError> {
        self.provider
            .call(GetCalendar {
                remote_config: self.remote_config.clone(),
                calendar_id: calendar_id.to_string(),
            })
            .await
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        params: &ListParams,
    ) -> Result<EventPage, BackendError> {
        self.provider
            .call(ListEvents {
                remote_config: self.remote_config.clone(),
                calendar_id: calendar_id.to_string(),
                params: params.clone(),
            })
            .await
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> Result<Event, BackendError> {
        self.provider
            .call(InsertEvent {
                remote_config: self.remote_config.clone(),
                calendar_id: calendar_id.to_string(),
                payload: payload.clone(),
                notify,
            })
            .await
    }

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> Result<Event, BackendError> {
        self.provider
            .call(PatchEvent {
                remote_config: self.remote_config.clone(),
                calendar_id: calendar_id.to_string(),
                event_id: event_id.to_string(),
                payload: payload.clone(),
                notify,
            })
            .await
    }

    async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        notify: bool,
    ) -> Result<(), BackendError> {
        self.provider
            .call(DeleteEvent {
                remote_config: self.remote_config.clone(),
                calendar_id: calendar_id.to_string(),
                event_id: event_id.to_string(),
                notify,
            })
            .await
    }
}
