//! Thin client for the Google Calendar v3 REST API.
//!
//! Every failure is returned as a `BackendError` so the sync engine can
//! decide whether to retry.

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use shadowcal_core::backend::{
    BackendError, BackendErrorKind, CalendarInfo, EventPage, ListParams,
};
use shadowcal_core::shadow::ShadowPayload;
use shadowcal_core::Event;
use tracing::debug;

use crate::convert::{FromGoogle, GoogleCalendar, GoogleEvent, GoogleEventList, ToGoogle};

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const PAGE_SIZE: u32 = 250;

/// Error reasons Google uses for quota and rate limiting
const RATE_LIMIT_REASONS: &[&str] = &[
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "quotaExceeded",
    "dailyLimitExceeded",
];

pub struct GoogleClient {
    http: reqwest::Client,
    access_token: String,
}

impl GoogleClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        GoogleClient {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }

    /// `None` when the calendar does not exist or is not visible to the account.
    pub async fn get_calendar(
        &self,
        calendar_id: &str,
    ) -> Result<Option<CalendarInfo>, BackendError> {
        let url = endpoint(&["calendars", calendar_id])?;
        match self.send::<GoogleCalendar>(self.request(Method::GET, url)).await {
            Ok(calendar) => Ok(Some(CalendarInfo {
                id: calendar.id,
                name: calendar.summary,
            })),
            Err(e) if e.kind == BackendErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list_events(
        &self,
        calendar_id: &str,
        params: &ListParams,
    ) -> Result<EventPage, BackendError> {
        let url = endpoint(&["calendars", calendar_id, "events"])?;

        let mut query: Vec<(&str, String)> = vec![
            ("singleEvents", "true".to_string()),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if let Some(sync_token) = &params.sync_token {
            query.push(("syncToken", sync_token.clone()));
        } else {
            if let Some(time_min) = params.time_min {
                query.push(("timeMin", time_min.to_rfc3339()));
            }
            if let Some(time_max) = params.time_max {
                query.push(("timeMax", time_max.to_rfc3339()));
            }
        }
        if let Some(page_token) = &params.page_token {
            query.push(("pageToken", page_token.clone()));
        }

        // 410 on a list call means the sync token has expired
        let request = self.request(Method::GET, url).query(&query);
        let list: GoogleEventList = self
            .send_mapping_gone(request, BackendErrorKind::InvalidSyncToken)
            .await?;

        debug!(
            calendar_id,
            items = list.items.len(),
            more = list.next_page_token.is_some(),
            "Listed events"
        );

        Ok(EventPage {
            items: list.items.into_iter().map(Event::from_google).collect(),
            next_page_token: list.next_page_token,
            next_sync_token: list.next_sync_token,
        })
    }

    pub async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> Result<Event, BackendError> {
        let url = endpoint(&["calendars", calendar_id, "events"])?;
        let request = self
            .request(Method::POST, url)
            .query(&[("sendUpdates", send_updates(notify))])
            .json(&payload.to_google());

        let created: GoogleEvent = self.send(request).await?;
        Ok(Event::from_google(created))
    }

    pub async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> Result<Event, BackendError> {
        let url = endpoint(&["calendars", calendar_id, "events", event_id])?;
        let request = self
            .request(Method::PATCH, url)
            .query(&[("sendUpdates", send_updates(notify))])
            .json(&payload.to_google());

        let patched: GoogleEvent = self.send(request).await?;
        Ok(Event::from_google(patched))
    }

    /// Deleting an event that is already gone succeeds.
    pub async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        notify: bool,
    ) -> Result<(), BackendError> {
        let url = endpoint(&["calendars", calendar_id, "events", event_id])?;
        let request = self
            .request(Method::DELETE, url)
            .query(&[("sendUpdates", send_updates(notify))]);

        let response = request.send().await.map_err(network_error)?;
        if response.status().is_success() || response.status() == StatusCode::GONE {
            return Ok(());
        }
        Err(error_from_response(response).await)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.access_token)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        self.send_mapping_gone(request, BackendErrorKind::NotFound).await
    }

    async fn send_mapping_gone<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        gone: BackendErrorKind,
    ) -> Result<T, BackendError> {
        let response = request.send().await.map_err(network_error)?;
        if response.status() == StatusCode::GONE {
            let message = format!("Google returned {}", response.status());
            return Err(BackendError::new(gone, message));
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response.json().await.map_err(|e| {
            BackendError::new(
                BackendErrorKind::Fatal,
                format!("Failed to parse Google response: {}", e),
            )
        })
    }
}

fn send_updates(notify: bool) -> &'static str {
    if notify { "all" } else { "none" }
}

/// Build an API URL, percent-encoding each path segment (calendar ids
/// contain `@` and `#`).
fn endpoint(segments: &[&str]) -> Result<Url, BackendError> {
    let fatal = || BackendError::new(BackendErrorKind::Fatal, "Invalid Google API base URL");

    let mut url = Url::parse(API_BASE).map_err(|_| fatal())?;
    url.path_segments_mut().map_err(|_| fatal())?.extend(segments);
    Ok(url)
}

fn network_error(err: reqwest::Error) -> BackendError {
    BackendError::transient(format!("Request to Google failed: {}", err))
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify(status, &body)
}

/// Map an HTTP error status and Google's error body to a `BackendError`.
fn classify(status: StatusCode, body: &str) -> BackendError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_default();
    let rate_limited = detail
        .errors
        .iter()
        .any(|e| RATE_LIMIT_REASONS.contains(&e.reason.as_str()));

    let kind = match status {
        StatusCode::NOT_FOUND => BackendErrorKind::NotFound,
        StatusCode::GONE => BackendErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => BackendErrorKind::RateLimited,
        StatusCode::FORBIDDEN if rate_limited => BackendErrorKind::RateLimited,
        s if s.is_server_error() => BackendErrorKind::Transient,
        _ => BackendErrorKind::Fatal,
    };

    let message = if detail.message.is_empty() {
        format!("Google returned {}", status)
    } else {
        format!("Google returned {}: {}", status, detail.message)
    };

    BackendError::new(kind, message)
}
