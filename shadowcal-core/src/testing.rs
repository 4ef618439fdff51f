//! Test fixtures and an in-memory `CalendarBackend`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, FixedOffset, TimeZone, Utc};

use crate::backend::{
    BackendError, BackendErrorKind, CalendarBackend, CalendarInfo, EventPage, ListParams,
    Operation,
};
use crate::config::MirrorConfig;
use crate::event::{Attendee, Event, EventStatus, EventTime, Transparency};
use crate::shadow::ShadowPayload;

pub const MAIN: &str = "primary";
pub const SHADOW: &str = "shadow@group";

pub fn mirror_config() -> MirrorConfig {
    MirrorConfig {
        attendee_emails: ["assistant@example.com", "partner@example.com"]
            .into_iter()
            .map(String::from)
            .collect(),
        main_calendar_id: String::new(),
        show_full_details: false,
        accepted_only: false,
    }
}

/// A confirmed, opaque one-hour event starting at `hour` (UTC+2) tomorrow,
/// so it always falls inside a window starting now.
pub fn source_event(id: &str, hour: u32) -> Event {
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    let day = Utc::now().date_naive() + Days::new(1);
    let start = tz
        .from_local_datetime(&day.and_hms_opt(hour, 0, 0).unwrap())
        .unwrap();
    Event {
        id: id.to_string(),
        summary: format!("Meeting {}", id),
        description: None,
        start: Some(EventTime::DateTime(start)),
        end: Some(EventTime::DateTime(start + Duration::hours(1))),
        status: EventStatus::Confirmed,
        transparency: Transparency::Opaque,
        attendees: vec![],
        origin_id: None,
    }
}

/// `event` moved by `days` (negative moves it into the past).
pub fn shift_days(mut event: Event, days: i64) -> Event {
    for time in [&mut event.start, &mut event.end].into_iter().flatten() {
        if let EventTime::DateTime(dt) = time {
            *dt += Duration::days(days);
        }
    }
    event
}

/// What a backend stores for `payload` under `id`.
pub fn shadow_from_payload(id: &str, payload: &ShadowPayload) -> Event {
    Event {
        id: id.to_string(),
        summary: payload.summary.clone(),
        description: Some(payload.description.clone()),
        start: Some(EventTime::DateTime(payload.start)),
        end: Some(EventTime::DateTime(payload.end)),
        status: EventStatus::Confirmed,
        transparency: payload.transparency,
        attendees: payload
            .attendees
            .iter()
            .map(|email| Attendee {
                email: email.clone(),
                is_self: false,
                response_status: Some(crate::event::ResponseStatus::NeedsAction),
            })
            .collect(),
        origin_id: Some(payload.origin_id.clone()),
    }
}

/// An up-to-date shadow of `source` under the default test config.
pub fn shadow_event(id: &str, source: &Event) -> Event {
    let payload =
        ShadowPayload::for_source(source, source.time_window().unwrap(), &mirror_config());
    shadow_from_payload(id, &payload)
}

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub operation: Operation,
    pub calendar_id: String,
    pub event_id: Option<String>,
    pub notify: bool,
    pub sync_token: Option<String>,
    pub time_min: Option<DateTime<Utc>>,
    pub time_max: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MemoryState {
    calendars: BTreeMap<String, Vec<Event>>,
    /// Events returned for a valid sync token
    delta: Vec<Event>,
    stale_tokens: bool,
    token_counter: u32,
    id_counter: u32,
    page_size: usize,
    failures: VecDeque<(Operation, BackendError)>,
    /// (operation, successful calls allowed, failure kind)
    fail_after: Vec<(Operation, usize, BackendErrorKind)>,
    calls: Vec<Call>,
}

/// In-memory calendar service with scripted failures, pagination and sync
/// tokens. Clones share state.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let mut state = MemoryState {
            page_size: 2,
            ..Default::default()
        };
        state.calendars.insert(MAIN.to_string(), Vec::new());
        state.calendars.insert(SHADOW.to_string(), Vec::new());
        MemoryBackend {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn set_events(&self, calendar_id: &str, events: Vec<Event>) {
        self.lock().calendars.insert(calendar_id.to_string(), events);
    }

    pub fn remove_calendar(&self, calendar_id: &str) {
        self.lock().calendars.remove(calendar_id);
    }

    pub fn events(&self, calendar_id: &str) -> Vec<Event> {
        self.lock()
            .calendars
            .get(calendar_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_delta(&self, events: Vec<Event>) {
        self.lock().delta = events;
    }

    pub fn expire_sync_tokens(&self) {
        self.lock().stale_tokens = true;
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = page_size;
    }

    /// Make the next `count` calls of `operation` fail with `kind`.
    pub fn fail_next(&self, operation: Operation, kind: BackendErrorKind, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state
                .failures
                .push_back((operation, BackendError::new(kind, format!("scripted {:?}", kind))));
        }
    }

    /// Let `allowed` calls of `operation` succeed, then fail every later one.
    pub fn fail_after(&self, operation: Operation, kind: BackendErrorKind, allowed: usize) {
        self.lock().fail_after.push((operation, allowed, kind));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c.operation,
                    Operation::InsertEvent | Operation::PatchEvent | Operation::DeleteEvent
                )
            })
            .collect()
    }

    fn record(
        &self,
        operation: Operation,
        calendar_id: &str,
        event_id: Option<&str>,
        notify: bool,
        params: Option<&ListParams>,
    ) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.calls.push(Call {
            operation,
            calendar_id: calendar_id.to_string(),
            event_id: event_id.map(String::from),
            notify,
            sync_token: params.and_then(|p| p.sync_token.clone()),
            time_min: params.and_then(|p| p.time_min),
            time_max: params.and_then(|p| p.time_max),
        });

        if state.failures.front().is_some_and(|(op, _)| *op == operation) {
            let (_, err) = state.failures.pop_front().unwrap();
            return Err(err);
        }

        let made = state.calls.iter().filter(|c| c.operation == operation).count();
        if let Some((_, _, kind)) = state
            .fail_after
            .iter()
            .find(|(op, allowed, _)| *op == operation && made > *allowed)
        {
            return Err(BackendError::new(*kind, format!("scripted {:?}", kind)));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarBackend for MemoryBackend {
    async fn get_calendar(&self, calendar_id: &str) -> Result<Option<CalendarInfo>, BackendError> {
        self.record(Operation::GetCalendar, calendar_id, None, false, None)?;
        Ok(self.lock().calendars.contains_key(calendar_id).then(|| CalendarInfo {
            id: calendar_id.to_string(),
            name: calendar_id.to_string(),
        }))
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        params: &ListParams,
    ) -> Result<EventPage, BackendError> {
        self.record(Operation::ListEvents, calendar_id, None, false, Some(params))?;

        let mut state = self.lock();
        let items = if params.sync_token.is_some() {
            if state.stale_tokens {
                return Err(BackendError::new(
                    BackendErrorKind::InvalidSyncToken,
                    "sync token expired",
                ));
            }
            state.delta.clone()
        } else {
            // Timed events must overlap [time_min, time_max); untimed ones
            // (all-day, stubs) are always listed.
            state
                .calendars
                .get(calendar_id)
                .ok_or_else(|| BackendError::not_found(calendar_id))?
                .iter()
                .filter(|e| match e.time_window() {
                    Some(span) => {
                        params.time_min.is_none_or(|min| span.end > min)
                            && params.time_max.is_none_or(|max| span.start < max)
                    }
                    None => true,
                })
                .cloned()
                .collect()
        };

        let offset: usize = params
            .page_token
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let end = (offset + state.page_size).min(items.len());
        let page = items[offset.min(end)..end].to_vec();

        if end < items.len() {
            Ok(EventPage {
                items: page,
                next_page_token: Some(end.to_string()),
                next_sync_token: None,
            })
        } else {
            state.token_counter += 1;
            Ok(EventPage {
                items: page,
                next_page_token: None,
                next_sync_token: Some(format!("token-{}", state.token_counter)),
            })
        }
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> Result<Event, BackendError> {
        self.record(Operation::InsertEvent, calendar_id, None, notify, None)?;

        let mut state = self.lock();
        state.id_counter += 1;
        let event = shadow_from_payload(&format!("created-{}", state.id_counter), payload);
        state
            .calendars
            .get_mut(calendar_id)
            .ok_or_else(|| BackendError::not_found(calendar_id))?
            .push(event.clone());
        Ok(event)
    }

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> Result<Event, BackendError> {
        self.record(Operation::PatchEvent, calendar_id, Some(event_id), notify, None)?;

        let mut state = self.lock();
        let events = state
            .calendars
            .get_mut(calendar_id)
            .ok_or_else(|| BackendError::not_found(calendar_id))?;
        let slot = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| BackendError::not_found(event_id))?;
        *slot = shadow_from_payload(event_id, payload);
        Ok(slot.clone())
    }

    async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        notify: bool,
    ) -> Result<(), BackendError> {
        self.record(Operation::DeleteEvent, calendar_id, Some(event_id), notify, None)?;

        let mut state = self.lock();
        let events = state
            .calendars
            .get_mut(calendar_id)
            .ok_or_else(|| BackendError::not_found(calendar_id))?;
        let before = events.len();
        events.retain(|e| e.id != event_id);
        if events.len() == before {
            return Err(BackendError::not_found(event_id));
        }
        Ok(())
    }
}
