//! Retrieves complete event sets, following pagination.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::backend::{BackendErrorKind, CalendarBackend, ListParams};
use crate::constants::SYNC_DAYS;
use crate::error::{ShadowError, ShadowResult};
use crate::event::{Event, TimeWindow};
use crate::gateway::Gateway;

/// The span of time a full sync covers: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    /// `[now, now + SYNC_DAYS)`
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        SyncWindow {
            start: now,
            end: now + Duration::days(SYNC_DAYS),
        }
    }

    /// Whether any part of `span` falls inside the window.
    pub fn overlaps(&self, span: &TimeWindow) -> bool {
        span.start < self.end && span.end > self.start
    }
}

/// Every event from one fetch, plus the cursor for the next delta fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchedEvents {
    pub events: Vec<Event>,
    pub next_sync_token: Option<String>,
}

pub struct EventFetcher<'a, B> {
    gateway: &'a Gateway<B>,
}

impl<'a, B: CalendarBackend> EventFetcher<'a, B> {
    pub fn new(gateway: &'a Gateway<B>) -> Self {
        EventFetcher { gateway }
    }

    /// Fetch all events of `calendar_id`.
    ///
    /// With a `sync_token` only changes since that token are returned and the
    /// window is not sent; otherwise the whole `window` is scanned. Pages are
    /// concatenated before returning, so callers never see a partial set.
    ///
    /// A rejected token yields [`ShadowError::StaleSyncToken`]; falling back
    /// to a full fetch is the caller's decision.
    pub async fn fetch(
        &self,
        calendar_id: &str,
        window: &SyncWindow,
        sync_token: Option<&str>,
    ) -> ShadowResult<FetchedEvents> {
        let mut params = match sync_token {
            Some(token) => ListParams {
                sync_token: Some(token.to_string()),
                ..Default::default()
            },
            None => ListParams {
                time_min: Some(window.start),
                time_max: Some(window.end),
                ..Default::default()
            },
        };

        let mut fetched = FetchedEvents::default();
        let mut pages = 0;

        loop {
            let page = match self.gateway.list_events(calendar_id, &params).await {
                Ok(page) => page,
                Err(ShadowError::Backend { source, .. })
                    if source.kind == BackendErrorKind::InvalidSyncToken =>
                {
                    return Err(ShadowError::StaleSyncToken);
                }
                Err(e) => return Err(e),
            };

            pages += 1;
            fetched.events.extend(page.items);
            if page.next_sync_token.is_some() {
                fetched.next_sync_token = page.next_sync_token;
            }

            match page.next_page_token {
                Some(token) => params.page_token = Some(token),
                None => break,
            }
        }

        debug!(
            calendar_id,
            pages,
            events = fetched.events.len(),
            incremental = sync_token.is_some(),
            "Fetched events"
        );

        Ok(fetched)
    }
}
