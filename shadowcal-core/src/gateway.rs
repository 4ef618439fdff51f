//! Retrying wrapper around a `CalendarBackend`.
//!
//! Every call is retried on transient and rate-limit failures with
//! exponential backoff: the wait before retry `n` is `2^(n-1)` seconds, and
//! the call is abandoned once the cumulative wait would exceed the ceiling.
//! Each call starts its own backoff from scratch.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::backend::{
    BackendError, BackendErrorKind, CalendarBackend, CalendarInfo, EventPage, ListParams,
    Operation,
};
use crate::constants::BACKOFF_CEILING_SECS;
use crate::error::{ShadowError, ShadowResult};
use crate::event::Event;
use crate::shadow::ShadowPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum cumulative wait for a single call
    pub ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            ceiling: Duration::from_secs(BACKOFF_CEILING_SECS),
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying after failed attempt number `attempt` (from 1).
    pub fn delay(attempt: u32) -> Duration {
        let secs = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_secs(secs)
    }

    /// The next wait, or `None` if it would push the total past the ceiling.
    pub fn next_delay(&self, attempt: u32, waited: Duration) -> Option<Duration> {
        let delay = Self::delay(attempt);
        (waited + delay <= self.ceiling).then_some(delay)
    }
}

/// A backend whose calls are retried according to a `RetryPolicy`.
pub struct Gateway<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: CalendarBackend> Gateway<B> {
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, RetryPolicy::default())
    }

    pub fn with_policy(backend: B, policy: RetryPolicy) -> Self {
        Gateway { backend, policy }
    }

    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        Gateway { policy, ..self }
    }

    pub async fn get_calendar(&self, calendar_id: &str) -> ShadowResult<Option<CalendarInfo>> {
        self.call(Operation::GetCalendar, || self.backend.get_calendar(calendar_id))
            .await
    }

    pub async fn list_events(
        &self,
        calendar_id: &str,
        params: &ListParams,
    ) -> ShadowResult<EventPage> {
        self.call(Operation::ListEvents, || {
            self.backend.list_events(calendar_id, params)
        })
        .await
    }

    pub async fn insert_event(
        &self,
        calendar_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> ShadowResult<Event> {
        self.call(Operation::InsertEvent, || {
            self.backend.insert_event(calendar_id, payload, notify)
        })
        .await
    }

    pub async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        payload: &ShadowPayload,
        notify: bool,
    ) -> ShadowResult<Event> {
        self.call(Operation::PatchEvent, || {
            self.backend.patch_event(calendar_id, event_id, payload, notify)
        })
        .await
    }

    pub async fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        notify: bool,
    ) -> ShadowResult<()> {
        self.call(Operation::DeleteEvent, || {
            self.backend.delete_event(calendar_id, event_id, notify)
        })
        .await
    }

    async fn call<T, F, Fut>(&self, operation: Operation, mut request: F) -> ShadowResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 1;
        let mut waited = Duration::ZERO;

        loop {
            let err = match request().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.kind.is_retryable() {
                if let Some(delay) = self.policy.next_delay(attempt, waited) {
                    warn!(
                        %operation,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "Backend call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    waited += delay;
                    attempt += 1;
                    continue;
                }
            }

            return Err(terminal_error(operation, attempt, err));
        }
    }
}

fn terminal_error(operation: Operation, attempts: u32, source: BackendError) -> ShadowError {
    match source.kind {
        BackendErrorKind::RateLimited => ShadowError::UsageLimit {
            operation,
            attempts,
            source,
        },
        _ => ShadowError::Backend {
            operation,
            attempts,
            source,
        },
    }
}
