//! Drives one full or incremental sync pass.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendErrorKind, CalendarBackend};
use crate::config::MirrorConfig;
use crate::diff::ShadowDiff;
use crate::error::{ShadowError, ShadowResult};
use crate::event::Event;
use crate::fetch::{EventFetcher, FetchedEvents, SyncWindow};
use crate::filter::is_live;
use crate::gateway::{Gateway, RetryPolicy};
use crate::reconcile::{Reconciler, sort_sources};
use crate::report::{
    NotificationSink, ReconciliationResult, SyncMode, SyncOutcome, SyncReport, TriggerIntent,
};
use crate::scan;
use crate::state::{KeyValueStore, SyncState};

/// Guests are always told about shadow changes; that is the point of them.
const NOTIFY_GUESTS: bool = true;

pub struct SyncCoordinator<B, S> {
    gateway: Gateway<B>,
    store: S,
    config: MirrorConfig,
    shadow_calendar_id: Option<String>,
}

impl<B: CalendarBackend, S: KeyValueStore> SyncCoordinator<B, S> {
    pub fn new(backend: B, store: S, config: MirrorConfig) -> Self {
        SyncCoordinator {
            gateway: Gateway::new(backend),
            store,
            config,
            shadow_calendar_id: None,
        }
    }

    /// Shadow calendar to use; takes precedence over the one in sync state.
    pub fn with_shadow_calendar(mut self, calendar_id: impl Into<String>) -> Self {
        self.shadow_calendar_id = Some(calendar_id.into());
        self
    }

    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        SyncCoordinator {
            gateway: self.gateway.with_retry_policy(policy),
            ..self
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a pass and hand the report to `sink`.
    pub async fn run_and_notify(&self, mode: SyncMode, sink: &dyn NotificationSink) -> SyncReport {
        let report = self.run(mode).await;
        report.deliver(sink);
        report
    }

    /// Run a pass. Failures are reported in the returned `SyncReport`, along
    /// with whatever was applied before the failure.
    pub async fn run(&self, mode: SyncMode) -> SyncReport {
        let mut result = ReconciliationResult::default();
        let mut full_window = mode == SyncMode::Full;

        match self.pass(mode, &mut result, &mut full_window).await {
            Ok(()) => {
                info!(
                    %mode,
                    created = result.created,
                    updated = result.updated,
                    deleted = result.deleted,
                    "Sync complete"
                );
                SyncReport {
                    mode,
                    outcome: SyncOutcome::Completed { result },
                    full_window,
                    triggers: self.triggers(mode),
                }
            }
            Err(err) => {
                error!(%mode, error = %err, "Sync failed");
                SyncReport {
                    mode,
                    outcome: SyncOutcome::Failed {
                        error: err.to_string(),
                        partial: result,
                    },
                    full_window,
                    triggers: Vec::new(),
                }
            }
        }
    }

    fn triggers(&self, mode: SyncMode) -> Vec<TriggerIntent> {
        match mode {
            SyncMode::Full => vec![
                TriggerIntent::MonthlyFullResync,
                TriggerIntent::OnSourceChange {
                    calendar_id: self.config.main_calendar().to_string(),
                },
            ],
            SyncMode::Incremental => Vec::new(),
        }
    }

    async fn pass(
        &self,
        mode: SyncMode,
        result: &mut ReconciliationResult,
        full_window: &mut bool,
    ) -> ShadowResult<()> {
        let mut state = SyncState::load(&self.store)?;
        let main_calendar = self.config.main_calendar();

        let shadow_calendar = self
            .shadow_calendar_id
            .clone()
            .or_else(|| state.shadow_calendar_id.clone())
            .ok_or_else(|| ShadowError::Config("No shadow calendar configured".into()))?;

        for calendar_id in [main_calendar, shadow_calendar.as_str()] {
            if self.gateway.get_calendar(calendar_id).await?.is_none() {
                return Err(ShadowError::CalendarNotFound(calendar_id.to_string()));
            }
        }

        if mode == SyncMode::Full {
            state.clear_sync_token(&self.store)?;
        }

        let window = SyncWindow::starting_at(Utc::now());
        let fetcher = EventFetcher::new(&self.gateway);

        let fetched = match state.sync_token.clone() {
            Some(token) => match fetcher.fetch(main_calendar, &window, Some(&token)).await {
                Ok(fetched) => fetched,
                Err(ShadowError::StaleSyncToken) => {
                    warn!("Sync token rejected, falling back to a full fetch");
                    state.clear_sync_token(&self.store)?;
                    *full_window = true;
                    fetcher.fetch(main_calendar, &window, None).await?
                }
                Err(e) => return Err(e),
            },
            None => {
                *full_window = true;
                fetcher.fetch(main_calendar, &window, None).await?
            }
        };

        let FetchedEvents {
            events: mut sources,
            next_sync_token,
        } = fetched;

        state.shadow_calendar_id = Some(shadow_calendar.clone());
        if next_sync_token.is_some() {
            state.sync_token = next_sync_token;
        }
        state.save(&self.store)?;

        let shadows: Vec<Event> = fetcher
            .fetch(&shadow_calendar, &window, None)
            .await?
            .events
            .into_iter()
            .filter(|e| e.origin_id.is_some() && !e.is_cancelled())
            .collect();

        sort_sources(&mut sources);
        info!(
            %mode,
            sources = sources.len(),
            shadows = shadows.len(),
            "Reconciling"
        );

        let mut deleted_ids = HashSet::new();

        let plan = Reconciler::new(&self.config)
            .within(window)
            .plan(&sources, &shadows);
        self.apply(&shadow_calendar, &plan, &mut deleted_ids, result)
            .await?;

        let live_ids: HashSet<&str> = sources
            .iter()
            .filter(|e| is_live(e, self.config.accepted_only))
            .map(|e| e.id.as_str())
            .collect();
        let dupe_only = !*full_window;
        let cleanup = scan::deletions(&shadows, &live_ids, dupe_only);
        self.apply(&shadow_calendar, &cleanup, &mut deleted_ids, result)
            .await?;

        Ok(())
    }

    async fn apply(
        &self,
        calendar_id: &str,
        diffs: &[ShadowDiff],
        deleted_ids: &mut HashSet<String>,
        result: &mut ReconciliationResult,
    ) -> ShadowResult<()> {
        for diff in diffs {
            debug!(%diff, "Applying change");
            let origin_id = diff.origin_id();
            match diff {
                ShadowDiff::Create { payload } => {
                    let created = self
                        .gateway
                        .insert_event(calendar_id, payload, NOTIFY_GUESTS)
                        .await?;
                    result.created += 1;
                    info!(origin_id, shadow_id = %created.id, "Created shadow event");
                }
                ShadowDiff::Update {
                    shadow_id,
                    payload,
                    changed,
                } => {
                    self.gateway
                        .patch_event(calendar_id, shadow_id, payload, NOTIFY_GUESTS)
                        .await?;
                    result.updated += 1;
                    let fields: Vec<String> = changed.iter().map(|c| c.to_string()).collect();
                    info!(
                        origin_id,
                        %shadow_id,
                        changed = %fields.join(","),
                        "Updated shadow event"
                    );
                }
                ShadowDiff::Delete { shadow_id, reason, .. } => {
                    if !deleted_ids.insert(shadow_id.clone()) {
                        continue;
                    }
                    match self
                        .gateway
                        .delete_event(calendar_id, shadow_id, NOTIFY_GUESTS)
                        .await
                    {
                        Ok(()) => {
                            result.deleted += 1;
                            info!(origin_id, %shadow_id, %reason, "Deleted shadow event");
                        }
                        Err(ShadowError::Backend { source, .. })
                            if source.kind == BackendErrorKind::NotFound =>
                        {
                            debug!(%shadow_id, "Shadow event already gone");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Operation;
    use crate::event::EventStatus;
    use crate::state::MemoryStore;
    use crate::testing::{
        MAIN, MemoryBackend, SHADOW, mirror_config, shadow_event, shift_days, source_event,
    };

    fn coordinator(backend: &MemoryBackend) -> SyncCoordinator<MemoryBackend, MemoryStore> {
        SyncCoordinator::new(backend.clone(), MemoryStore::default(), mirror_config())
            .with_shadow_calendar(SHADOW)
    }

    fn completed(report: &SyncReport) -> ReconciliationResult {
        match &report.outcome {
            SyncOutcome::Completed { result } => *result,
            SyncOutcome::Failed { error, .. } => panic!("sync failed: {}", error),
        }
    }

    fn counts(created: usize, updated: usize, deleted: usize) -> ReconciliationResult {
        ReconciliationResult {
            created,
            updated,
            deleted,
        }
    }

    #[tokio::test]
    async fn first_sync_creates_tagged_shadow() {
        let backend = MemoryBackend::new();
        backend.set_events(MAIN, vec![source_event("E1", 14)]);
        let sync = coordinator(&backend);

        let report = sync.run(SyncMode::Full).await;

        assert_eq!(completed(&report), counts(1, 0, 0));
        let shadows = backend.events(SHADOW);
        assert_eq!(shadows.len(), 1);
        assert_eq!(shadows[0].origin_id.as_deref(), Some("E1"));
        assert!(backend.mutations().iter().all(|c| c.notify));
        assert_eq!(report.triggers.len(), 2);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let backend = MemoryBackend::new();
        backend.set_events(
            MAIN,
            vec![source_event("E1", 14), source_event("E2", 9), source_event("E3", 11)],
        );
        let sync = coordinator(&backend);

        completed(&sync.run(SyncMode::Full).await);
        let mutations_before = backend.mutations().len();
        let report = sync.run(SyncMode::Full).await;

        assert_eq!(completed(&report), counts(0, 0, 0));
        assert_eq!(backend.mutations().len(), mutations_before);
    }

    #[tokio::test]
    async fn creates_follow_start_time_order() {
        let backend = MemoryBackend::new();
        backend.set_events(MAIN, vec![source_event("late", 16), source_event("early", 8)]);
        let sync = coordinator(&backend);

        completed(&sync.run(SyncMode::Full).await);

        let origins: Vec<Option<String>> =
            backend.events(SHADOW).into_iter().map(|e| e.origin_id).collect();
        assert_eq!(
            origins,
            vec![Some("early".to_string()), Some("late".to_string())]
        );
    }

    #[tokio::test]
    async fn cancelled_source_deletes_its_shadow_once() {
        let backend = MemoryBackend::new();
        let mut e1 = source_event("E1", 14);
        backend.set_events(SHADOW, vec![shadow_event("S1", &e1)]);
        e1.status = EventStatus::Cancelled;
        backend.set_events(MAIN, vec![e1]);
        let sync = coordinator(&backend);

        let report = sync.run(SyncMode::Full).await;

        assert_eq!(completed(&report), counts(0, 0, 1));
        assert!(backend.events(SHADOW).is_empty());
        let deletes = backend
            .calls()
            .into_iter()
            .filter(|c| c.operation == Operation::DeleteEvent)
            .count();
        assert_eq!(deletes, 1);
    }

    #[tokio::test]
    async fn full_sync_removes_orphans() {
        let backend = MemoryBackend::new();
        let e1 = source_event("E1", 14);
        let gone = source_event("GONE", 10);
        backend.set_events(MAIN, vec![e1.clone()]);
        backend.set_events(SHADOW, vec![shadow_event("S1", &e1), shadow_event("S2", &gone)]);
        let sync = coordinator(&backend);

        let report = sync.run(SyncMode::Full).await;

        assert_eq!(completed(&report), counts(0, 0, 1));
        let remaining: Vec<String> = backend.events(SHADOW).into_iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec!["S1"]);
    }

    #[tokio::test]
    async fn incremental_sync_removes_only_duplicates() {
        let backend = MemoryBackend::new();
        let e1 = source_event("E1", 14);
        let other = source_event("E9", 10);
        backend.set_events(MAIN, vec![e1.clone(), other.clone()]);
        backend.set_events(
            SHADOW,
            vec![
                shadow_event("S1", &e1),
                shadow_event("S2", &e1),
                shadow_event("S9", &other),
            ],
        );
        backend.set_delta(vec![e1]);
        let sync = coordinator(&backend);
        sync.store().set("sync_token", "token-0").unwrap();

        let report = sync.run(SyncMode::Incremental).await;

        assert_eq!(completed(&report), counts(0, 0, 1));
        assert!(!report.full_window);
        assert!(report.triggers.is_empty());
        let remaining: Vec<String> = backend.events(SHADOW).into_iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec!["S1", "S9"]);
    }

    #[tokio::test]
    async fn incremental_edit_of_a_past_event_creates_nothing() {
        let backend = MemoryBackend::new();
        // Shadowed while it was upcoming; both have since slipped out of
        // the window, so the shadow listing no longer returns S1.
        let mut e1 = shift_days(source_event("E1", 14), -3);
        backend.set_events(MAIN, vec![e1.clone()]);
        backend.set_events(SHADOW, vec![shadow_event("S1", &e1)]);
        e1.summary = "Retro notes".to_string();
        backend.set_delta(vec![e1]);
        let sync = coordinator(&backend);
        sync.store().set("sync_token", "token-0").unwrap();

        let first = sync.run(SyncMode::Incremental).await;
        let second = sync.run(SyncMode::Incremental).await;

        assert_eq!(completed(&first), counts(0, 0, 0));
        assert_eq!(completed(&second), counts(0, 0, 0));
        assert!(backend.mutations().is_empty());
        let remaining: Vec<String> = backend.events(SHADOW).into_iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec!["S1"]);
    }

    #[tokio::test]
    async fn event_moved_beyond_the_window_loses_its_shadow() {
        let backend = MemoryBackend::new();
        let e1 = source_event("E1", 14);
        backend.set_events(MAIN, vec![e1.clone()]);
        backend.set_events(SHADOW, vec![shadow_event("S1", &e1)]);
        backend.set_delta(vec![shift_days(e1, 400)]);
        let sync = coordinator(&backend);
        sync.store().set("sync_token", "token-0").unwrap();

        let report = sync.run(SyncMode::Incremental).await;

        assert_eq!(completed(&report), counts(0, 0, 1));
        assert!(backend.events(SHADOW).is_empty());
    }

    #[tokio::test]
    async fn stale_token_falls_back_to_full_fetch() {
        let backend = MemoryBackend::new();
        backend.set_events(MAIN, vec![source_event("E1", 14)]);
        backend.expire_sync_tokens();
        let sync = coordinator(&backend);
        sync.store().set("sync_token", "token-0").unwrap();

        let report = sync.run(SyncMode::Incremental).await;

        assert_eq!(completed(&report), counts(1, 0, 0));
        assert!(report.full_window);
        let state = SyncState::load(sync.store()).unwrap();
        assert!(state.sync_token.is_some());
        assert_ne!(state.sync_token.as_deref(), Some("token-0"));
    }

    #[tokio::test]
    async fn full_sync_discards_stored_token() {
        let backend = MemoryBackend::new();
        let sync = coordinator(&backend);
        sync.store().set("sync_token", "token-0").unwrap();

        completed(&sync.run(SyncMode::Full).await);

        let listed_with_token = backend
            .calls()
            .iter()
            .any(|c| c.operation == Operation::ListEvents && c.sync_token.is_some());
        assert!(!listed_with_token);
    }

    #[tokio::test]
    async fn state_records_token_and_shadow_calendar() {
        let backend = MemoryBackend::new();
        backend.set_events(MAIN, vec![source_event("E1", 14)]);
        let sync = coordinator(&backend);

        completed(&sync.run(SyncMode::Full).await);

        let state = SyncState::load(sync.store()).unwrap();
        assert_eq!(state.shadow_calendar_id.as_deref(), Some(SHADOW));
        assert!(state.sync_token.is_some());
    }

    #[tokio::test]
    async fn missing_main_calendar_aborts_before_mutation() {
        let backend = MemoryBackend::new();
        backend.set_events(SHADOW, vec![shadow_event("S1", &source_event("E1", 14))]);
        backend.remove_calendar(MAIN);
        let sync = coordinator(&backend);

        let report = sync.run(SyncMode::Full).await;

        match &report.outcome {
            SyncOutcome::Failed { error, partial } => {
                assert!(error.contains("Calendar not found"));
                assert!(partial.is_empty());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(backend.mutations().is_empty());
        assert!(
            !backend
                .calls()
                .iter()
                .any(|c| c.operation == Operation::ListEvents)
        );
    }

    #[tokio::test]
    async fn missing_shadow_calendar_is_a_config_error() {
        let backend = MemoryBackend::new();
        let sync = SyncCoordinator::new(backend.clone(), MemoryStore::default(), mirror_config());

        let report = sync.run(SyncMode::Full).await;

        assert!(!report.is_success());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn shadow_calendar_can_come_from_state() {
        let backend = MemoryBackend::new();
        backend.set_events(MAIN, vec![source_event("E1", 14)]);
        let store = MemoryStore::default();
        store.set("shadow_calendar_id", SHADOW).unwrap();
        let sync = SyncCoordinator::new(backend.clone(), store, mirror_config());

        let report = sync.run(SyncMode::Full).await;

        assert_eq!(completed(&report), counts(1, 0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_keeps_partial_counts() {
        let backend = MemoryBackend::new();
        backend.set_events(MAIN, vec![source_event("E1", 9), source_event("E2", 14)]);
        backend.fail_after(Operation::InsertEvent, BackendErrorKind::Transient, 1);
        let sync = coordinator(&backend);

        let report = sync.run(SyncMode::Full).await;

        match &report.outcome {
            SyncOutcome::Failed { error, partial } => {
                assert_eq!(*partial, counts(1, 0, 0));
                assert!(error.contains("insert event"), "{}", error);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(backend.events(SHADOW).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_retry_policy_shortens_backoff() {
        let backend = MemoryBackend::new();
        backend.fail_after(Operation::GetCalendar, BackendErrorKind::Transient, 0);
        let sync = coordinator(&backend).with_retry_policy(RetryPolicy {
            ceiling: std::time::Duration::from_secs(3),
        });

        let report = sync.run(SyncMode::Full).await;

        assert!(!report.is_success());
        // attempts after waiting 1s and 2s, then the next 4s wait would pass 3s
        assert_eq!(backend.calls().len(), 3);
    }
}
