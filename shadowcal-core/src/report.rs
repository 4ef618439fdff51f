//! Results of a sync pass and how they reach the operator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Counts of applied changes, accumulated over a whole pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ReconciliationResult {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Discard the sync token and rescan the whole window
    Full,
    /// Fetch only changes since the stored sync token
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full => write!(f, "full"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// A schedule the coordinator wants installed. Installing it is up to the
/// caller (cron, systemd timer, push notifications, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum TriggerIntent {
    /// Run a full sync once a month
    MonthlyFullResync,
    /// Run an incremental sync whenever the source calendar changes
    OnSourceChange { calendar_id: String },
}

impl fmt::Display for TriggerIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerIntent::MonthlyFullResync => write!(f, "full sync once a month"),
            TriggerIntent::OnSourceChange { calendar_id } => {
                write!(f, "incremental sync when {} changes", calendar_id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed {
        result: ReconciliationResult,
    },
    /// The pass stopped early; changes applied before the failure are kept.
    Failed {
        error: String,
        partial: ReconciliationResult,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub outcome: SyncOutcome,
    /// Whether the source was scanned over the whole window; false only for
    /// incremental passes that used a stored sync token
    pub full_window: bool,
    pub triggers: Vec<TriggerIntent>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Completed { .. })
    }

    /// Changes applied, whether or not the pass completed.
    pub fn result(&self) -> ReconciliationResult {
        match &self.outcome {
            SyncOutcome::Completed { result } => *result,
            SyncOutcome::Failed { partial, .. } => *partial,
        }
    }

    pub fn deliver(&self, sink: &dyn NotificationSink) {
        match &self.outcome {
            SyncOutcome::Completed { .. } => sink.sync_completed(self),
            SyncOutcome::Failed { error, .. } => sink.sync_failed(self, error),
        }
    }
}

/// Presents pass results to a human.
pub trait NotificationSink {
    fn sync_completed(&self, report: &SyncReport);
    fn sync_failed(&self, report: &SyncReport, error: &str);
}
