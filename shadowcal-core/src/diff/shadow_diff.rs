use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diff::DiffKind;
use crate::shadow::{ShadowField, ShadowPayload};

/// Why a shadow event is being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// The source event was cancelled
    Cancelled,
    /// The owner's response no longer passes the response filter
    Declined,
    /// Another shadow event earlier in the list has the same origin
    Duplicate,
    /// The origin is no longer among the live source events
    Orphaned,
    /// The source event moved outside the sync window
    OutOfWindow,
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DeleteReason::Cancelled => "source cancelled",
            DeleteReason::Declined => "not attending",
            DeleteReason::Duplicate => "duplicate",
            DeleteReason::Orphaned => "source gone",
            DeleteReason::OutOfWindow => "outside sync window",
        };
        write!(f, "{}", reason)
    }
}

/// A single change to the shadow calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShadowDiff {
    Create {
        payload: ShadowPayload,
    },
    Update {
        shadow_id: String,
        payload: ShadowPayload,
        changed: Vec<ShadowField>,
    },
    Delete {
        shadow_id: String,
        origin_id: String,
        reason: DeleteReason,
    },
}

impl ShadowDiff {
    pub fn kind(&self) -> DiffKind {
        match self {
            ShadowDiff::Create { .. } => DiffKind::Create,
            ShadowDiff::Update { .. } => DiffKind::Update,
            ShadowDiff::Delete { .. } => DiffKind::Delete,
        }
    }

    /// Identifier of the source event this change is about.
    pub fn origin_id(&self) -> &str {
        match self {
            ShadowDiff::Create { payload } | ShadowDiff::Update { payload, .. } => {
                &payload.origin_id
            }
            ShadowDiff::Delete { origin_id, .. } => origin_id,
        }
    }
}

impl fmt::Display for ShadowDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShadowDiff::Create { payload } => {
                write!(f, "{} {} at {}", self.kind(), payload.origin_id, payload.start)
            }
            ShadowDiff::Update {
                shadow_id,
                payload,
                changed,
            } => {
                let fields: Vec<String> = changed.iter().map(|c| c.to_string()).collect();
                write!(
                    f,
                    "{} {} ({}) [{}]",
                    self.kind(),
                    payload.origin_id,
                    shadow_id,
                    fields.join(", ")
                )
            }
            ShadowDiff::Delete {
                shadow_id,
                origin_id,
                reason,
            } => write!(f, "{} {} ({}): {}", self.kind(), origin_id, shadow_id, reason),
        }
    }
}
