//! Post-reconciliation sweep for duplicate and orphaned shadow events.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::diff::{DeleteReason, ShadowDiff};
use crate::event::Event;

/// How a shadow event relates to the live source events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowCategory {
    /// The first shadow for a live source event
    Found,
    /// An earlier shadow already has the same origin
    Duplicate,
    /// The origin is not among the live source events
    Missing,
}

/// Classify each tagged shadow in list order. Untagged events are skipped.
pub fn classify<'a>(
    shadows: &'a [Event],
    live_ids: &HashSet<&str>,
) -> Vec<(&'a Event, &'a str, ShadowCategory)> {
    let mut seen: HashSet<&str> = HashSet::new();

    shadows
        .iter()
        .filter_map(|shadow| {
            let origin = shadow.origin_id.as_deref()?;
            let category = if !seen.insert(origin) {
                ShadowCategory::Duplicate
            } else if !live_ids.contains(origin) {
                ShadowCategory::Missing
            } else {
                ShadowCategory::Found
            };
            Some((shadow, origin, category))
        })
        .collect()
}

/// Deletions for every shadow that is not `Found`.
///
/// With `dupe_only` (incremental passes, where the source set is only a
/// delta) orphans are expected and only duplicates are removed.
pub fn deletions(
    shadows: &[Event],
    live_ids: &HashSet<&str>,
    dupe_only: bool,
) -> Vec<ShadowDiff> {
    classify(shadows, live_ids)
        .into_iter()
        .filter_map(|(shadow, origin, category)| {
            let reason = match category {
                ShadowCategory::Found => return None,
                ShadowCategory::Duplicate => DeleteReason::Duplicate,
                ShadowCategory::Missing if dupe_only => return None,
                ShadowCategory::Missing => DeleteReason::Orphaned,
            };
            Some(ShadowDiff::Delete {
                shadow_id: shadow.id.clone(),
                origin_id: origin.to_string(),
                reason,
            })
        })
        .collect()
}
