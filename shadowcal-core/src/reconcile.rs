//! Matches source events to their shadows and decides what to create,
//! update or delete.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::MirrorConfig;
use crate::diff::{DeleteReason, ShadowDiff};
use crate::event::Event;
use crate::fetch::SyncWindow;
use crate::filter::should_mirror;
use crate::shadow::ShadowPayload;

/// Order source events by start instant, then identifier.
///
/// Untimed events are kept (a cancelled entry in a delta feed has no times
/// but may still retract a shadow) and sort first.
pub fn sort_sources(events: &mut [Event]) {
    events.sort_by(|a, b| {
        let key_a = a.start.as_ref().and_then(|t| t.instant());
        let key_b = b.start.as_ref().and_then(|t| t.instant());
        key_a.cmp(&key_b).then_with(|| a.id.cmp(&b.id))
    });
}

/// Group shadow events by origin id, keeping list order within each group.
/// Untagged events are ignored.
pub fn shadows_by_origin(shadows: &[Event]) -> HashMap<&str, Vec<&Event>> {
    let mut by_origin: HashMap<&str, Vec<&Event>> = HashMap::new();
    for shadow in shadows {
        if let Some(origin) = shadow.origin_id.as_deref() {
            by_origin.entry(origin).or_default().push(shadow);
        }
    }
    by_origin
}

pub struct Reconciler<'a> {
    config: &'a MirrorConfig,
    window: Option<SyncWindow>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a MirrorConfig) -> Self {
        Reconciler {
            config,
            window: None,
        }
    }

    /// Only mirror events overlapping `window`.
    ///
    /// A delta feed is not bounded by the window, while the shadow snapshot
    /// is. Events outside it are never created, and a shadow that is still
    /// known for one is retracted.
    pub fn within(self, window: SyncWindow) -> Self {
        Reconciler {
            window: Some(window),
            ..self
        }
    }

    /// Compute the operations for `sources` (already sorted with
    /// [`sort_sources`]) against the current `shadows`.
    ///
    /// Only the first shadow per origin is considered; any further
    /// duplicates are left for the scanner.
    pub fn plan(&self, sources: &[Event], shadows: &[Event]) -> Vec<ShadowDiff> {
        let by_origin = shadows_by_origin(shadows);
        let mut seen: HashSet<&str> = HashSet::new();
        let mut diffs = Vec::new();

        for source in sources {
            if !seen.insert(source.id.as_str()) {
                continue;
            }

            let existing = by_origin
                .get(source.id.as_str())
                .and_then(|matches| matches.first().copied());

            let retract = if source.is_cancelled() {
                Some(DeleteReason::Cancelled)
            } else if !should_mirror(source, self.config.accepted_only) {
                Some(DeleteReason::Declined)
            } else {
                None
            };

            if let Some(reason) = retract {
                if let Some(shadow) = existing {
                    diffs.push(ShadowDiff::Delete {
                        shadow_id: shadow.id.clone(),
                        origin_id: source.id.clone(),
                        reason,
                    });
                }
                continue;
            }

            let Some(span) = source.time_window() else {
                debug!(event_id = %source.id, "Skipping event without a time window");
                continue;
            };

            if self.window.is_some_and(|w| !w.overlaps(&span)) {
                match existing {
                    Some(shadow) => diffs.push(ShadowDiff::Delete {
                        shadow_id: shadow.id.clone(),
                        origin_id: source.id.clone(),
                        reason: DeleteReason::OutOfWindow,
                    }),
                    None => debug!(event_id = %source.id, "Skipping event outside the window"),
                }
                continue;
            }

            let payload = ShadowPayload::for_source(source, span, self.config);

            match existing {
                None => diffs.push(ShadowDiff::Create { payload }),
                Some(shadow) => {
                    let changed = payload.changed_fields(shadow);
                    if !changed.is_empty() {
                        diffs.push(ShadowDiff::Update {
                            shadow_id: shadow.id.clone(),
                            payload,
                            changed,
                        });
                    }
                }
            }
        }

        diffs
    }
}
