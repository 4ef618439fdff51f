//! The shape of a shadow event and how it compares to what is already on
//! the shadow calendar.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::config::{MirrorConfig, normalize_email};
use crate::constants::{PLACEHOLDER_DESCRIPTION, PLACEHOLDER_SUMMARY, SHADOW_SUMMARY_SUFFIX};
use crate::event::{Attendee, Event, EventTime, TimeWindow, Transparency};

/// Everything written to the shadow calendar for one source event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowPayload {
    pub origin_id: String,
    pub summary: String,
    pub description: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub transparency: Transparency,
    /// Guest emails, sorted
    pub attendees: Vec<String>,
}

/// A field of a shadow event that can drift from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowField {
    OriginId,
    Summary,
    Description,
    Start,
    End,
    Transparency,
    Attendees,
}

impl fmt::Display for ShadowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShadowField::OriginId => "origin",
            ShadowField::Summary => "summary",
            ShadowField::Description => "description",
            ShadowField::Start => "start",
            ShadowField::End => "end",
            ShadowField::Transparency => "transparency",
            ShadowField::Attendees => "attendees",
        };
        write!(f, "{}", name)
    }
}

impl ShadowPayload {
    /// Build the shadow of `event` occupying `window`.
    pub fn for_source(event: &Event, window: TimeWindow, config: &MirrorConfig) -> Self {
        let (summary, description) = if config.show_full_details {
            (
                format!("{}{}", event.summary, SHADOW_SUMMARY_SUFFIX),
                event.description.clone().unwrap_or_default(),
            )
        } else {
            (
                PLACEHOLDER_SUMMARY.to_string(),
                PLACEHOLDER_DESCRIPTION.to_string(),
            )
        };

        ShadowPayload {
            origin_id: event.id.clone(),
            summary,
            description,
            start: window.start,
            end: window.end,
            transparency: event.transparency,
            attendees: config.attendee_emails.iter().cloned().collect(),
        }
    }

    /// Fields of `existing` that differ from this payload, in a stable order.
    /// Empty when the shadow is up to date.
    pub fn changed_fields(&self, existing: &Event) -> Vec<ShadowField> {
        let mut changed = Vec::new();

        if existing.origin_id.as_deref() != Some(self.origin_id.as_str()) {
            changed.push(ShadowField::OriginId);
        }
        if existing.summary != self.summary {
            changed.push(ShadowField::Summary);
        }
        if existing.description.as_deref().unwrap_or_default() != self.description {
            changed.push(ShadowField::Description);
        }
        if !same_instant(self.start, existing.start.as_ref()) {
            changed.push(ShadowField::Start);
        }
        if !same_instant(self.end, existing.end.as_ref()) {
            changed.push(ShadowField::End);
        }
        if existing.transparency != self.transparency {
            changed.push(ShadowField::Transparency);
        }
        if !same_attendees(&self.attendees, &existing.attendees) {
            changed.push(ShadowField::Attendees);
        }

        changed
    }
}

/// Compare as absolute instants, so the same moment written with different
/// offsets is equal.
pub fn same_instant(wanted: DateTime<FixedOffset>, existing: Option<&EventTime>) -> bool {
    existing
        .and_then(EventTime::instant)
        .is_some_and(|instant| instant == wanted.to_utc())
}

/// Compare guest lists as sets of emails; order and case are ignored.
pub fn same_attendees(wanted: &[String], existing: &[Attendee]) -> bool {
    let wanted: BTreeSet<String> = wanted.iter().map(|e| normalize_email(e)).collect();
    let existing: BTreeSet<String> = existing.iter().map(|a| normalize_email(&a.email)).collect();
    wanted == existing
}
