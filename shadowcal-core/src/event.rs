//! Provider-neutral event types.
//!
//! Providers convert their API responses into these types. The same `Event`
//! represents both source events and shadow events; a shadow event is simply
//! one that carries an `origin_id` tag.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar event (provider-neutral)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier assigned by the calendar that owns the event
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Missing on cancelled entries of a delta feed
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
    pub status: EventStatus,
    #[serde(default)]
    pub transparency: Transparency,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    /// Origin tag linking a shadow event to the source event it mirrors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
}

impl Event {
    /// The timed window of this event, if it has one.
    ///
    /// All-day events and events missing either bound have no window and
    /// are never mirrored.
    pub fn time_window(&self) -> Option<TimeWindow> {
        match (&self.start, &self.end) {
            (Some(EventTime::DateTime(start)), Some(EventTime::DateTime(end))) => {
                Some(TimeWindow {
                    start: *start,
                    end: *end,
                })
            }
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    /// The attendee entry representing the calendar owner.
    pub fn self_attendee(&self) -> Option<&Attendee> {
        self.attendees.iter().find(|a| a.is_self)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.summary.is_empty() {
            write!(f, "(untitled {})", self.id)
        } else {
            write!(f, "{}", self.summary)
        }
    }
}

/// An event attendee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    /// Whether this entry is the owner of the calendar the event was read from
    #[serde(default, rename = "self")]
    pub is_self: bool,
    #[serde(default)]
    pub response_status: Option<ResponseStatus>,
}

/// RSVP state of an attendee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    Accepted,
    Declined,
    Tentative,
    NeedsAction,
}

/// Start or end of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTime {
    /// A point in time with the offset it was recorded in
    DateTime(DateTime<FixedOffset>),
    /// An all-day date
    Date(NaiveDate),
}

impl EventTime {
    /// Absolute instant, ignoring the offset the time was written in.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            EventTime::DateTime(dt) => Some(dt.with_timezone(&Utc)),
            EventTime::Date(_) => None,
        }
    }
}

/// The timed span of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

/// Event transparency (busy/free status)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transparency {
    /// Event blocks time on calendar (default)
    #[default]
    Opaque,
    /// Event does not block time (shows as free)
    Transparent,
}
