//! Conversion between Google Calendar API JSON and shadowcal types.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use shadowcal_core::shadow::ShadowPayload;
use shadowcal_core::{Attendee, Event, EventStatus, EventTime, ResponseStatus, Transparency};

/// Private extended property that links a shadow to its source event
pub const ORIGIN_ID_KEY: &str = "originId";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<GoogleTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<GoogleTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<GoogleAttendee>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_properties: Option<ExtendedProperties>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAttendee {
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "self", skip_serializing_if = "std::ops::Not::not")]
    pub is_self: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleCalendar {
    pub id: String,
    #[serde(default)]
    pub summary: String,
}

pub trait FromGoogle<T> {
    fn from_google(value: T) -> Self;
}

impl FromGoogle<GoogleEvent> for Event {
    fn from_google(event: GoogleEvent) -> Self {
        let status = match event.status.as_deref() {
            Some("cancelled") => EventStatus::Cancelled,
            Some("tentative") => EventStatus::Tentative,
            _ => EventStatus::Confirmed,
        };

        let transparency = match event.transparency.as_deref() {
            Some("transparent") => Transparency::Transparent,
            _ => Transparency::Opaque,
        };

        let origin_id = event
            .extended_properties
            .and_then(|mut props| props.private.remove(ORIGIN_ID_KEY));

        Event {
            id: event.id,
            summary: event.summary.unwrap_or_default(),
            description: event.description,
            start: event.start.and_then(event_time),
            end: event.end.and_then(event_time),
            status,
            transparency,
            attendees: event
                .attendees
                .unwrap_or_default()
                .into_iter()
                .map(|a| Attendee {
                    email: a.email,
                    is_self: a.is_self,
                    response_status: a.response_status.as_deref().and_then(response_status),
                })
                .collect(),
            origin_id,
        }
    }
}

fn event_time(time: GoogleTime) -> Option<EventTime> {
    match (time.date_time, time.date) {
        (Some(dt), _) => Some(EventTime::DateTime(dt)),
        (None, Some(date)) => Some(EventTime::Date(date)),
        (None, None) => None,
    }
}

fn response_status(value: &str) -> Option<ResponseStatus> {
    match value {
        "accepted" => Some(ResponseStatus::Accepted),
        "declined" => Some(ResponseStatus::Declined),
        "tentative" => Some(ResponseStatus::Tentative),
        "needsAction" => Some(ResponseStatus::NeedsAction),
        _ => None,
    }
}

pub trait ToGoogle {
    fn to_google(&self) -> GoogleEvent;
}

impl ToGoogle for ShadowPayload {
    fn to_google(&self) -> GoogleEvent {
        let transparency = match self.transparency {
            Transparency::Opaque => "opaque",
            Transparency::Transparent => "transparent",
        };

        GoogleEvent {
            summary: Some(self.summary.clone()),
            description: Some(self.description.clone()),
            start: Some(GoogleTime {
                date_time: Some(self.start),
                date: None,
            }),
            end: Some(GoogleTime {
                date_time: Some(self.end),
                date: None,
            }),
            transparency: Some(transparency.to_string()),
            attendees: Some(
                self.attendees
                    .iter()
                    .map(|email| GoogleAttendee {
                        email: email.clone(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            extended_properties: Some(ExtendedProperties {
                private: BTreeMap::from([(ORIGIN_ID_KEY.to_string(), self.origin_id.clone())]),
            }),
            ..Default::default()
        }
    }
}
