//! Decides which source events are eligible for mirroring based on the
//! owner's own RSVP.

use crate::event::{Event, ResponseStatus};

/// Whether `event` should have a shadow, given the owner's response.
///
/// Events without a self-attendee entry (including events with no attendees
/// at all) are always mirrored. Declined events never are. Tentative or
/// unanswered invitations are mirrored unless `accepted_only` is set.
pub fn should_mirror(event: &Event, accepted_only: bool) -> bool {
    let Some(me) = event.self_attendee() else {
        return true;
    };

    match me.response_status {
        Some(ResponseStatus::Declined) => false,
        Some(ResponseStatus::Accepted) => true,
        Some(ResponseStatus::Tentative) | Some(ResponseStatus::NeedsAction) | None => {
            !accepted_only
        }
    }
}

/// Whether `event` belongs in the live mirror set: timed, not cancelled and
/// accepted by the response filter.
pub fn is_live(event: &Event, accepted_only: bool) -> bool {
    event.time_window().is_some() && !event.is_cancelled() && should_mirror(event, accepted_only)
}
