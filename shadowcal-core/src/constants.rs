/// Length of the mirrored window, counted forward from now.
pub const SYNC_DAYS: i64 = 365;

/// Ceiling on the cumulative backoff of a single backend call.
pub const BACKOFF_CEILING_SECS: u64 = 130;

/// Suffix appended to copied summaries when full details are shown.
pub const SHADOW_SUMMARY_SUFFIX: &str = " (shadow)";

/// Summary used when event details are hidden.
pub const PLACEHOLDER_SUMMARY: &str = "Busy";

/// Description used when event details are hidden.
pub const PLACEHOLDER_DESCRIPTION: &str = "Blocked on another calendar";

/// Alias providers resolve to the account's main calendar.
pub const PRIMARY_CALENDAR_ALIAS: &str = "primary";
