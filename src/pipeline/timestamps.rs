//! Key normalization and display-timestamp arithmetic.
//!
//! Every timestamp the system writes uses one display format with no
//! seconds and no zone suffix. The zone is a process-wide setting; records
//! never carry their own.

use chrono::{DateTime, Days, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::LifecycleError;

/// Cell format for `sent_at`, `followup_due_at`, `followup_completed_at`.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Normalize an email into the natural key (trim + lowercase).
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Mask an address for log output: `jan@example.com` → `j***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

/// Render an instant in the reference zone using [`DISPLAY_FORMAT`].
pub fn format_display(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format(DISPLAY_FORMAT).to_string()
}

/// Parse a display-format cell into a local wall-clock time.
pub fn parse_display(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), DISPLAY_FORMAT).ok()
}

/// `sent_at + window_days`, computed on the local calendar.
///
/// Adding whole days to the wall-clock time keeps the due time at the same
/// hour and minute across DST changes.
pub fn followup_due(sent_at: &str, window_days: u32) -> Result<String, LifecycleError> {
    let sent = parse_display(sent_at).ok_or_else(|| LifecycleError::Timestamp {
        value: sent_at.to_string(),
        reason: format!("expected format {DISPLAY_FORMAT}"),
    })?;
    let due = sent
        .checked_add_days(Days::new(u64::from(window_days)))
        .ok_or_else(|| LifecycleError::Timestamp {
            value: sent_at.to_string(),
            reason: format!("adding {window_days} days overflows"),
        })?;
    Ok(due.format(DISPLAY_FORMAT).to_string())
}

/// Resolve a local wall-clock time in `tz` to an instant.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times that
/// do not exist (clocks going forward) move one hour later.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&local).earliest().or_else(|| {
        let shifted = local.checked_add_signed(TimeDelta::hours(1))?;
        tz.from_local_datetime(&shifted).earliest()
    })
}

/// Whether a display-format deadline has passed at `now`.
///
/// Unparseable deadlines are never due.
pub fn deadline_passed(due_at: &str, now: DateTime<Utc>, tz: Tz) -> bool {
    parse_display(due_at)
        .and_then(|local| resolve_local(tz, local))
        .is_some_and(|due| now >= due.with_timezone(&Utc))
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
