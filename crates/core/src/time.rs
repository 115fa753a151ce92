//! Epoch-seconds display formatting for report fields.

use chrono::DateTime;

/// Format epoch seconds as `dd/MM/yyyy HH:mm:ss`, in UTC.
///
/// UTC is deliberate: reports are shared between operators in different
/// timezones, and pinning the wall clock keeps the same input producing
/// the same CSV on every machine.
///
/// Zero, negative, and out-of-range values render as an empty string —
/// absent timestamps become empty report fields, not errors.
pub fn format_epoch(secs: i64) -> String {
    if secs <= 0 {
        return String::new();
    }
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%d/%m/%Y %H:%M:%S").to_string(),
        None => String::new(),
    }
}
