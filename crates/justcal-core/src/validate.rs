//! Input validation for command arguments.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::error::{CalError, Result};
use crate::range::DateRange;

/// Reject a missing or whitespace-only value.
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CalError::Validation(format!("{field_name} cannot be empty")));
    }
    Ok(())
}

/// Reject an event whose end lies before its start.
pub fn validate_date_range(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Result<()> {
    if end < start {
        return Err(CalError::Validation(format!(
            "End date ({end}) cannot be before start date ({start})"
        )));
    }
    Ok(())
}

/// Decide what to do with an inverted query range.
///
/// Bounds are never swapped: the caller's intent is ambiguous. In strict mode
/// the range is rejected; otherwise a warning is logged and the range is
/// passed on unchanged (the server will find nothing in it).
pub fn check_range(range: &DateRange, strict: bool) -> Result<()> {
    if !range.is_inverted() {
        return Ok(());
    }
    if strict {
        return Err(CalError::InvertedRange {
            from: range.from.to_rfc3339(),
            to: range.to.to_rfc3339(),
        });
    }
    tracing::warn!(
        from = %range.from,
        to = %range.to,
        "range start is after range end; no events will match"
    );
    Ok(())
}
