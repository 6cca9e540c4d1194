//! Date range resolution -- filling missing bounds of a user query.
//!
//! The resolver takes up to two already-parsed bounds and a reference "now" and
//! produces a concrete `[from, to]` interval. The policy decides how gaps are
//! filled: `list` looks a short, day-aligned distance ahead, `search` casts a
//! wide net around now.
//!
//! Resolution never fails and never reorders explicit bounds. An inverted
//! explicit range is returned as given; see [`crate::validate::check_range`].
//! Bounds that would leave the representable time span saturate at its limits.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Forward/backward horizon used by `search` when only one bound is given.
pub const SEARCH_HORIZON_DAYS: i64 = 365 * 10;

/// Half-width of the window centered on now used by `search` without bounds.
pub const SEARCH_WINDOW_DAYS: i64 = 365;

/// Default `list` window length.
pub const LIST_DAYS: i64 = 7;

/// How to build a range when neither bound is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultWindow {
    /// `(now - d, now + d)`.
    Symmetric(Duration),
    /// From the start of today (local) to the last instant of the day `days`
    /// after today.
    DayAligned { days: i64 },
}

/// Gap-filling policy for [`resolve_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePolicy {
    /// Distance used to synthesize a missing bound from a present one.
    pub horizon: Duration,
    /// Window used when both bounds are missing.
    pub default_window: DefaultWindow,
}

impl RangePolicy {
    /// Short, forward-looking glance: `days`-long horizon, day-aligned default.
    pub fn list(days: i64) -> Self {
        let saturated = if days < 0 { Duration::MIN } else { Duration::MAX };
        Self {
            horizon: Duration::try_days(days).unwrap_or(saturated),
            default_window: DefaultWindow::DayAligned { days },
        }
    }

    /// Broad net: ten-year horizon, one year either side of now by default.
    pub fn search() -> Self {
        Self {
            horizon: Duration::days(SEARCH_HORIZON_DAYS),
            default_window: DefaultWindow::Symmetric(Duration::days(SEARCH_WINDOW_DAYS)),
        }
    }
}

impl Default for RangePolicy {
    fn default() -> Self {
        Self::list(LIST_DAYS)
    }
}

/// A resolved query interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Tz>,
    pub to: DateTime<Tz>,
}

impl DateRange {
    /// True when the start lies after the end.
    pub fn is_inverted(&self) -> bool {
        self.from > self.to
    }
}

/// Resolve optional bounds into a concrete range.
///
/// 1. Both given: returned unchanged.
/// 2. Only `from`: `to = from + horizon`.
/// 3. Only `to`: `from = to - horizon`.
/// 4. Neither: the policy's default window around `now`, with day boundaries
///    computed in `now`'s timezone.
pub fn resolve_range(
    from: Option<DateTime<Tz>>,
    to: Option<DateTime<Tz>>,
    now: DateTime<Tz>,
    policy: &RangePolicy,
) -> DateRange {
    let range = match (from, to) {
        (Some(from), Some(to)) => DateRange { from, to },
        (Some(from), None) => DateRange {
            from,
            to: advance(from, policy.horizon),
        },
        (None, Some(to)) => DateRange {
            from: advance(to, -policy.horizon),
            to,
        },
        (None, None) => default_window(now, policy.default_window),
    };
    tracing::debug!(from = %range.from, to = %range.to, "resolved date range");
    range
}

fn default_window(now: DateTime<Tz>, window: DefaultWindow) -> DateRange {
    match window {
        DefaultWindow::Symmetric(width) => DateRange {
            from: advance(now, -width),
            to: advance(now, width),
        },
        DefaultWindow::DayAligned { days } => {
            let tz = now.timezone();
            let today = now.date_naive();
            let to = Duration::try_days(days)
                .and_then(|span| today.checked_add_signed(span))
                .map(|last_day| end_of_day(&tz, last_day))
                .unwrap_or_else(|| time_limit(&tz, days >= 0));
            DateRange {
                from: start_of_day(&tz, today),
                to,
            }
        }
    }
}

/// `dt + by`, saturating at the first or last representable instant.
fn advance(dt: DateTime<Tz>, by: Duration) -> DateTime<Tz> {
    dt.checked_add_signed(by)
        .unwrap_or_else(|| time_limit(&dt.timezone(), by >= Duration::zero()))
}

/// The last (or first) representable instant, seen from `tz`.
pub fn time_limit(tz: &Tz, latest: bool) -> DateTime<Tz> {
    let utc = if latest {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    };
    utc.with_timezone(tz)
}

/// First instant of `date` in `tz`.
pub fn start_of_day(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    localize_earliest(tz, date.and_time(NaiveTime::MIN))
}

/// Last representable instant (23:59:59.999999) of `date` in `tz`.
pub fn end_of_day(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let last = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
    localize_latest(tz, date.and_time(last))
}

/// Map a wall-clock time to an instant, taking the earlier offset when the
/// time is ambiguous and the first valid instant after a DST gap.
pub fn localize_earliest(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(&local)
        .earliest()
        .unwrap_or_else(|| after_gap(tz, local))
}

/// Like [`localize_earliest`] but taking the later offset when ambiguous.
pub fn localize_latest(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(&local)
        .latest()
        .unwrap_or_else(|| after_gap(tz, local))
}

// Gaps never exceed a few hours; walk forward a minute at a time.
fn after_gap(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    (1..=24 * 60)
        .find_map(|minutes| {
            let shifted = local.checked_add_signed(Duration::minutes(minutes))?;
            tz.from_local_datetime(&shifted).earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn gap_resolves_to_first_valid_minute() {
        // 2026-03-08 02:30 does not exist in New York.
        let tz: Tz = "America/New_York".parse().unwrap();
        let local = NaiveDate::from_ymd_opt(2026, 3, 8)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let resolved = localize_earliest(&tz, local);
        assert_eq!(resolved.hour(), 3);
        assert_eq!(resolved.minute(), 0);
    }

    #[test]
    fn end_of_day_uses_microsecond_precision() {
        let tz: Tz = "UTC".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = end_of_day(&tz, date);
        assert_eq!(end.nanosecond(), 999_999_000);
    }
}
