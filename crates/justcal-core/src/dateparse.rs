//! Natural-language date/time parsing.
//!
//! Resolves the date expressions a user types on the command line into
//! timezone-aware instants:
//! - Absolute: `2026-01-20T14:00:00-05:00`, `2026-01-20 14:00`, `2026-01-20`
//! - Relative words: `now`, `today`, `tomorrow`, `yesterday`
//! - Offsets: `in 2 days`, `3 weeks ago`, `in an hour`
//! - Periods: `next week`, `last month`, `next year`
//! - Weekdays: `friday`, `next monday`, `last tue`
//! - Month + day: `jan 20`, `january 20 2027`, `march 15th`
//! - Any of the above followed by a time: `tomorrow at 3pm`, `jan 20 15:30`
//!
//! Named days (dates, weekdays, month + day) start at midnight; relative words
//! keep the reference time of day unless a time is given.

use std::sync::OnceLock;

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday,
};
use chrono_tz::Tz;
use regex::Regex;

use crate::range::localize_earliest;
use crate::recurrence::weekday_code;

/// Turns a user-supplied string into an instant, or `None` if it cannot.
pub trait DateParser {
    fn parse(&self, input: &str) -> Option<DateTime<Tz>>;
}

const MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("january", 1),
    ("feb", 2),
    ("february", 2),
    ("mar", 3),
    ("march", 3),
    ("apr", 4),
    ("april", 4),
    ("may", 5),
    ("jun", 6),
    ("june", 6),
    ("jul", 7),
    ("july", 7),
    ("aug", 8),
    ("august", 8),
    ("sep", 9),
    ("sept", 9),
    ("september", 9),
    ("oct", 10),
    ("october", 10),
    ("nov", 11),
    ("november", 11),
    ("dec", 12),
    ("december", 12),
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn from_word(word: &str) -> Option<Self> {
        match word.strip_suffix('s').unwrap_or(word) {
            "minute" | "min" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

struct Patterns {
    trailing_time: Regex,
    offset_in: Regex,
    offset_ago: Regex,
    period: Regex,
    weekday: Regex,
    month_day: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::new)
}

impl Patterns {
    fn new() -> Self {
        let compile = |re: &str| Regex::new(re).expect("date pattern must compile");
        Self {
            // "<day phrase> at 3pm", "<day phrase> 15:30", "3:30 pm"
            trailing_time: compile(
                r"^(?:(?P<day>.*?)\s+)??(?:at\s+)?(?P<hour>\d{1,2})(?::(?P<min>\d{2}))?\s*(?P<ampm>am|pm)?$",
            ),
            // "in 2 days", "in an hour"
            offset_in: compile(r"^in\s+(?P<n>\d+|an?|one)\s+(?P<unit>[a-z]+)$"),
            // "3 weeks ago", "a month ago"
            offset_ago: compile(r"^(?P<n>\d+|an?|one)\s+(?P<unit>[a-z]+)\s+ago$"),
            // "next week", "last year"
            period: compile(r"^(?P<dir>next|last)\s+(?P<unit>week|month|year)$"),
            // "friday", "next monday", "this wed"
            weekday: compile(r"^(?:(?P<dir>next|last|this)\s+)?(?P<name>[a-z]+)$"),
            // "jan 20", "march 15th, 2027"
            month_day: compile(
                r"^(?P<month>[a-z]+)\s+(?P<day>\d{1,2})(?:st|nd|rd|th)?(?:,?\s+(?P<year>\d{4}))?$",
            ),
        }
    }
}

/// Phrase-shape date parser anchored at a reference instant.
#[derive(Debug, Clone)]
pub struct NaturalDateParser {
    tz: Tz,
    now: DateTime<Tz>,
    prefer_future: bool,
}

impl NaturalDateParser {
    /// Parser for `tz` anchored at the current time, preferring future dates.
    pub fn new(tz: Tz) -> Self {
        Self::with_now(Utc::now().with_timezone(&tz))
    }

    /// Parser anchored at a fixed reference instant (its zone is used for
    /// all local computations).
    pub fn with_now(now: DateTime<Tz>) -> Self {
        Self {
            tz: now.timezone(),
            now,
            prefer_future: true,
        }
    }

    /// Whether bare weekdays and yearless dates resolve forward (default) or back.
    pub fn prefer_future(mut self, prefer_future: bool) -> Self {
        self.prefer_future = prefer_future;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    fn absolute(&self, input: &str) -> Option<DateTime<Tz>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(dt.with_timezone(&self.tz));
        }
        if let Some(naive) = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        {
            return Some(self.local(naive));
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .map(|date| self.midnight(date))
    }

    fn day_phrase(&self, phrase: &str) -> Option<DateTime<Tz>> {
        match phrase {
            "now" | "today" => return Some(self.now),
            "tomorrow" => return self.shift(1, Unit::Day),
            "yesterday" => return self.shift(-1, Unit::Day),
            _ => {}
        }

        if let Some(date) = self.absolute(phrase) {
            return Some(date);
        }

        let p = patterns();
        if let Some(caps) = p.offset_in.captures(phrase) {
            let unit = Unit::from_word(&caps["unit"])?;
            return self.shift(count(&caps["n"])?, unit);
        }
        if let Some(caps) = p.offset_ago.captures(phrase) {
            let unit = Unit::from_word(&caps["unit"])?;
            return self.shift(-count(&caps["n"])?, unit);
        }
        if let Some(caps) = p.period.captures(phrase) {
            let unit = Unit::from_word(&caps["unit"])?;
            let n = if &caps["dir"] == "next" { 1 } else { -1 };
            return self.shift(n, unit);
        }
        if let Some(caps) = p.weekday.captures(phrase) {
            if let Some(target) = weekday_from_name(&caps["name"]) {
                let dir = caps.name("dir").map(|m| m.as_str());
                return Some(self.midnight(self.weekday_date(target, dir)));
            }
        }
        if let Some(caps) = p.month_day.captures(phrase) {
            let month = month_number(&caps["month"])?;
            let day: u32 = caps["day"].parse().ok()?;
            let year = caps.name("year").and_then(|m| m.as_str().parse().ok());
            return self.month_day(month, day, year).map(|d| self.midnight(d));
        }

        None
    }

    fn shift(&self, n: i64, unit: Unit) -> Option<DateTime<Tz>> {
        match unit {
            Unit::Minute => self.now.checked_add_signed(Duration::try_minutes(n)?),
            Unit::Hour => self.now.checked_add_signed(Duration::try_hours(n)?),
            // Calendar units move the wall clock, not the instant.
            Unit::Day => self.shift_local(|t| t.checked_add_signed(Duration::try_days(n)?)),
            Unit::Week => self.shift_local(|t| t.checked_add_signed(Duration::try_weeks(n)?)),
            Unit::Month => self.shift_local(|t| add_months(t, n)),
            Unit::Year => self.shift_local(|t| add_months(t, n.checked_mul(12)?)),
        }
    }

    fn shift_local(
        &self,
        f: impl FnOnce(NaiveDateTime) -> Option<NaiveDateTime>,
    ) -> Option<DateTime<Tz>> {
        f(self.now.naive_local()).map(|t| self.local(t))
    }

    fn weekday_date(&self, target: Weekday, dir: Option<&str>) -> NaiveDate {
        let today = self.now.date_naive();
        let ahead = i64::from(
            (target.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7,
        );
        let behind = (7 - ahead) % 7;
        let offset = match dir {
            Some("next") if ahead == 0 => 7,
            Some("next") => ahead,
            Some("last") if behind == 0 => -7,
            Some("last") => -behind,
            _ if self.prefer_future => ahead,
            _ => -behind,
        };
        today + Duration::days(offset)
    }

    fn month_day(&self, month: u32, day: u32, year: Option<i32>) -> Option<NaiveDate> {
        if let Some(year) = year {
            return NaiveDate::from_ymd_opt(year, month, day);
        }
        let today = self.now.date_naive();
        let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
        match this_year {
            Some(date) if self.prefer_future && date < today => {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            }
            Some(date) => Some(date),
            // Feb 29 outside a leap year: look for the nearest year that has one.
            None if self.prefer_future => (1..=4)
                .find_map(|n| NaiveDate::from_ymd_opt(today.year() + n, month, day)),
            None => (1..=4).find_map(|n| NaiveDate::from_ymd_opt(today.year() - n, month, day)),
        }
    }

    fn local(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        localize_earliest(&self.tz, naive)
    }

    fn midnight(&self, date: NaiveDate) -> DateTime<Tz> {
        self.local(date.and_time(NaiveTime::MIN))
    }
}

impl DateParser for NaturalDateParser {
    fn parse(&self, input: &str) -> Option<DateTime<Tz>> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        // Absolute forms are case-sensitive ("T" separator, offsets).
        if let Some(dt) = self.absolute(trimmed) {
            return Some(dt);
        }

        let lower = trimmed.to_lowercase();
        let phrase = lower.split_whitespace().collect::<Vec<_>>().join(" ");
        let resolved = match split_trailing_time(&phrase) {
            Some((day, time)) => {
                let base = match day {
                    Some(day) => self.day_phrase(day)?,
                    None => self.now,
                };
                Some(self.local(base.date_naive().and_time(time)))
            }
            None => self.day_phrase(&phrase),
        };
        tracing::debug!(input = trimmed, resolved = ?resolved, "parsed date expression");
        resolved
    }
}

/// Split `"<day phrase> [at] <time>"` into its parts. Only shapes with minutes
/// or an am/pm marker count as a time, so `jan 20` stays a date.
fn split_trailing_time(phrase: &str) -> Option<(Option<&str>, NaiveTime)> {
    let caps = patterns().trailing_time.captures(phrase)?;
    let minute = caps.name("min");
    let ampm = caps.name("ampm").map(|m| m.as_str());
    if minute.is_none() && ampm.is_none() {
        return None;
    }

    let mut hour: u32 = caps["hour"].parse().ok()?;
    let minute: u32 = minute.map_or(Some(0), |m| m.as_str().parse().ok())?;
    match ampm {
        Some(marker) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            hour %= 12;
            if marker == "pm" {
                hour += 12;
            }
        }
        None if hour > 23 => return None,
        None => {}
    }

    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let day = caps.name("day").map(|m| m.as_str());
    Some((day, time))
}

fn count(token: &str) -> Option<i64> {
    match token {
        "a" | "an" | "one" => Some(1),
        digits => digits.parse().ok(),
    }
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match weekday_code(name)? {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(variant, _)| *variant == name)
        .map(|(_, number)| *number)
}

fn add_months(t: NaiveDateTime, n: i64) -> Option<NaiveDateTime> {
    let months = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
    if n >= 0 {
        t.checked_add_months(months)
    } else {
        t.checked_sub_months(months)
    }
}
