//! Calendar event model and its iCalendar representation.
//!
//! Events are written as a single-`VEVENT` `VCALENDAR` with UTC timestamps (or
//! `VALUE=DATE` for all-day events) and read back from whatever shape a CalDAV
//! server returns: UTC, `TZID`-qualified, floating, or date-only values.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use ical::IcalParser;
use serde::Serialize;
use uuid::Uuid;

use crate::content_line;
use crate::error::{CalError, Result};
use crate::range::{localize_earliest, start_of_day};

const PRODID: &str = "-//justcal//EN";

/// A single calendar event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub uid: String,
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub description: Option<String>,
    pub location: Option<String>,
    /// RRULE text, written and read back verbatim.
    pub recurrence: Option<String>,
    pub all_day: bool,
}

impl Event {
    /// A fresh random UID.
    pub fn generate_uid() -> String {
        Uuid::new_v4().to_string()
    }

    /// Serialize as an iCalendar object with CRLF line endings.
    pub fn to_ical(&self) -> String {
        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            format!("PRODID:{PRODID}"),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", self.uid),
            format!("DTSTAMP:{}", utc_stamp(Utc::now())),
            format!("SUMMARY:{}", content_line::escape_text(&self.title)),
        ];

        if self.all_day {
            let start = self.start.date_naive();
            let mut end = self.end.date_naive();
            // DTEND is exclusive for dates.
            if end <= start {
                end = start + Duration::days(1);
            }
            lines.push(format!("DTSTART;VALUE=DATE:{}", start.format("%Y%m%d")));
            lines.push(format!("DTEND;VALUE=DATE:{}", end.format("%Y%m%d")));
        } else {
            lines.push(format!("DTSTART:{}", utc_stamp(self.start.with_timezone(&Utc))));
            lines.push(format!("DTEND:{}", utc_stamp(self.end.with_timezone(&Utc))));
        }

        if let Some(description) = &self.description {
            lines.push(format!("DESCRIPTION:{}", content_line::escape_text(description)));
        }
        if let Some(location) = &self.location {
            lines.push(format!("LOCATION:{}", content_line::escape_text(location)));
        }
        if let Some(rule) = &self.recurrence {
            lines.push(format!("RRULE:{rule}"));
        }

        lines.push("END:VEVENT".to_string());
        lines.push("END:VCALENDAR".to_string());

        let mut out = String::new();
        for line in &lines {
            out.push_str(&content_line::fold_line(line));
            out.push_str("\r\n");
        }
        out
    }

    /// Parse the first `VEVENT` of an iCalendar object. Floating times and
    /// unknown `TZID`s are interpreted in `tz`.
    ///
    /// # Errors
    /// Returns `CalError::Ical` when the data does not parse, has no `VEVENT`,
    /// no `DTSTART`, no way to determine the end, or an unreadable date value.
    pub fn from_ical(data: &str, tz: Tz) -> Result<Self> {
        let first = vevents(data)?
            .into_iter()
            .next()
            .ok_or_else(no_vevent)?;
        Self::from_vevent(&first, tz)
    }

    /// Parse every `VEVENT` of an iCalendar object (expanded recurrences come
    /// back as several instances in one object).
    ///
    /// # Errors
    /// Fails on the first malformed `VEVENT`, or when there is none.
    pub fn all_from_ical(data: &str, tz: Tz) -> Result<Vec<Self>> {
        let events = vevents(data)?;
        if events.is_empty() {
            return Err(no_vevent());
        }
        events
            .iter()
            .map(|vevent| Self::from_vevent(vevent, tz))
            .collect()
    }

    fn from_vevent(vevent: &IcalEvent, tz: Tz) -> Result<Self> {
        let find = |name: &str| {
            vevent
                .properties
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
        };
        let raw = |name: &str| find(name).and_then(|p| p.value.clone());
        let text = |name: &str| {
            raw(name)
                .map(|v| content_line::unescape_text(&v))
                .filter(|v| !v.is_empty())
        };

        let dtstart = find("DTSTART")
            .ok_or_else(|| CalError::Ical("Event missing required DTSTART field".to_string()))?;
        let (start, all_day) = parse_date_value(dtstart, tz)?;

        let end = match (find("DTEND"), raw("DURATION")) {
            (Some(dtend), _) => parse_date_value(dtend, tz)?.0,
            (None, Some(duration)) => start
                .checked_add_signed(parse_duration(&duration)?)
                .ok_or_else(|| CalError::Ical(format!("DURATION out of range: {duration}")))?,
            (None, None) if all_day => start + Duration::days(1),
            (None, None) => {
                return Err(CalError::Ical(
                    "Event missing required DTEND field".to_string(),
                ))
            }
        };

        Ok(Self {
            uid: raw("UID").unwrap_or_default(),
            title: text("SUMMARY").unwrap_or_default(),
            start,
            end,
            description: text("DESCRIPTION"),
            location: text("LOCATION"),
            recurrence: raw("RRULE").filter(|r| !r.is_empty()),
            all_day,
        })
    }
}

/// Every `VEVENT` of every `VCALENDAR` in `data`.
fn vevents(data: &str) -> Result<Vec<IcalEvent>> {
    let mut events = Vec::new();
    for calendar in IcalParser::new(data.as_bytes()) {
        let calendar =
            calendar.map_err(|e| CalError::Ical(format!("Unreadable iCalendar data: {e}")))?;
        events.extend(calendar.events);
    }
    Ok(events)
}

fn no_vevent() -> CalError {
    CalError::Ical("No VEVENT found in iCalendar data".to_string())
}

/// Parameter value by (case-insensitive) name, quotes removed.
fn param<'a>(prop: &'a Property, name: &str) -> Option<&'a str> {
    prop.params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|value| value.trim_matches('"'))
}

fn utc_stamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Read a DATE or DATE-TIME property; the flag is true for DATE values.
fn parse_date_value(prop: &Property, tz: Tz) -> Result<(DateTime<Tz>, bool)> {
    let value = prop.value.as_deref().unwrap_or_default().trim();
    let invalid = || CalError::Ical(format!("Invalid {} value: {}", prop.name, value));

    let is_date = param(prop, "VALUE")
        .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (value.len() == 8 && !value.contains('T'));
    if is_date {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid())?;
        return Ok((start_of_day(&tz, date), true));
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
        return Ok((naive.and_utc().with_timezone(&tz), false));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
    let zone = param(prop, "TZID")
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(tz);
    Ok((localize_earliest(&zone, naive).with_timezone(&tz), false))
}

/// Parse an RFC 5545 DURATION such as `PT1H30M`, `P1D` or `-P1W`.
fn parse_duration(value: &str) -> Result<Duration> {
    let invalid = || CalError::Ical(format!("Invalid DURATION value: {value}"));
    let trimmed = value.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let rest = rest.strip_prefix('P').ok_or_else(invalid)?;

    let mut total = Duration::zero();
    let mut digits = String::new();
    let mut in_time = false;
    for c in rest.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' => digits.push(c),
            unit => {
                let n: i64 = digits.parse().map_err(|_| invalid())?;
                digits.clear();
                total += match (unit, in_time) {
                    ('W', false) => Duration::try_weeks(n),
                    ('D', false) => Duration::try_days(n),
                    ('H', true) => Duration::try_hours(n),
                    ('M', true) => Duration::try_minutes(n),
                    ('S', true) => Duration::try_seconds(n),
                    _ => None,
                }
                .ok_or_else(invalid)?;
            }
        }
    }
    if !digits.is_empty() {
        return Err(invalid());
    }

    Ok(if negative { -total } else { total })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("PT1H30M").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("P1D").unwrap(), Duration::days(1));
        assert_eq!(parse_duration("P2W").unwrap(), Duration::weeks(2));
        assert_eq!(parse_duration("-PT15M").unwrap(), Duration::minutes(-15));
        assert!(parse_duration("1H").is_err());
        assert!(parse_duration("PT5").is_err());
    }
}
