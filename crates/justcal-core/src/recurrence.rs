//! Recurrence phrase translation -- loose human phrasing into RFC 5545 RRULE text.
//!
//! The accepted input space is closed: a fixed keyword table, three prefixed
//! phrase shapes (`weekly on ...`, `monthly on the ...`, `every N ...`) and a raw
//! `FREQ=` passthrough. Each shape is an independent matcher returning
//! `Option<String>`; the first matcher to produce a rule wins. A rule is either
//! fully formed or `None`, never partial.
//!
//! ```rust
//! use justcal_core::translate;
//!
//! assert_eq!(
//!     translate(Some("weekly on Sundays and Tuesdays")).as_deref(),
//!     Some("FREQ=WEEKLY;BYDAY=SU,TU")
//! );
//! assert_eq!(
//!     translate(Some("monthly on the last Friday")).as_deref(),
//!     Some("FREQ=MONTHLY;BYDAY=FR;BYSETPOS=-1")
//! );
//! assert_eq!(translate(Some("every Tuesday maybe")), None);
//! assert_eq!(translate(None), None);
//! ```

/// Whole-phrase keywords and their rules.
const KEYWORDS: &[(&str, &str)] = &[
    ("daily", "FREQ=DAILY"),
    ("weekly", "FREQ=WEEKLY"),
    ("monthly", "FREQ=MONTHLY"),
    ("yearly", "FREQ=YEARLY"),
    ("weekdays", "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR"),
    ("weekends", "FREQ=WEEKLY;BYDAY=SA,SU"),
];

/// Day-name variants (full, plural, abbreviated) to two-letter BYDAY codes.
pub const WEEKDAYS: &[(&str, &str)] = &[
    ("monday", "MO"),
    ("mondays", "MO"),
    ("mon", "MO"),
    ("tuesday", "TU"),
    ("tuesdays", "TU"),
    ("tue", "TU"),
    ("tues", "TU"),
    ("wednesday", "WE"),
    ("wednesdays", "WE"),
    ("wed", "WE"),
    ("thursday", "TH"),
    ("thursdays", "TH"),
    ("thu", "TH"),
    ("thur", "TH"),
    ("thurs", "TH"),
    ("friday", "FR"),
    ("fridays", "FR"),
    ("fri", "FR"),
    ("saturday", "SA"),
    ("saturdays", "SA"),
    ("sat", "SA"),
    ("sunday", "SU"),
    ("sundays", "SU"),
    ("sun", "SU"),
];

/// Ordinal tokens to BYSETPOS values.
pub const ORDINALS: &[(&str, i8)] = &[
    ("1st", 1),
    ("first", 1),
    ("2nd", 2),
    ("second", 2),
    ("3rd", 3),
    ("third", 3),
    ("4th", 4),
    ("fourth", 4),
    ("5th", 5),
    ("fifth", 5),
    ("last", -1),
];

/// Interval units (singular) to FREQ values.
const UNITS: &[(&str, &str)] = &[
    ("day", "DAILY"),
    ("week", "WEEKLY"),
    ("month", "MONTHLY"),
    ("year", "YEARLY"),
];

const DAY_SUFFIXES: &[&str] = &["st", "nd", "rd", "th"];

type Matcher = fn(&str) -> Option<String>;

/// Phrase matchers in priority order. Each receives the trimmed, lowercased input.
const MATCHERS: &[Matcher] = &[
    match_keyword,
    match_weekly_on,
    match_monthly_on_the,
    match_every_interval,
];

/// Translate a recurrence phrase into RRULE text.
///
/// Returns `None` for absent, blank or unrecognized input. Input that already
/// starts with `FREQ=` (any case) is returned uppercased without further
/// validation.
pub fn translate(pattern: Option<&str>) -> Option<String> {
    let trimmed = pattern?.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_raw_rule(trimmed) {
        return Some(trimmed.to_uppercase());
    }

    let normalized = trimmed.to_lowercase();
    let rule = MATCHERS.iter().find_map(|matcher| matcher(&normalized));
    tracing::debug!(pattern = trimmed, rule = ?rule, "translated recurrence pattern");
    rule
}

/// Look up the BYDAY code for a day name (case-insensitive).
pub fn weekday_code(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    WEEKDAYS
        .iter()
        .find(|(variant, _)| *variant == name)
        .map(|(_, code)| *code)
}

/// Look up the BYSETPOS value for an ordinal token (case-insensitive).
pub fn ordinal_position(token: &str) -> Option<i8> {
    let token = token.trim().to_lowercase();
    ORDINALS
        .iter()
        .find(|(variant, _)| *variant == token)
        .map(|(_, pos)| *pos)
}

fn is_raw_rule(input: &str) -> bool {
    input
        .get(..5)
        .is_some_and(|head| head.eq_ignore_ascii_case("FREQ="))
}

fn match_keyword(input: &str) -> Option<String> {
    KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == input)
        .map(|(_, rule)| (*rule).to_string())
}

/// `weekly on <day>` or `weekly on <day> and <day>`, order preserved.
fn match_weekly_on(input: &str) -> Option<String> {
    let days = input.strip_prefix("weekly on ")?;
    let names: Vec<&str> = days.split(" and ").collect();
    if names.len() > 2 {
        return None;
    }

    let codes = names
        .into_iter()
        .map(weekday_code)
        .collect::<Option<Vec<_>>>()?;
    Some(format!("FREQ=WEEKLY;BYDAY={}", codes.join(",")))
}

/// `monthly on the <ordinal> <day>` or `monthly on the <day-of-month>`.
fn match_monthly_on_the(input: &str) -> Option<String> {
    let rest = input.strip_prefix("monthly on the ")?.trim();
    nth_weekday(rest).or_else(|| month_day(rest))
}

fn nth_weekday(rest: &str) -> Option<String> {
    let (ordinal, day) = rest.split_once(' ')?;
    let position = ordinal_position(ordinal)?;
    let code = weekday_code(day)?;
    Some(format!("FREQ=MONTHLY;BYDAY={code};BYSETPOS={position}"))
}

fn month_day(rest: &str) -> Option<String> {
    let digits = DAY_SUFFIXES
        .iter()
        .find_map(|suffix| rest.strip_suffix(suffix))
        .unwrap_or(rest);
    let day: u32 = digits.parse().ok()?;
    (1..=31)
        .contains(&day)
        .then(|| format!("FREQ=MONTHLY;BYMONTHDAY={day}"))
}

/// `every <n> <unit>[s]`; trailing words after the unit are ignored.
fn match_every_interval(input: &str) -> Option<String> {
    if !input.starts_with("every ") {
        return None;
    }

    let tokens: Vec<&str> = input.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }

    // A leading `+` is accepted, as for any integer.
    let interval: u32 = tokens[1].parse().ok().filter(|n| *n > 0)?;
    let unit = tokens[2].strip_suffix('s').unwrap_or(tokens[2]);
    let freq = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, freq)| *freq)?;
    Some(format!("FREQ={freq};INTERVAL={interval}"))
}
