//! Table and JSON rendering of event lists.

use justcal_core::Event;

const UID_WIDTH: usize = 12;
const MIN_TITLE_WIDTH: usize = 5;
const MAX_TITLE_WIDTH: usize = 40;
const LOCATION_WIDTH: usize = 20;
const TIME_WIDTH: usize = 20;

/// Column layout for [`render_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One consolidated WHEN column (`list`).
    When,
    /// Separate START and END columns (`search`).
    StartEnd,
}

/// Pretty-printed JSON array.
pub fn render_json(events: &[Event]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(events)
}

/// Human-readable span of an event.
///
/// - all-day: `Sat, 2026-01-10 - Mon, 2026-01-12`
/// - same day: `Sun, 2026-01-11 7:00 PM - 8:00 PM`
/// - multi-day: `Sat, 2026-01-10 7:00 PM - Mon, 2026-01-12 9:00 AM`
pub fn format_when(event: &Event) -> String {
    const DAY: &str = "%a, %Y-%m-%d";
    const TIME: &str = "%-I:%M %p";

    if event.all_day {
        return format!("{} - {}", event.start.format(DAY), event.end.format(DAY));
    }
    if event.start.date_naive() == event.end.date_naive() {
        return format!(
            "{} {} - {}",
            event.start.format(DAY),
            event.start.format(TIME),
            event.end.format(TIME)
        );
    }
    format!(
        "{} {} - {} {}",
        event.start.format(DAY),
        event.start.format(TIME),
        event.end.format(DAY),
        event.end.format(TIME)
    )
}

/// Fixed-width table with a total line, or `No events found.`.
pub fn render_table(events: &[Event], layout: Layout) -> String {
    if events.is_empty() {
        return "No events found.".to_string();
    }

    let title_width = events
        .iter()
        .map(|e| e.title.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(MIN_TITLE_WIDTH, MAX_TITLE_WIDTH);

    let mut lines = Vec::with_capacity(events.len() + 4);
    match layout {
        Layout::When => {
            let whens: Vec<String> = events.iter().map(format_when).collect();
            let when_width = whens.iter().map(|w| w.chars().count()).max().unwrap_or(0).max(4);
            lines.push(format!(
                "{:<UID_WIDTH$} {:<title_width$} {:<when_width$} {:<LOCATION_WIDTH$}",
                "UID", "TITLE", "WHEN", "LOCATION"
            ));
            lines.push("-".repeat(UID_WIDTH + title_width + when_width + LOCATION_WIDTH + 15));
            for (event, when) in events.iter().zip(&whens) {
                lines.push(format!(
                    "{:<UID_WIDTH$} {:<title_width$} {:<when_width$} {:<LOCATION_WIDTH$}",
                    truncate(&event.uid, UID_WIDTH),
                    truncate(&event.title, title_width),
                    when,
                    truncate(event.location.as_deref().unwrap_or(""), LOCATION_WIDTH),
                ));
            }
        }
        Layout::StartEnd => {
            lines.push(format!(
                "{:<UID_WIDTH$} {:<title_width$} {:<TIME_WIDTH$} {:<TIME_WIDTH$} {:<LOCATION_WIDTH$}",
                "UID", "TITLE", "START", "END", "LOCATION"
            ));
            lines.push("-".repeat(UID_WIDTH + title_width + 2 * TIME_WIDTH + LOCATION_WIDTH + 5));
            for event in events {
                let format = if event.all_day { "%Y-%m-%d" } else { "%Y-%m-%d %H:%M" };
                lines.push(format!(
                    "{:<UID_WIDTH$} {:<title_width$} {:<TIME_WIDTH$} {:<TIME_WIDTH$} {:<LOCATION_WIDTH$}",
                    truncate(&event.uid, UID_WIDTH),
                    truncate(&event.title, title_width),
                    event.start.format(format).to_string(),
                    event.end.format(format).to_string(),
                    truncate(event.location.as_deref().unwrap_or(""), LOCATION_WIDTH),
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!("Total: {} event(s)", events.len()));
    lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(value: &str, width: usize) -> &str {
    match value.char_indices().nth(width) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn event(title: &str, start: (u32, u32, u32), end: (u32, u32, u32), all_day: bool) -> Event {
        let tz: Tz = "America/New_York".parse().unwrap();
        let at = |(d, h, m): (u32, u32, u32)| tz.with_ymd_and_hms(2026, 1, d, h, m, 0).unwrap();
        Event {
            uid: "0123456789abcdef".to_string(),
            title: title.to_string(),
            start: at(start),
            end: at(end),
            description: None,
            location: Some("Conference Room Alpha West".to_string()),
            recurrence: None,
            all_day,
        }
    }

    #[test]
    fn test_when_all_day() {
        let e = event("Trip", (10, 0, 0), (12, 0, 0), true);
        assert_eq!(format_when(&e), "Sat, 2026-01-10 - Mon, 2026-01-12");
    }

    #[test]
    fn test_when_same_day() {
        let e = event("Dinner", (11, 19, 0), (11, 20, 0), false);
        assert_eq!(format_when(&e), "Sun, 2026-01-11 7:00 PM - 8:00 PM");
    }

    #[test]
    fn test_when_multi_day() {
        let e = event("Offsite", (10, 19, 0), (12, 9, 0), false);
        assert_eq!(format_when(&e), "Sat, 2026-01-10 7:00 PM - Mon, 2026-01-12 9:00 AM");
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(render_table(&[], Layout::When), "No events found.");
        assert_eq!(render_table(&[], Layout::StartEnd), "No events found.");
    }

    #[test]
    fn test_when_table_columns() {
        let events = vec![event("Dinner", (11, 19, 0), (11, 20, 0), false)];
        let table = render_table(&events, Layout::When);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("UID          TITLE  WHEN"));
        assert!(lines[1].chars().all(|c| c == '-'));
        assert!(lines[2].starts_with("0123456789ab Dinner Sun, 2026-01-11 7:00 PM - 8:00 PM"));
        assert!(lines[2].ends_with("Conference Room Alph"));
        assert_eq!(lines.last(), Some(&"Total: 1 event(s)"));
    }

    #[test]
    fn test_start_end_table() {
        let events = vec![
            event("Dinner", (11, 19, 0), (11, 20, 0), false),
            event("Trip", (10, 0, 0), (12, 0, 0), true),
        ];
        let table = render_table(&events, Layout::StartEnd);
        assert!(table.contains("START"));
        assert!(table.contains("2026-01-11 19:00"));
        assert!(table.contains("2026-01-10           2026-01-12"));
        assert!(table.ends_with("Total: 2 event(s)"));
    }

    #[test]
    fn test_title_width_clamped() {
        let long = "x".repeat(60);
        let events = vec![event(&long, (11, 19, 0), (11, 20, 0), false)];
        let table = render_table(&events, Layout::When);
        let row = table.lines().nth(2).unwrap();
        assert!(row.contains(&"x".repeat(40)));
        assert!(!row.contains(&"x".repeat(41)));

        let events = vec![event("Gym", (11, 19, 0), (11, 20, 0), false)];
        let table = render_table(&events, Layout::When);
        assert!(table.lines().nth(2).unwrap().starts_with("0123456789ab Gym   Sun"));
    }

    #[test]
    fn test_truncate_respects_chars() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 12), "short");
    }

    #[test]
    fn test_json_fields() {
        let events = vec![event("Dinner", (11, 19, 0), (11, 20, 0), false)];
        let json: serde_json::Value = serde_json::from_str(&render_json(&events).unwrap()).unwrap();
        let first = &json[0];
        assert_eq!(first["title"], "Dinner");
        assert_eq!(first["start"], "2026-01-11T19:00:00-05:00");
        assert_eq!(first["all_day"], false);
        assert!(first["recurrence"].is_null());
    }
}
