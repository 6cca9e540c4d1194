//! Client-side event search.
//!
//! CalDAV text-match support varies between servers, so events are fetched for
//! a date range and filtered locally with a case-insensitive substring match.

use std::fmt;
use std::str::FromStr;

use crate::error::CalError;
use crate::event::Event;

/// Which event field(s) a query is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchField {
    Title,
    Description,
    Location,
    #[default]
    All,
}

impl SearchField {
    pub const ALL: [SearchField; 4] = [
        SearchField::Title,
        SearchField::Description,
        SearchField::Location,
        SearchField::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Description => "description",
            SearchField::Location => "location",
            SearchField::All => "all",
        }
    }

    /// Whether `event` contains the already-lowercased `query` in this field.
    pub fn matches(self, event: &Event, query_lower: &str) -> bool {
        let contains = |value: Option<&str>| {
            value.is_some_and(|v| v.to_lowercase().contains(query_lower))
        };
        let title = || contains(Some(event.title.as_str()));
        let description = || contains(event.description.as_deref());
        let location = || contains(event.location.as_deref());

        match self {
            SearchField::Title => title(),
            SearchField::Description => description(),
            SearchField::Location => location(),
            SearchField::All => title() || description() || location(),
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchField {
    type Err = CalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        SearchField::ALL
            .into_iter()
            .find(|field| field.as_str() == lower)
            .ok_or_else(|| {
                CalError::Validation(format!(
                    "Unknown search field '{s}'. Expected one of: title, description, location, all"
                ))
            })
    }
}

/// Keep the events matching `query` in `field`, preserving order.
pub fn filter_events(events: Vec<Event>, query: &str, field: SearchField) -> Vec<Event> {
    let query_lower = query.to_lowercase();
    events
        .into_iter()
        .filter(|event| field.matches(event, &query_lower))
        .collect()
}
