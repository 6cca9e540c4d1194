//! # justcal-core
//!
//! The pure logic behind the `justcal` calendar CLI: everything that turns
//! loose human input into precise calendar values, with no network or
//! filesystem access.
//!
//! ## Modules
//!
//! - [`recurrence`] — recurrence phrase → RRULE text (`"3rd Wednesday"` → `BYSETPOS=3`)
//! - [`range`] — optional `--from`/`--to` bounds → concrete query interval
//! - [`dateparse`] — natural-language date expressions → timezone-aware instants
//! - [`event`] — event model and iCalendar encode/decode
//! - [`content_line`] — RFC 5545 line folding and TEXT escaping for output
//! - [`search`] — client-side event filtering
//! - [`validate`] — argument validation
//! - [`error`] — Error types

pub mod content_line;
pub mod dateparse;
pub mod error;
pub mod event;
pub mod range;
pub mod recurrence;
pub mod search;
pub mod validate;

pub use dateparse::{DateParser, NaturalDateParser};
pub use error::CalError;
pub use event::Event;
pub use range::{resolve_range, DateRange, DefaultWindow, RangePolicy};
pub use recurrence::translate;
pub use search::{filter_events, SearchField};
