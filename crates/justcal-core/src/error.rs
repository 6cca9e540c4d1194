//! Error types for justcal-core operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalError {
    /// `field` names what was being parsed, e.g. "start date/time".
    #[error("Invalid {field}: {input}")]
    InvalidDate { field: String, input: String },

    #[error("Invalid recurrence pattern: {0}")]
    InvalidRecurrence(String),

    /// An explicitly supplied range whose start lies after its end.
    #[error("Range start ({from}) is after range end ({to})")]
    InvertedRange { from: String, to: String },

    #[error("{0}")]
    Validation(String),

    #[error("iCalendar error: {0}")]
    Ical(String),
}

pub type Result<T> = std::result::Result<T, CalError>;
