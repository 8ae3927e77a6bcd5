use crate::types::{CalendarDay, LeaveRequestEvent, LeaveRequestState};

/// Failures raised by the approval state machine. The request is untouched when either is returned.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid transition: {event} from state {state}")]
    InvalidTransition {
        state: LeaveRequestState,
        event: LeaveRequestEvent,
    },
    #[error("Guard failed: {0}")]
    GuardViolation(&'static str),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Leave request has no requester")]
    MissingRequester,
    #[error("Leave request has no leave category")]
    MissingCategory,
    #[error("Leave request is missing its {0} date")]
    MissingDate(&'static str),
    #[error("{year:04}-{month:02}-{day:02} is not a calendar date")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("Start date {start} is after end date {end}")]
    InvertedDateRange { start: CalendarDay, end: CalendarDay },
    #[error("Date range contains no working day")]
    NoWorkingDays,
    #[error("{days} days requested exceeds the {category} maximum of {max_days}")]
    ExceedsCategoryLimit {
        category: String,
        days: u32,
        max_days: u32,
    },
    #[error("Unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}

/// Failures of the data source behind [`crate::directory::LeaveDirectory`].
#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
    #[error("No {kind} with id {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Failed to decode stored {kind}: {reason}")]
    Codec { kind: &'static str, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ConflictError {
    #[error("Conflict data unavailable: {0}")]
    DataUnavailable(#[from] DirectoryError),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}
