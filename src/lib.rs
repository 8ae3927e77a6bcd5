//! Leave request approval workflow.
//!
//! A request moves Employee → Cell Manager (N1) → Service Chief (N2) → HR through
//! the state machine in [`machine`]. Submission is gated by the staffing rules
//! evaluated in [`conflict`]. [`service::LeaveService`] ties both to the sled
//! backed [`store::LeaveStore`].

pub mod config;
pub mod conflict;
pub mod directory;
pub mod error;
pub mod machine;
pub mod request;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

pub use config::{Config, FallbackPolicy};
pub use conflict::{ConflictEngine, ConflictKind, ConflictQuery, ConflictResult, ConflictRule, ServiceSubstitution};
pub use directory::{LeaveDirectory, MemoryDirectory, Profile};
pub use error::{ConflictError, DirectoryError, ValidationError, WorkflowError};
pub use machine::{Action, Actor, GuardContext, LeaveWorkflow, TransitionOutcome};
pub use request::{LeaveCategory, LeaveRequest, LeaveRequestDraft};
pub use service::LeaveService;
pub use types::{CalendarDay, DateRange, LeaveRequestEvent, LeaveRequestState, Role, Urgency};
