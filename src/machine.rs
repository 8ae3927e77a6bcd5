//! Approval state machine for leave requests
//!
//! The transition table is the single source of truth: one row per
//! `(state, event)` pair, each gated by guard predicates and carrying the list
//! of side effects the caller is expected to dispatch. Nothing in this module
//! performs I/O; [`LeaveWorkflow::transition`] only records history and returns
//! the declared [`Action`]s.
use super::error::WorkflowError;
use super::types::{CalendarDay, LeaveRequestEvent, LeaveRequestState, Role, TimeStamp, Urgency};
use chrono::Utc;
use std::fmt;
use tracing::{debug, info, warn};

use LeaveRequestEvent as Event;
use LeaveRequestState as State;

/// Side effects a transition asks its caller to carry out.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    #[n(0)]
    UpdateStatus,
    #[n(1)]
    NotifyNextApprover,
    #[n(2)]
    NotifyEmployee,
    #[n(3)]
    NotifyHr,
    #[n(4)]
    LogTransition,
    #[n(5)]
    LogApproval,
    #[n(6)]
    LogRejection,
    #[n(7)]
    UpdateApprovalMetadata,
    #[n(8)]
    AdjustLeaveBalance,
    #[n(9)]
    CheckConflict,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::UpdateStatus => "update_status",
            Action::NotifyNextApprover => "notify_next_approver",
            Action::NotifyEmployee => "notify_employee",
            Action::NotifyHr => "notify_hr",
            Action::LogTransition => "log_transition",
            Action::LogApproval => "log_approval",
            Action::LogRejection => "log_rejection",
            Action::UpdateApprovalMetadata => "update_approval_metadata",
            Action::AdjustLeaveBalance => "adjust_leave_balance",
            Action::CheckConflict => "check_conflict",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user issuing an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Snapshot the guards are evaluated against. `has_conflict` comes from the
/// conflict engine and is computed by the caller.
#[derive(Debug, Clone)]
pub struct GuardContext {
    pub actor: Actor,
    pub balance: i64,
    pub days_requested: u32,
    pub start: CalendarDay,
    pub end: CalendarDay,
    pub urgency: Urgency,
    pub has_conflict: bool,
}

#[derive(Clone, Copy)]
pub struct Guard {
    pub name: &'static str,
    condition: fn(&GuardContext) -> bool,
}

impl Guard {
    pub fn check(&self, ctx: &GuardContext) -> bool {
        (self.condition)(ctx)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guard").field(&self.name).finish()
    }
}

fn is_employee(ctx: &GuardContext) -> bool {
    ctx.actor.role == Role::Employee
}

fn is_cell_manager(ctx: &GuardContext) -> bool {
    ctx.actor.role == Role::CellManager
}

fn is_service_chief(ctx: &GuardContext) -> bool {
    ctx.actor.role == Role::ServiceChief
}

fn is_hr(ctx: &GuardContext) -> bool {
    ctx.actor.role == Role::Hr
}

fn has_sufficient_balance(ctx: &GuardContext) -> bool {
    ctx.balance >= i64::from(ctx.days_requested)
}

// single-day requests (start == end) are valid
fn is_valid_date_range(ctx: &GuardContext) -> bool {
    ctx.start <= ctx.end
}

fn has_no_conflict(ctx: &GuardContext) -> bool {
    !ctx.has_conflict
}

pub const IS_EMPLOYEE: Guard = Guard {
    name: "isEmployee",
    condition: is_employee,
};
pub const IS_CELL_MANAGER: Guard = Guard {
    name: "isCellManager",
    condition: is_cell_manager,
};
pub const IS_SERVICE_CHIEF: Guard = Guard {
    name: "isServiceChief",
    condition: is_service_chief,
};
pub const IS_HR: Guard = Guard {
    name: "isHR",
    condition: is_hr,
};
pub const HAS_SUFFICIENT_BALANCE: Guard = Guard {
    name: "hasSufficientBalance",
    condition: has_sufficient_balance,
};
pub const IS_VALID_DATE_RANGE: Guard = Guard {
    name: "isValidDateRange",
    condition: is_valid_date_range,
};
pub const HAS_NO_CONFLICT: Guard = Guard {
    name: "hasNoConflict",
    condition: has_no_conflict,
};

#[derive(Debug)]
pub struct TransitionRow {
    pub from: LeaveRequestState,
    pub event: LeaveRequestEvent,
    pub to: LeaveRequestState,
    /// Evaluated in order, the first failure is reported.
    pub guards: &'static [Guard],
    pub actions: &'static [Action],
    pub description: &'static str,
}

static TRANSITIONS: [TransitionRow; 8] = [
    TransitionRow {
        from: State::Draft,
        event: Event::Submit,
        to: State::PendingCellManager,
        guards: &[HAS_SUFFICIENT_BALANCE, IS_VALID_DATE_RANGE, HAS_NO_CONFLICT],
        actions: &[
            Action::UpdateStatus,
            Action::NotifyNextApprover,
            Action::LogTransition,
        ],
        description: "Employee submits the request to the cell manager",
    },
    TransitionRow {
        from: State::PendingCellManager,
        event: Event::ApproveN1,
        to: State::PendingServiceChief,
        guards: &[IS_CELL_MANAGER],
        actions: &[
            Action::UpdateStatus,
            Action::LogApproval,
            Action::UpdateApprovalMetadata,
            Action::NotifyNextApprover,
        ],
        description: "Cell manager approves, forwarded to the service chief",
    },
    TransitionRow {
        from: State::PendingCellManager,
        event: Event::RejectN1,
        to: State::Rejected,
        guards: &[IS_CELL_MANAGER],
        actions: &[
            Action::UpdateStatus,
            Action::LogRejection,
            Action::UpdateApprovalMetadata,
            Action::NotifyEmployee,
        ],
        description: "Cell manager rejects the request",
    },
    TransitionRow {
        from: State::PendingCellManager,
        event: Event::Cancel,
        to: State::Cancelled,
        guards: &[IS_EMPLOYEE],
        actions: &[
            Action::UpdateStatus,
            Action::LogTransition,
            Action::NotifyNextApprover,
        ],
        description: "Employee cancels a request still awaiting the cell manager",
    },
    TransitionRow {
        from: State::PendingServiceChief,
        event: Event::ApproveN2,
        to: State::PendingHr,
        guards: &[IS_SERVICE_CHIEF],
        actions: &[
            Action::UpdateStatus,
            Action::LogApproval,
            Action::UpdateApprovalMetadata,
            Action::NotifyHr,
        ],
        description: "Service chief approves, forwarded to HR for final validation",
    },
    TransitionRow {
        from: State::PendingServiceChief,
        event: Event::RejectN2,
        to: State::Rejected,
        guards: &[IS_SERVICE_CHIEF],
        actions: &[
            Action::UpdateStatus,
            Action::LogRejection,
            Action::UpdateApprovalMetadata,
            Action::NotifyEmployee,
        ],
        description: "Service chief rejects the request",
    },
    TransitionRow {
        from: State::PendingHr,
        event: Event::ApproveHr,
        to: State::Approved,
        guards: &[IS_HR],
        actions: &[
            Action::UpdateStatus,
            Action::LogApproval,
            Action::UpdateApprovalMetadata,
            Action::AdjustLeaveBalance,
            Action::NotifyEmployee,
            Action::CheckConflict,
        ],
        description: "HR grants the leave",
    },
    TransitionRow {
        from: State::PendingHr,
        event: Event::RejectHr,
        to: State::Rejected,
        guards: &[IS_HR],
        actions: &[
            Action::UpdateStatus,
            Action::LogRejection,
            Action::UpdateApprovalMetadata,
            Action::NotifyEmployee,
        ],
        description: "HR rejects the request",
    },
];

pub fn transitions() -> &'static [TransitionRow] {
    &TRANSITIONS
}

pub fn find_transition(state: LeaveRequestState, event: LeaveRequestEvent) -> Option<&'static TransitionRow> {
    TRANSITIONS
        .iter()
        .find(|row| row.from == state && row.event == event)
}

/// Looks up the row for `(state, event)` and runs its guards against `ctx`.
pub fn decide(
    state: LeaveRequestState,
    event: LeaveRequestEvent,
    ctx: &GuardContext,
) -> Result<&'static TransitionRow, WorkflowError> {
    let row = find_transition(state, event)
        .ok_or(WorkflowError::InvalidTransition { state, event })?;

    if let Some(failed) = row.guards.iter().find(|guard| !guard.check(ctx)) {
        debug!(%state, %event, guard = failed.name, "guard rejected transition");
        return Err(WorkflowError::GuardViolation(failed.name));
    }

    Ok(row)
}

pub fn can_transition(state: LeaveRequestState, event: LeaveRequestEvent, ctx: &GuardContext) -> bool {
    decide(state, event, ctx).is_ok()
}

/// Rows leaving `state`, regardless of guards. Empty for terminal states.
pub fn available_transitions(state: LeaveRequestState) -> Vec<&'static TransitionRow> {
    TRANSITIONS.iter().filter(|row| row.from == state).collect()
}

/// The role expected to act next, `None` for drafts and terminal states.
pub fn next_approver(state: LeaveRequestState) -> Option<Role> {
    match state {
        State::PendingCellManager => Some(Role::CellManager),
        State::PendingServiceChief => Some(Role::ServiceChief),
        State::PendingHr => Some(Role::Hr),
        State::Draft | State::Approved | State::Rejected | State::Cancelled => None,
    }
}

/// Graphviz rendering of the transition table.
pub fn visualize() -> String {
    let mut graph = String::from("digraph LeaveRequestWorkflow {\n  rankdir=LR;\n  node [shape=box];\n\n");
    for row in TRANSITIONS.iter() {
        graph.push_str(&format!("  {} -> {} [label=\"{}\"];\n", row.from, row.to, row.event));
    }
    graph.push_str("}\n");
    graph
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    #[n(0)]
    pub event: LeaveRequestEvent,
    #[n(1)]
    pub timestamp: TimeStamp<Utc>,
    #[n(2)]
    pub actor: String,
    #[n(3)]
    pub comment: Option<String>,
    #[n(4)]
    pub from: LeaveRequestState,
    #[n(5)]
    pub to: LeaveRequestState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub new_state: LeaveRequestState,
    pub actions: Vec<Action>,
    pub entry: HistoryEntry,
}

/// Current state of one request plus its append-only transition history.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LeaveWorkflow {
    #[n(0)]
    state: LeaveRequestState,
    #[n(1)]
    history: Vec<HistoryEntry>,
}

impl Default for LeaveWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaveWorkflow {
    pub fn new() -> Self {
        Self::with_state(State::Draft)
    }
    /// Resume a workflow known to be in `state`, with no recorded history.
    pub fn with_state(state: LeaveRequestState) -> Self {
        Self {
            state,
            history: vec![],
        }
    }
    pub fn state(&self) -> LeaveRequestState {
        self.state
    }
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
    pub fn can_transition(&self, event: LeaveRequestEvent, ctx: &GuardContext) -> bool {
        can_transition(self.state, event, ctx)
    }
    pub fn available_transitions(&self) -> Vec<&'static TransitionRow> {
        available_transitions(self.state)
    }
    pub fn next_approver(&self) -> Option<Role> {
        next_approver(self.state)
    }

    /// Apply `event`. Either the whole transition happens or nothing changes.
    pub fn transition(
        &mut self,
        event: LeaveRequestEvent,
        ctx: &GuardContext,
        comment: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let row = decide(self.state, event, ctx).inspect_err(|err| {
            warn!(state = %self.state, %event, actor = %ctx.actor.id, "{err}");
        })?;

        let entry = HistoryEntry {
            event,
            timestamp: TimeStamp::new(),
            actor: ctx.actor.id.clone(),
            comment,
            from: row.from,
            to: row.to,
        };
        self.history.push(entry.clone());
        self.state = row.to;

        info!(from = %row.from, to = %row.to, %event, actor = %ctx.actor.id, "leave request transitioned");

        Ok(TransitionOutcome {
            new_state: row.to,
            actions: row.actions.to_vec(),
            entry,
        })
    }
}
