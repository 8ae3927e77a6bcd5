//! Leave requests and the draft builder used to create them
use super::error::{ValidationError, WorkflowError};
use super::machine::{Actor, GuardContext, HistoryEntry, LeaveWorkflow, TransitionOutcome};
use super::types::{CalendarDay, DateRange, LeaveRequestEvent, LeaveRequestState, Role, TimeStamp, Urgency};
use super::utils;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LeaveCategory {
    #[n(0)]
    pub name: String,
    #[n(1)]
    pub max_days: u32,
}

impl LeaveCategory {
    pub fn new(name: impl Into<String>, max_days: u32) -> Self {
        Self {
            name: name.into(),
            max_days,
        }
    }

    pub fn default_catalogue() -> Vec<Self> {
        vec![
            Self::new("annual", 30),
            Self::new("sick", 90),
            Self::new("maternity", 98),
            Self::new("unpaid", 365),
            Self::new("exceptional", 3),
        ]
    }
}

/// The three approval tiers: N1, N2 and the final HR validation.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalLevel {
    #[n(0)]
    CellManager,
    #[n(1)]
    ServiceChief,
    #[n(2)]
    Hr,
}

impl ApprovalLevel {
    pub fn role(&self) -> Role {
        match self {
            ApprovalLevel::CellManager => Role::CellManager,
            ApprovalLevel::ServiceChief => Role::ServiceChief,
            ApprovalLevel::Hr => Role::Hr,
        }
    }

    /// The level deciding through `event`, and whether the decision is an approval.
    pub fn decided_by(event: LeaveRequestEvent) -> Option<(Self, bool)> {
        match event {
            LeaveRequestEvent::ApproveN1 => Some((ApprovalLevel::CellManager, true)),
            LeaveRequestEvent::RejectN1 => Some((ApprovalLevel::CellManager, false)),
            LeaveRequestEvent::ApproveN2 => Some((ApprovalLevel::ServiceChief, true)),
            LeaveRequestEvent::RejectN2 => Some((ApprovalLevel::ServiceChief, false)),
            LeaveRequestEvent::ApproveHr => Some((ApprovalLevel::Hr, true)),
            LeaveRequestEvent::RejectHr => Some((ApprovalLevel::Hr, false)),
            _ => None,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRecord {
    #[n(0)]
    pub approver: String,
    #[n(1)]
    pub decided_at: TimeStamp<Utc>,
    #[n(2)]
    pub approved: bool,
    #[n(3)]
    pub comment: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LeaveRequest {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    requester_id: String,
    #[n(2)]
    category: LeaveCategory,
    #[n(3)]
    period: DateRange,
    #[n(4)]
    days: u32, // working days in `period`
    #[n(5)]
    pub reason: Option<String>,
    #[n(6)]
    pub urgency: Urgency,
    #[n(7)]
    submitted_at: Option<TimeStamp<Utc>>,
    #[n(8)]
    cell_manager_approval: Option<ApprovalRecord>,
    #[n(9)]
    service_chief_approval: Option<ApprovalRecord>,
    #[n(10)]
    hr_approval: Option<ApprovalRecord>,
    #[n(11)]
    workflow: LeaveWorkflow,
}

impl LeaveRequest {
    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }
    pub fn category(&self) -> &LeaveCategory {
        &self.category
    }
    pub fn period(&self) -> DateRange {
        self.period
    }
    /// Working days in [`Self::period`].
    pub fn days(&self) -> u32 {
        self.days
    }
    pub fn state(&self) -> LeaveRequestState {
        self.workflow.state()
    }
    pub fn history(&self) -> &[HistoryEntry] {
        self.workflow.history()
    }
    pub fn workflow(&self) -> &LeaveWorkflow {
        &self.workflow
    }
    pub fn submitted_at(&self) -> Option<&TimeStamp<Utc>> {
        self.submitted_at.as_ref()
    }
    pub fn approval(&self, level: ApprovalLevel) -> Option<&ApprovalRecord> {
        match level {
            ApprovalLevel::CellManager => self.cell_manager_approval.as_ref(),
            ApprovalLevel::ServiceChief => self.service_chief_approval.as_ref(),
            ApprovalLevel::Hr => self.hr_approval.as_ref(),
        }
    }

    /// Guard snapshot for `actor` acting on this request.
    pub fn guard_context(&self, actor: Actor, balance: i64, has_conflict: bool) -> GuardContext {
        GuardContext {
            actor,
            balance,
            days_requested: self.days,
            start: self.period.start(),
            end: self.period.end(),
            urgency: self.urgency,
            has_conflict,
        }
    }

    /// Runs the workflow transition and fills the matching approval slot.
    pub fn transition(
        &mut self,
        event: LeaveRequestEvent,
        ctx: &GuardContext,
        comment: Option<String>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let outcome = self.workflow.transition(event, ctx, comment)?;
        let entry = &outcome.entry;

        if event == LeaveRequestEvent::Submit {
            self.submitted_at = Some(entry.timestamp.clone());
        }
        if let Some((level, approved)) = ApprovalLevel::decided_by(event) {
            let record = ApprovalRecord {
                approver: entry.actor.clone(),
                decided_at: entry.timestamp.clone(),
                approved,
                comment: entry.comment.clone(),
            };
            match level {
                ApprovalLevel::CellManager => self.cell_manager_approval = Some(record),
                ApprovalLevel::ServiceChief => self.service_chief_approval = Some(record),
                ApprovalLevel::Hr => self.hr_approval = Some(record),
            }
        }

        Ok(outcome)
    }
}

/// Used for constructing drafts. Nothing reaches the state machine before
/// [`LeaveRequestDraft::validate_and_finalise`] accepts it.
#[derive(Debug, Default, Clone)]
pub struct LeaveRequestDraft {
    requester_id: Option<String>,
    category: Option<LeaveCategory>,
    start_date: Option<CalendarDay>,
    end_date: Option<CalendarDay>,
    reason: Option<String>,
    urgency: Urgency,
}

impl LeaveRequestDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_requester(mut self, user_id: impl Into<String>) -> Self {
        self.requester_id = Some(user_id.into());
        self
    }
    pub fn set_category(mut self, category: LeaveCategory) -> Self {
        self.category = Some(category);
        self
    }
    pub fn set_start_date(mut self, date: CalendarDay) -> Self {
        self.start_date = Some(date);
        self
    }
    pub fn set_end_date(mut self, date: CalendarDay) -> Self {
        self.end_date = Some(date);
        self
    }
    pub fn set_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
    pub fn set_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }
    /// Checks `start <= end` with both dates present
    pub fn validate_dates(&self) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => false,
        }
    }

    // Checks fields and returns the request in its initial draft state
    pub fn validate_and_finalise(&self, id: String) -> Result<LeaveRequest, ValidationError> {
        let requester_id = self
            .requester_id
            .as_ref()
            .filter(|r| !r.is_empty())
            .ok_or(ValidationError::MissingRequester)?;
        let category = self.category.as_ref().ok_or(ValidationError::MissingCategory)?;
        let start = self.start_date.ok_or(ValidationError::MissingDate("start"))?;
        let end = self.end_date.ok_or(ValidationError::MissingDate("end"))?;

        let period = DateRange::new(start, end)?;
        let days = period.working_days();
        if days == 0 {
            return Err(ValidationError::NoWorkingDays);
        }
        if days > category.max_days {
            return Err(ValidationError::ExceedsCategoryLimit {
                category: category.name.clone(),
                days,
                max_days: category.max_days,
            });
        }

        Ok(LeaveRequest {
            id,
            requester_id: requester_id.clone(),
            category: category.clone(),
            period,
            days,
            reason: self.reason.clone().filter(|r| !r.trim().is_empty()),
            urgency: self.urgency,
            submitted_at: None,
            cell_manager_approval: None,
            service_chief_approval: None,
            hr_approval: None,
            workflow: LeaveWorkflow::new(),
        })
    }

    /// Validate and assign a fresh request id.
    pub fn build(&self) -> anyhow::Result<LeaveRequest> {
        let id = utils::new_request_id()?;
        Ok(self.validate_and_finalise(id)?)
    }
}
