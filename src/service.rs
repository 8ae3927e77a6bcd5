//! Service layer API for leave request workflow operations
use super::config::Config;
use super::conflict::{ConflictEngine, ConflictQuery, ConflictResult};
use super::directory::LeaveDirectory;
use super::machine::{self, Action, Actor, GuardContext, HistoryEntry, TransitionOutcome};
use super::request::{LeaveRequest, LeaveRequestDraft};
use super::store::LeaveStore;
use super::types::{LeaveRequestEvent, LeaveRequestState, Role};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{info, warn};

/// Receives the actions a transition declares, once the request is persisted.
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(&self, action: Action, request: &LeaveRequest, entry: &HistoryEntry);
}

/// Logs every declared action.
#[derive(Debug, Default)]
pub struct TracingDispatcher;

impl ActionDispatcher for TracingDispatcher {
    fn dispatch(&self, action: Action, request: &LeaveRequest, entry: &HistoryEntry) {
        info!(
            %action,
            request = %request.id,
            actor = %entry.actor,
            state = %request.state(),
            "declared action"
        );
    }
}

#[derive(Debug, Clone)]
pub struct TransitionReport {
    pub request: LeaveRequest,
    pub outcome: TransitionOutcome,
    /// Present for submissions, which are checked for staffing conflicts.
    pub conflict: Option<ConflictResult>,
}

pub struct LeaveService {
    store: Arc<LeaveStore>,
    engine: ConflictEngine,
    dispatcher: Box<dyn ActionDispatcher>,
}

impl LeaveService {
    pub fn new(store: Arc<LeaveStore>, config: &Config) -> Self {
        Self {
            store,
            engine: ConflictEngine::new(config.conflict_fallback),
            dispatcher: Box::new(TracingDispatcher),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: impl ActionDispatcher + 'static) -> Self {
        self.dispatcher = Box::new(dispatcher);
        self
    }

    pub fn store(&self) -> &LeaveStore {
        &self.store
    }

    /// Validate a draft and store it as a new request in `Draft`.
    pub fn create_request(&self, draft: &LeaveRequestDraft) -> anyhow::Result<LeaveRequest> {
        let request = draft.build()?;
        self.store.require_profile(request.requester_id())?;
        self.store.save_request(&request)?;

        info!(request = %request.id, requester = %request.requester_id(), period = %request.period(), days = request.days(), "leave request created");
        Ok(request)
    }

    pub fn detect_conflicts(&self, query: &ConflictQuery) -> anyhow::Result<ConflictResult> {
        Ok(self.engine.detect_conflicts(self.store.as_ref(), query)?)
    }

    pub fn submit(&self, request_id: &str, actor: &Actor) -> anyhow::Result<TransitionReport> {
        self.apply(request_id, LeaveRequestEvent::Submit, actor, None)
    }

    /// Approve at whichever level the request is waiting on.
    pub fn approve(&self, request_id: &str, actor: &Actor, comment: Option<String>) -> anyhow::Result<TransitionReport> {
        let state = self.store.load_request(request_id)?.state();
        // no approval row leaves a non-pending state, so the fallback is always rejected
        let event = LeaveRequestEvent::approval_for(state).unwrap_or(LeaveRequestEvent::ApproveN1);
        self.apply(request_id, event, actor, comment)
    }

    /// Reject at whichever level the request is waiting on.
    pub fn reject(&self, request_id: &str, actor: &Actor, comment: Option<String>) -> anyhow::Result<TransitionReport> {
        let state = self.store.load_request(request_id)?.state();
        let event = LeaveRequestEvent::rejection_for(state).unwrap_or(LeaveRequestEvent::RejectN1);
        self.apply(request_id, event, actor, comment)
    }

    pub fn cancel(&self, request_id: &str, actor: &Actor) -> anyhow::Result<TransitionReport> {
        self.apply(request_id, LeaveRequestEvent::Cancel, actor, None)
    }

    /// Load the request, run `event` through the state machine, persist and dispatch.
    pub fn apply(
        &self,
        request_id: &str,
        event: LeaveRequestEvent,
        actor: &Actor,
        comment: Option<String>,
    ) -> anyhow::Result<TransitionReport> {
        let mut request = self.store.load_request(request_id)?;

        // only the requester submits or cancels their own request
        if matches!(event, LeaveRequestEvent::Submit | LeaveRequestEvent::Cancel)
            && actor.id != request.requester_id()
        {
            return Err(anyhow::anyhow!(
                "Unauthorized actor. Expected requester: {}, Got: {}",
                request.requester_id(),
                actor.id
            ));
        }

        let (ctx, conflict) = self.guard_context(&request, event, actor)?;
        let outcome = request.transition(event, &ctx, comment)?;

        self.commit(&request, &outcome)?;

        Ok(TransitionReport {
            request,
            outcome,
            conflict,
        })
    }

    fn guard_context(
        &self,
        request: &LeaveRequest,
        event: LeaveRequestEvent,
        actor: &Actor,
    ) -> anyhow::Result<(GuardContext, Option<ConflictResult>)> {
        let balance = self.store.current_leave_balance(request.requester_id())?;
        if event != LeaveRequestEvent::Submit {
            return Ok((request.guard_context(actor.clone(), balance, false), None));
        }

        let conflict = self.detect_conflicts(&self.query_for(request)?)?;
        let ctx = request.guard_context(actor.clone(), balance, conflict.has_conflict);
        Ok((ctx, Some(conflict)))
    }

    fn query_for(&self, request: &LeaveRequest) -> anyhow::Result<ConflictQuery> {
        let profile = self.store.require_profile(request.requester_id())?;
        Ok(ConflictQuery {
            user_id: request.requester_id().to_string(),
            department: profile.department,
            period: request.period(),
            exclude_request_id: Some(request.id.clone()),
        })
    }

    fn commit(&self, request: &LeaveRequest, outcome: &TransitionOutcome) -> anyhow::Result<()> {
        if outcome.actions.contains(&Action::AdjustLeaveBalance) {
            self.store.save_request_and_debit(request, request.days())?;
        } else {
            self.store.save_request(request)?;
        }

        for action in outcome.actions.iter().copied() {
            if action == Action::CheckConflict {
                self.recheck_staffing(request);
            }
            self.dispatcher.dispatch(action, request, &outcome.entry);
        }
        Ok(())
    }

    // Post-approval check. The approval is already committed, so findings are only logged.
    fn recheck_staffing(&self, request: &LeaveRequest) {
        let result = self
            .query_for(request)
            .and_then(|query| self.detect_conflicts(&query));
        match result {
            Ok(result) if result.has_conflict => warn!(
                request = %request.id,
                kind = ?result.conflict_type,
                "approved leave leaves the department understaffed"
            ),
            Ok(_) => {}
            Err(err) => warn!(request = %request.id, "staffing re-check failed: {err:#}"),
        }
    }

    /// Requests waiting on `approver`, most urgent first, then oldest submission.
    /// Cell managers and service chiefs only see their own department.
    pub fn pending_for(&self, approver: &Actor) -> anyhow::Result<Vec<LeaveRequest>> {
        let department = match approver.role {
            Role::CellManager | Role::ServiceChief => Some(self.store.require_profile(&approver.id)?.department),
            _ => None,
        };

        let mut pending = Vec::new();
        for state in LeaveRequestState::ALL
            .into_iter()
            .filter(|s| machine::next_approver(*s) == Some(approver.role))
        {
            for request in self.store.requests_in_state(state)? {
                if let Some(department) = &department {
                    let requester = self.store.profile(request.requester_id())?;
                    if requester.is_none_or(|p| p.department != *department) {
                        continue;
                    }
                }
                pending.push(request);
            }
        }
        pending.sort_by_key(|r| (Reverse(r.urgency), r.submitted_at().map(|t| t.to_datetime_utc())));
        Ok(pending)
    }

    pub fn view_history(&self, request_id: &str) -> anyhow::Result<Vec<HistoryEntry>> {
        let request = self.store.load_request(request_id)?;
        for entry in request.history() {
            info!(
                request = %request.id,
                event = %entry.event,
                from = %entry.from,
                to = %entry.to,
                actor = %entry.actor,
                at = %entry.timestamp.to_datetime_utc(),
                comment = entry.comment.as_deref().unwrap_or(""),
                "history"
            );
        }
        Ok(request.history().to_vec())
    }
}
