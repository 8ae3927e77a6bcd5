//! Property-based tests for the approval state machine
//!
//! The transition table decides every state change a leave request goes
//! through. These properties hold regardless of the order of events or who
//! issues them:
//!
//! 1. Pairs missing from the table are rejected and change nothing
//! 2. A failed guard leaves state and history exactly as they were
//! 3. An approved request went through N1, N2 and HR exactly once, in order
//! 4. Terminal states accept no further event
//! 5. `can_transition` agrees with `transition`
//!
//! Persistence and authorisation of the caller are covered by the scenarios.

use leave_approval::{
    WorkflowError,
    machine::{self, Actor, GuardContext, LeaveWorkflow},
    types::{CalendarDay, LeaveRequestEvent, LeaveRequestState, Role, Urgency},
};
use proptest::prelude::*;

fn state_strategy() -> impl Strategy<Value = LeaveRequestState> {
    prop::sample::select(LeaveRequestState::ALL.to_vec())
}

fn event_strategy() -> impl Strategy<Value = LeaveRequestEvent> {
    prop::sample::select(LeaveRequestEvent::ALL.to_vec())
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

/// Guard contexts mixing passing and failing business conditions
fn context_strategy() -> impl Strategy<Value = GuardContext> {
    (
        role_strategy(),
        0i64..=15,
        1u32..=10,
        0u64..=20,
        0u64..=10,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(role, balance, days, offset, length, has_conflict, inverted)| {
            let base = CalendarDay::from_ymd(2026, 9, 1).unwrap().add_days(offset);
            let other = base.add_days(length);
            let (start, end) = if inverted { (other, base) } else { (base, other) };
            GuardContext {
                actor: Actor::new(format!("user_{}", role), role),
                balance,
                days_requested: days,
                start,
                end,
                urgency: Urgency::Normal,
                has_conflict,
            }
        })
}

fn step_strategy() -> impl Strategy<Value = Vec<(LeaveRequestEvent, GuardContext)>> {
    prop::collection::vec((event_strategy(), context_strategy()), 1..=20)
}

proptest! {
    /// Property: any (state, event) pair outside the table fails with InvalidTransition
    #[test]
    fn prop_missing_rows_are_invalid(
        state in state_strategy(),
        event in event_strategy(),
        ctx in context_strategy(),
    ) {
        prop_assume!(machine::find_transition(state, event).is_none());

        let mut workflow = LeaveWorkflow::with_state(state);
        let before = workflow.clone();

        prop_assert_eq!(
            workflow.transition(event, &ctx, None),
            Err(WorkflowError::InvalidTransition { state, event })
        );
        prop_assert_eq!(workflow, before);
    }

    /// Property: a guard failure is atomic, nothing about the workflow changes
    #[test]
    fn prop_guard_failure_is_atomic(
        steps in step_strategy(),
    ) {
        let mut workflow = LeaveWorkflow::new();

        for (event, ctx) in steps {
            let before = workflow.clone();
            match workflow.transition(event, &ctx, Some("note".into())) {
                Ok(outcome) => {
                    prop_assert_eq!(workflow.history().len(), before.history().len() + 1);
                    prop_assert_eq!(workflow.state(), outcome.new_state);
                    prop_assert_eq!(workflow.history().last(), Some(&outcome.entry));
                    prop_assert_eq!(outcome.entry.from, before.state());
                }
                Err(_) => {
                    prop_assert_eq!(&workflow, &before);
                }
            }
        }
    }

    /// Property: approval is monotonic through the three levels
    #[test]
    fn prop_approved_requests_passed_every_level_once(
        steps in step_strategy(),
    ) {
        let mut workflow = LeaveWorkflow::new();
        for (event, ctx) in steps {
            let _ = workflow.transition(event, &ctx, None);
        }

        if workflow.state() == LeaveRequestState::Approved {
            let events: Vec<LeaveRequestEvent> = workflow.history().iter().map(|e| e.event).collect();
            prop_assert_eq!(
                events,
                vec![
                    LeaveRequestEvent::Submit,
                    LeaveRequestEvent::ApproveN1,
                    LeaveRequestEvent::ApproveN2,
                    LeaveRequestEvent::ApproveHr,
                ]
            );
        }
    }

    /// Property: walking only offered transitions, an approved request still
    /// shows exactly one approval per level and no rejection or cancellation
    #[test]
    fn prop_offered_walk_keeps_levels_monotonic(
        steps in prop::collection::vec((any::<prop::sample::Index>(), context_strategy()), 1..=30),
    ) {
        let mut workflow = LeaveWorkflow::new();
        for (index, ctx) in steps {
            let rows = workflow.available_transitions();
            if rows.is_empty() {
                break;
            }
            let event = index.get(&rows).event;
            let _ = workflow.transition(event, &ctx, None);
        }

        let count = |event: LeaveRequestEvent| workflow.history().iter().filter(|e| e.event == event).count();
        if workflow.state() == LeaveRequestState::Approved {
            prop_assert_eq!(count(LeaveRequestEvent::ApproveN1), 1);
            prop_assert_eq!(count(LeaveRequestEvent::ApproveN2), 1);
            prop_assert_eq!(count(LeaveRequestEvent::ApproveHr), 1);
            let aborted = workflow.history().iter().any(|e| {
                matches!(
                    e.event,
                    LeaveRequestEvent::RejectN1
                        | LeaveRequestEvent::RejectN2
                        | LeaveRequestEvent::RejectHr
                        | LeaveRequestEvent::Cancel
                )
            });
            prop_assert!(!aborted);
        }
    }

    /// Property: history entries chain, each starting where the previous ended
    #[test]
    fn prop_history_is_a_chain(
        steps in step_strategy(),
    ) {
        let mut workflow = LeaveWorkflow::new();
        for (event, ctx) in steps {
            let _ = workflow.transition(event, &ctx, None);
        }

        let mut expected_from = LeaveRequestState::Draft;
        for entry in workflow.history() {
            prop_assert_eq!(entry.from, expected_from);
            expected_from = entry.to;
        }
        prop_assert_eq!(expected_from, workflow.state());
    }

    /// Property: terminal states are stable whatever the event and actor
    #[test]
    fn prop_terminal_states_are_stable(
        state in prop::sample::select(vec![
            LeaveRequestState::Approved,
            LeaveRequestState::Rejected,
            LeaveRequestState::Cancelled,
        ]),
        steps in step_strategy(),
    ) {
        let mut workflow = LeaveWorkflow::with_state(state);

        for (event, ctx) in steps {
            let is_invalid = matches!(
                workflow.transition(event, &ctx, None),
                Err(WorkflowError::InvalidTransition { .. })
            );
            prop_assert!(is_invalid);
        }
        prop_assert_eq!(workflow.state(), state);
        prop_assert!(workflow.history().is_empty());
    }

    /// Property: can_transition is true exactly when transition succeeds
    #[test]
    fn prop_can_transition_matches_transition(
        state in state_strategy(),
        event in event_strategy(),
        ctx in context_strategy(),
    ) {
        let mut workflow = LeaveWorkflow::with_state(state);
        let predicted = workflow.can_transition(event, &ctx);

        prop_assert_eq!(predicted, workflow.transition(event, &ctx, None).is_ok());
    }

    /// Property: role guards have no hierarchy, only the exact role passes
    #[test]
    fn prop_role_guards_are_exact(
        role in role_strategy(),
        ctx in context_strategy(),
    ) {
        let mut ctx = ctx;
        ctx.actor.role = role;

        let cases = [
            (LeaveRequestState::PendingCellManager, LeaveRequestEvent::ApproveN1, Role::CellManager, "isCellManager"),
            (LeaveRequestState::PendingServiceChief, LeaveRequestEvent::RejectN2, Role::ServiceChief, "isServiceChief"),
            (LeaveRequestState::PendingHr, LeaveRequestEvent::ApproveHr, Role::Hr, "isHR"),
            (LeaveRequestState::PendingCellManager, LeaveRequestEvent::Cancel, Role::Employee, "isEmployee"),
        ];

        for (state, event, required, guard) in cases {
            let result = machine::decide(state, event, &ctx).map(|row| row.to);
            if role == required {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result, Err(WorkflowError::GuardViolation(guard)));
            }
        }
    }
}
