//! Builders shared by the integration tests
#![allow(dead_code)]

use leave_approval::{
    conflict::ServiceSubstitution,
    directory::Profile,
    machine::Actor,
    request::{LeaveCategory, LeaveRequest, LeaveRequestDraft},
    types::{CalendarDay, DateRange, LeaveRequestEvent, LeaveRequestState, Role},
};

/// A Monday, so short ranges starting here always contain working days
pub fn monday() -> CalendarDay {
    CalendarDay::from_ymd(2026, 11, 2).unwrap()
}

pub fn range(start_offset: u64, length: u64) -> DateRange {
    let start = monday().add_days(start_offset);
    DateRange::new(start, start.add_days(length)).unwrap()
}

pub fn draft_for(user: &str, period: DateRange) -> LeaveRequestDraft {
    LeaveRequestDraft::new()
        .set_requester(user)
        .set_category(LeaveCategory::new("annual", 365))
        .set_start_date(period.start())
        .set_end_date(period.end())
}

/// Drive a fresh request through the workflow until it reaches `state`
pub fn request_in(state: LeaveRequestState, id: &str, user: &str, period: DateRange) -> LeaveRequest {
    let mut request = draft_for(user, period)
        .validate_and_finalise(id.to_string())
        .unwrap();

    let path = match state {
        LeaveRequestState::Rejected => vec![
            (LeaveRequestEvent::Submit, Role::Employee),
            (LeaveRequestEvent::RejectN1, Role::CellManager),
        ],
        LeaveRequestState::Cancelled => vec![
            (LeaveRequestEvent::Submit, Role::Employee),
            (LeaveRequestEvent::Cancel, Role::Employee),
        ],
        _ => vec![
            (LeaveRequestEvent::Submit, Role::Employee),
            (LeaveRequestEvent::ApproveN1, Role::CellManager),
            (LeaveRequestEvent::ApproveN2, Role::ServiceChief),
            (LeaveRequestEvent::ApproveHr, Role::Hr),
        ],
    };

    for (event, role) in path {
        if request.state() == state {
            break;
        }
        let actor = if role == Role::Employee {
            Actor::new(user, role)
        } else {
            Actor::new(format!("{role}_approver"), role)
        };
        let ctx = request.guard_context(actor, i64::MAX, false);
        request.transition(event, &ctx, None).unwrap();
    }
    assert_eq!(request.state(), state);
    request
}

pub fn staff(department: &str, count: usize) -> Vec<Profile> {
    (0..count)
        .map(|i| Profile::new(format!("{department}_{i}"), department, Role::Employee, 25))
        .collect()
}

pub fn substitution(id: &str, original: &str, substitute: &str, department: &str, period: DateRange) -> ServiceSubstitution {
    ServiceSubstitution {
        id: id.to_string(),
        original_user_id: original.to_string(),
        substitute_user_id: substitute.to_string(),
        department: department.to_string(),
        period,
    }
}
