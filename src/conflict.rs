//! Staffing conflict detection
//!
//! Decides whether granting a leave request would leave a department below its
//! minimum staffing, or above its cap on concurrent leaves. Absences covered by
//! a [`ServiceSubstitution`] are netted out. Data is read through a
//! [`LeaveDirectory`]; the verdict itself is computed by the pure [`evaluate`].
use super::config::FallbackPolicy;
use super::directory::LeaveDirectory;
use super::error::{ConflictError, DirectoryError};
use super::request::LeaveRequest;
use super::types::{CalendarDay, DateRange};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// A staffing floor for a department, optionally limited to a period.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ConflictRule {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub department: String,
    #[n(2)]
    pub period_start: Option<CalendarDay>, // None = open ended
    #[n(3)]
    pub period_end: Option<CalendarDay>,
    #[n(4)]
    pub min_employees_required: u32,
    #[n(5)]
    pub max_concurrent_leaves: Option<u32>,
    #[n(6)]
    pub is_active: bool,
}

impl ConflictRule {
    pub fn new(id: impl Into<String>, department: impl Into<String>, min_employees_required: u32) -> Self {
        Self {
            id: id.into(),
            department: department.into(),
            period_start: None,
            period_end: None,
            min_employees_required,
            max_concurrent_leaves: None,
            is_active: true,
        }
    }
    pub fn with_period(mut self, start: Option<CalendarDay>, end: Option<CalendarDay>) -> Self {
        self.period_start = start;
        self.period_end = end;
        self
    }
    pub fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent_leaves = Some(max);
        self
    }
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Active, same department, and the optional period intersects `range`.
    pub fn applies_to(&self, department: &str, range: &DateRange) -> bool {
        self.is_active
            && self.department == department
            && self.period_start.is_none_or(|start| start <= range.end())
            && self.period_end.is_none_or(|end| end >= range.start())
    }
}

/// Temporary coverage of `original_user_id` by `substitute_user_id`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ServiceSubstitution {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub original_user_id: String,
    #[n(2)]
    pub substitute_user_id: String,
    #[n(3)]
    pub department: String,
    #[n(4)]
    pub period: DateRange,
}

impl ServiceSubstitution {
    pub fn covers(&self, department: &str, range: &DateRange) -> bool {
        self.department == department && self.period.overlaps(range)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictQuery {
    pub user_id: String,
    pub department: String,
    pub period: DateRange,
    /// Set when re-evaluating a request that is already stored.
    pub exclude_request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    MinEmployees,
    MaxConcurrent,
    /// Data could not be read and the engine is configured to fail closed.
    Unverified,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::MinEmployees => "MIN_EMPLOYEES",
            ConflictKind::MaxConcurrent => "MAX_CONCURRENT",
            ConflictKind::Unverified => "UNVERIFIED",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDetails {
    /// Effective absentees including the candidate.
    pub current_absences: u32,
    pub employees_present: i64,
    pub min_required: u32,
    pub max_allowed: Option<u32>,
    pub affected_employees: Vec<String>,
    pub substitutions_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictResult {
    pub has_conflict: bool,
    pub conflict_type: Option<ConflictKind>,
    pub message: Option<String>,
    pub details: Option<ConflictDetails>,
}

impl ConflictResult {
    pub fn clear() -> Self {
        Self {
            has_conflict: false,
            conflict_type: None,
            message: None,
            details: None,
        }
    }
}

/// Distinct absent employees whose absence is not covered by a substitution.
pub fn effective_absentees<'a>(
    requests: &'a [LeaveRequest],
    substitutions: &[ServiceSubstitution],
) -> BTreeSet<&'a str> {
    let mut absentees: BTreeSet<&str> = requests.iter().map(|r| r.requester_id()).collect();
    for sub in substitutions {
        absentees.remove(sub.original_user_id.as_str());
    }
    absentees
}

/// The rule with the highest minimum; the first one listed wins a tie.
pub fn most_restrictive_rule(rules: &[ConflictRule]) -> Option<&ConflictRule> {
    rules.iter().fold(None, |best: Option<&ConflictRule>, rule| match best {
        Some(b) if b.min_employees_required >= rule.min_employees_required => Some(b),
        _ => Some(rule),
    })
}

/// Verdict for one candidate request over already fetched data. `rules` must be
/// the applicable ones and `overlapping` must not contain the candidate.
pub fn evaluate(
    rules: &[ConflictRule],
    overlapping: &[LeaveRequest],
    substitutions: &[ServiceSubstitution],
    headcount: u32,
) -> ConflictResult {
    let Some(rule) = most_restrictive_rule(rules) else {
        return ConflictResult::clear();
    };

    let absent = effective_absentees(overlapping, substitutions).len() as u32;
    let with_candidate = absent + 1;
    let employees_present = i64::from(headcount) - i64::from(absent) - 1;

    let affected: BTreeSet<&str> = overlapping.iter().map(|r| r.requester_id()).collect();
    let details = ConflictDetails {
        current_absences: with_candidate,
        employees_present,
        min_required: rule.min_employees_required,
        max_allowed: rule.max_concurrent_leaves,
        affected_employees: affected.into_iter().map(String::from).collect(),
        substitutions_available: !substitutions.is_empty(),
    };

    debug!(
        rule = %rule.id,
        headcount,
        absent,
        employees_present,
        min_required = rule.min_employees_required,
        "evaluated staffing"
    );

    if employees_present < i64::from(rule.min_employees_required) {
        return ConflictResult {
            has_conflict: true,
            conflict_type: Some(ConflictKind::MinEmployees),
            message: Some(format!(
                "Minimum staffing not met: {} employee(s) required, only {} would be present",
                rule.min_employees_required, employees_present
            )),
            details: Some(details),
        };
    }

    if let Some(max) = rule.max_concurrent_leaves {
        if with_candidate > max {
            return ConflictResult {
                has_conflict: true,
                conflict_type: Some(ConflictKind::MaxConcurrent),
                message: Some(format!(
                    "Too many concurrent leaves: {max} allowed, {with_candidate} requested"
                )),
                details: Some(details),
            };
        }
    }

    ConflictResult {
        has_conflict: false,
        conflict_type: None,
        message: Some("No conflict detected".to_string()),
        details: Some(details),
    }
}

/// Fetches conflict data from a [`LeaveDirectory`] and evaluates it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictEngine {
    fallback: FallbackPolicy,
}

impl ConflictEngine {
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    pub fn detect_conflicts<D: LeaveDirectory + ?Sized>(
        &self,
        directory: &D,
        query: &ConflictQuery,
    ) -> Result<ConflictResult, ConflictError> {
        let err = match self.gather(directory, query) {
            Ok(result) => {
                if let Some(kind) = result.conflict_type {
                    warn!(user = %query.user_id, department = %query.department, period = %query.period, %kind, "staffing conflict");
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        match self.fallback {
            FallbackPolicy::Propagate => Err(ConflictError::DataUnavailable(err)),
            FallbackPolicy::FailOpen => {
                warn!(department = %query.department, "conflict data unavailable, allowing request: {err}");
                Ok(ConflictResult {
                    message: Some(format!("Conflict check skipped: {err}")),
                    ..ConflictResult::clear()
                })
            }
            FallbackPolicy::FailClosed => {
                warn!(department = %query.department, "conflict data unavailable, blocking request: {err}");
                Ok(ConflictResult {
                    has_conflict: true,
                    conflict_type: Some(ConflictKind::Unverified),
                    message: Some(format!("Conflict check could not be completed: {err}")),
                    details: None,
                })
            }
        }
    }

    fn gather<D: LeaveDirectory + ?Sized>(
        &self,
        directory: &D,
        query: &ConflictQuery,
    ) -> Result<ConflictResult, DirectoryError> {
        let department = query.department.as_str();
        let period = &query.period;

        let rules: Vec<ConflictRule> = directory
            .active_conflict_rules(department, period)?
            .into_iter()
            .filter(|rule| rule.applies_to(department, period))
            .collect();
        // absence of policy means no restriction
        if rules.is_empty() {
            return Ok(ConflictResult::clear());
        }

        let exclude = query.exclude_request_id.as_deref();
        let overlapping: Vec<LeaveRequest> = directory
            .overlapping_requests(department, period, exclude)?
            .into_iter()
            .filter(|r| {
                r.state().counts_as_absence()
                    && r.period().overlaps(period)
                    && Some(r.id.as_str()) != exclude
            })
            .collect();

        let substitutions: Vec<ServiceSubstitution> = directory
            .active_substitutions(department, period)?
            .into_iter()
            .filter(|sub| sub.covers(department, period))
            .collect();

        let headcount = directory.department_headcount(department)?;

        Ok(evaluate(&rules, &overlapping, &substitutions, headcount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> CalendarDay {
        CalendarDay::from_ymd(2026, 7, d).unwrap()
    }

    #[test]
    fn open_bounds_apply_on_their_side() {
        let range = DateRange::new(day(10), day(12)).unwrap();

        assert!(ConflictRule::new("r", "ops", 1).applies_to("ops", &range));
        assert!(!ConflictRule::new("r", "ops", 1).applies_to("it", &range));
        assert!(!ConflictRule::new("r", "ops", 1).deactivated().applies_to("ops", &range));
        assert!(
            ConflictRule::new("r", "ops", 1)
                .with_period(Some(day(12)), None)
                .applies_to("ops", &range)
        );
        assert!(
            !ConflictRule::new("r", "ops", 1)
                .with_period(Some(day(13)), None)
                .applies_to("ops", &range)
        );
        assert!(
            ConflictRule::new("r", "ops", 1)
                .with_period(None, Some(day(10)))
                .applies_to("ops", &range)
        );
        assert!(
            !ConflictRule::new("r", "ops", 1)
                .with_period(Some(day(1)), Some(day(9)))
                .applies_to("ops", &range)
        );
    }

    #[test]
    fn tie_keeps_first_rule_and_its_cap() {
        let rules = vec![
            ConflictRule::new("first", "ops", 3).with_max_concurrent(1),
            ConflictRule::new("second", "ops", 3).with_max_concurrent(9),
            ConflictRule::new("low", "ops", 1),
        ];
        assert_eq!(most_restrictive_rule(&rules).unwrap().id, "first");
        assert!(most_restrictive_rule(&[]).is_none());
    }

    #[test]
    fn cap_comes_from_the_selected_rule_only() {
        // the lenient rule has a cap, the strict one has none
        let rules = vec![
            ConflictRule::new("lenient", "ops", 1).with_max_concurrent(0),
            ConflictRule::new("strict", "ops", 2),
        ];
        let result = evaluate(&rules, &[], &[], 10);

        assert!(!result.has_conflict);
        assert_eq!(result.details.unwrap().max_allowed, None);
    }
}
