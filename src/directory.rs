//! Read access to the data conflict detection and submission depend on
use super::conflict::{ConflictRule, ServiceSubstitution};
use super::error::DirectoryError;
use super::request::LeaveRequest;
use super::types::{DateRange, Role};

/// An employee's department membership, role and remaining leave days.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    #[n(0)]
    pub user_id: String,
    #[n(1)]
    pub department: String,
    #[n(2)]
    pub role: Role,
    #[n(3)]
    /// Goes negative when more days are approved than were available.
    pub leave_balance: i64,
}

impl Profile {
    pub fn new(user_id: impl Into<String>, department: impl Into<String>, role: Role, leave_balance: i64) -> Self {
        Self {
            user_id: user_id.into(),
            department: department.into(),
            role,
            leave_balance,
        }
    }
}

pub trait LeaveDirectory {
    /// Active rules for `department` whose period overlaps `range` or is unbounded.
    fn active_conflict_rules(&self, department: &str, range: &DateRange) -> Result<Vec<ConflictRule>, DirectoryError>;

    /// Approved or pending requests by members of `department` overlapping `range`.
    fn overlapping_requests(
        &self,
        department: &str,
        range: &DateRange,
        exclude_id: Option<&str>,
    ) -> Result<Vec<LeaveRequest>, DirectoryError>;

    fn active_substitutions(&self, department: &str, range: &DateRange)
    -> Result<Vec<ServiceSubstitution>, DirectoryError>;

    fn department_headcount(&self, department: &str) -> Result<u32, DirectoryError>;

    fn current_leave_balance(&self, user_id: &str) -> Result<i64, DirectoryError>;
}

/// A [`LeaveDirectory`] over plain vectors, filled up front.
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
    pub profiles: Vec<Profile>,
    pub requests: Vec<LeaveRequest>,
    pub rules: Vec<ConflictRule>,
    pub substitutions: Vec<ServiceSubstitution>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }
    pub fn with_request(mut self, request: LeaveRequest) -> Self {
        self.requests.push(request);
        self
    }
    pub fn with_rule(mut self, rule: ConflictRule) -> Self {
        self.rules.push(rule);
        self
    }
    pub fn with_substitution(mut self, substitution: ServiceSubstitution) -> Self {
        self.substitutions.push(substitution);
        self
    }

    fn department_of(&self, user_id: &str) -> Option<&str> {
        self.profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .map(|p| p.department.as_str())
    }
}

impl LeaveDirectory for MemoryDirectory {
    fn active_conflict_rules(&self, department: &str, range: &DateRange) -> Result<Vec<ConflictRule>, DirectoryError> {
        Ok(self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(department, range))
            .cloned()
            .collect())
    }

    fn overlapping_requests(
        &self,
        department: &str,
        range: &DateRange,
        exclude_id: Option<&str>,
    ) -> Result<Vec<LeaveRequest>, DirectoryError> {
        Ok(self
            .requests
            .iter()
            .filter(|r| self.department_of(r.requester_id()) == Some(department))
            .filter(|r| r.state().counts_as_absence() && r.period().overlaps(range))
            .filter(|r| Some(r.id.as_str()) != exclude_id)
            .cloned()
            .collect())
    }

    fn active_substitutions(
        &self,
        department: &str,
        range: &DateRange,
    ) -> Result<Vec<ServiceSubstitution>, DirectoryError> {
        Ok(self
            .substitutions
            .iter()
            .filter(|sub| sub.covers(department, range))
            .cloned()
            .collect())
    }

    fn department_headcount(&self, department: &str) -> Result<u32, DirectoryError> {
        Ok(self.profiles.iter().filter(|p| p.department == department).count() as u32)
    }

    fn current_leave_balance(&self, user_id: &str) -> Result<i64, DirectoryError> {
        self.profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .map(|p| p.leave_balance)
            .ok_or_else(|| DirectoryError::NotFound {
                kind: "profile",
                id: user_id.to_string(),
            })
    }
}
