//! sled backed persistence for requests, profiles, conflict rules and substitutions
//!
//! Everything lives in the default tree, CBOR encoded, under a per-kind key
//! prefix. Writes that touch more than one record go through a single
//! sled transaction.
use super::config::Config;
use super::conflict::{ConflictRule, ServiceSubstitution};
use super::directory::{LeaveDirectory, Profile};
use super::error::DirectoryError;
use super::request::LeaveRequest;
use super::types::{DateRange, LeaveRequestState};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const REQUEST_PREFIX: &str = "request/";
const RULE_PREFIX: &str = "rule/";
const SUBSTITUTION_PREFIX: &str = "subst/";
const PROFILE_PREFIX: &str = "profile/";

fn key(prefix: &str, id: &str) -> Vec<u8> {
    format!("{prefix}{id}").into_bytes()
}

fn encode<T: minicbor::Encode<()>>(kind: &'static str, value: &T) -> Result<Vec<u8>, DirectoryError> {
    minicbor::to_vec(value).map_err(|e| DirectoryError::Codec {
        kind,
        reason: e.to_string(),
    })
}

fn decode<T>(kind: &'static str, bytes: &[u8]) -> Result<T, DirectoryError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| DirectoryError::Codec {
        kind,
        reason: e.to_string(),
    })
}

pub struct LeaveStore {
    instance: Arc<sled::Db>,
}

impl LeaveStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        Ok(Self::new(Arc::new(sled::open(path)?)))
    }

    pub fn from_config(config: &Config) -> Result<Self, DirectoryError> {
        Self::open(&config.database_path)
    }

    fn get<T>(&self, kind: &'static str, prefix: &str, id: &str) -> Result<Option<T>, DirectoryError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        self.instance
            .get(key(prefix, id))?
            .map(|bytes| decode(kind, &bytes))
            .transpose()
    }

    fn scan<T>(&self, kind: &'static str, prefix: &str) -> Result<Vec<T>, DirectoryError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        self.instance
            .scan_prefix(prefix.as_bytes())
            .map(|entry| {
                let (_, bytes) = entry?;
                decode(kind, &bytes)
            })
            .collect()
    }

    fn put<T: minicbor::Encode<()>>(
        &self,
        kind: &'static str,
        prefix: &str,
        id: &str,
        value: &T,
    ) -> Result<(), DirectoryError> {
        self.instance.insert(key(prefix, id), encode(kind, value)?)?;
        Ok(())
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<(), DirectoryError> {
        self.put("profile", PROFILE_PREFIX, &profile.user_id, profile)
    }

    pub fn profile(&self, user_id: &str) -> Result<Option<Profile>, DirectoryError> {
        self.get("profile", PROFILE_PREFIX, user_id)
    }

    pub fn require_profile(&self, user_id: &str) -> Result<Profile, DirectoryError> {
        self.profile(user_id)?.ok_or_else(|| DirectoryError::NotFound {
            kind: "profile",
            id: user_id.to_string(),
        })
    }

    pub fn profiles_in_department(&self, department: &str) -> Result<Vec<Profile>, DirectoryError> {
        let profiles: Vec<Profile> = self.scan("profile", PROFILE_PREFIX)?;
        Ok(profiles
            .into_iter()
            .filter(|p| p.department == department)
            .collect())
    }

    pub fn save_request(&self, request: &LeaveRequest) -> Result<(), DirectoryError> {
        self.put("leave request", REQUEST_PREFIX, &request.id, request)
    }

    pub fn load_request(&self, id: &str) -> Result<LeaveRequest, DirectoryError> {
        self.get("leave request", REQUEST_PREFIX, id)?
            .ok_or_else(|| DirectoryError::NotFound {
                kind: "leave request",
                id: id.to_string(),
            })
    }

    pub fn requests(&self) -> Result<Vec<LeaveRequest>, DirectoryError> {
        self.scan("leave request", REQUEST_PREFIX)
    }

    pub fn requests_in_state(&self, state: LeaveRequestState) -> Result<Vec<LeaveRequest>, DirectoryError> {
        Ok(self
            .requests()?
            .into_iter()
            .filter(|r| r.state() == state)
            .collect())
    }

    /// Persist `request` and take `days` off the requester's balance in one
    /// transaction. Returns the remaining balance, which may be negative.
    pub fn save_request_and_debit(&self, request: &LeaveRequest, days: u32) -> Result<i64, DirectoryError> {
        let profile_key = key(PROFILE_PREFIX, request.requester_id());
        let request_key = key(REQUEST_PREFIX, &request.id);
        let request_bytes = encode("leave request", request)?;

        // sled retries the closure when another writer touched the profile
        let profile = self
            .instance
            .transaction(|tx| -> ConflictableTransactionResult<Profile, DirectoryError> {
                let bytes = tx.get(&profile_key)?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(DirectoryError::NotFound {
                        kind: "profile",
                        id: request.requester_id().to_string(),
                    })
                })?;
                let mut profile: Profile =
                    decode("profile", &bytes).map_err(ConflictableTransactionError::Abort)?;
                profile.leave_balance -= i64::from(days);

                let encoded = encode("profile", &profile).map_err(ConflictableTransactionError::Abort)?;
                tx.insert(profile_key.clone(), encoded)?;
                tx.insert(request_key.clone(), request_bytes.clone())?;
                Ok(profile)
            })
            .map_err(|err| match err {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => DirectoryError::Storage(err),
            })?;

        if profile.leave_balance < 0 {
            warn!(
                user = %profile.user_id,
                balance = profile.leave_balance,
                days,
                "approved days exceed the leave balance"
            );
        }
        debug!(user = %profile.user_id, remaining = profile.leave_balance, "leave balance debited");
        Ok(profile.leave_balance)
    }

    pub fn save_rule(&self, rule: &ConflictRule) -> Result<(), DirectoryError> {
        self.put("conflict rule", RULE_PREFIX, &rule.id, rule)
    }

    pub fn set_rule_active(&self, rule_id: &str, active: bool) -> Result<ConflictRule, DirectoryError> {
        let mut rule: ConflictRule =
            self.get("conflict rule", RULE_PREFIX, rule_id)?
                .ok_or_else(|| DirectoryError::NotFound {
                    kind: "conflict rule",
                    id: rule_id.to_string(),
                })?;
        rule.is_active = active;
        self.save_rule(&rule)?;
        Ok(rule)
    }

    /// Active and inactive rules of a department.
    pub fn rules_for_department(&self, department: &str) -> Result<Vec<ConflictRule>, DirectoryError> {
        let rules: Vec<ConflictRule> = self.scan("conflict rule", RULE_PREFIX)?;
        Ok(rules
            .into_iter()
            .filter(|rule| rule.department == department)
            .collect())
    }

    pub fn save_substitution(&self, substitution: &ServiceSubstitution) -> Result<(), DirectoryError> {
        self.put("substitution", SUBSTITUTION_PREFIX, &substitution.id, substitution)
    }

    /// Returns whether a substitution was removed.
    pub fn delete_substitution(&self, id: &str) -> Result<bool, DirectoryError> {
        Ok(self.instance.remove(key(SUBSTITUTION_PREFIX, id))?.is_some())
    }

    /// Substitutions where `user_id` is either side, latest start first.
    pub fn substitutions_for_user(&self, user_id: &str) -> Result<Vec<ServiceSubstitution>, DirectoryError> {
        let mut subs: Vec<ServiceSubstitution> = self
            .scan::<ServiceSubstitution>("substitution", SUBSTITUTION_PREFIX)?
            .into_iter()
            .filter(|s| s.original_user_id == user_id || s.substitute_user_id == user_id)
            .collect();
        subs.sort_by(|a, b| b.period.start().cmp(&a.period.start()));
        Ok(subs)
    }
}

impl LeaveDirectory for LeaveStore {
    fn active_conflict_rules(&self, department: &str, range: &DateRange) -> Result<Vec<ConflictRule>, DirectoryError> {
        Ok(self
            .rules_for_department(department)?
            .into_iter()
            .filter(|rule| rule.applies_to(department, range))
            .collect())
    }

    fn overlapping_requests(
        &self,
        department: &str,
        range: &DateRange,
        exclude_id: Option<&str>,
    ) -> Result<Vec<LeaveRequest>, DirectoryError> {
        let members: Vec<String> = self
            .profiles_in_department(department)?
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        if members.is_empty() {
            return Ok(vec![]);
        }

        Ok(self
            .requests()?
            .into_iter()
            .filter(|r| members.iter().any(|m| m == r.requester_id()))
            .filter(|r| r.state().counts_as_absence() && r.period().overlaps(range))
            .filter(|r| Some(r.id.as_str()) != exclude_id)
            .collect())
    }

    fn active_substitutions(
        &self,
        department: &str,
        range: &DateRange,
    ) -> Result<Vec<ServiceSubstitution>, DirectoryError> {
        let subs: Vec<ServiceSubstitution> = self.scan("substitution", SUBSTITUTION_PREFIX)?;
        Ok(subs
            .into_iter()
            .filter(|s| s.covers(department, range))
            .collect())
    }

    fn department_headcount(&self, department: &str) -> Result<u32, DirectoryError> {
        Ok(self.profiles_in_department(department)?.len() as u32)
    }

    fn current_leave_balance(&self, user_id: &str) -> Result<i64, DirectoryError> {
        Ok(self.require_profile(user_id)?.leave_balance)
    }
}
