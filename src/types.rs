//! Shared value types: roles, workflow states and events, timestamps and dates
use super::error::ValidationError;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    #[n(0)]
    Employee,
    #[n(1)]
    CellManager,
    #[n(2)]
    ServiceChief,
    #[n(3)]
    Hr,
    #[n(4)]
    Admin,
}

/// Ordered from least to most pressing.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    #[n(0)]
    #[default]
    Normal,
    #[n(1)]
    Urgent,
    #[n(2)]
    Emergency,
}

/// Lifecycle of a single leave request.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaveRequestState {
    #[n(0)]
    Draft,
    #[n(1)]
    PendingCellManager,
    #[n(2)]
    PendingServiceChief,
    #[n(3)]
    PendingHr,
    #[n(4)]
    Approved,
    #[n(5)]
    Rejected,
    #[n(6)]
    Cancelled,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaveRequestEvent {
    #[n(0)]
    Submit,
    #[n(1)]
    ApproveN1,
    #[n(2)]
    RejectN1,
    #[n(3)]
    ApproveN2,
    #[n(4)]
    RejectN2,
    #[n(5)]
    ApproveHr,
    #[n(6)]
    RejectHr,
    #[n(7)]
    Cancel,
    // Reserved: no transition row uses it yet.
    #[n(8)]
    ReturnToEmployee,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

/// A calendar date without time of day. Leave ranges are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay(NaiveDate);

/// Inclusive date range with `start <= end`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    #[n(0)]
    start: CalendarDay,
    #[n(1)]
    end: CalendarDay,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Employee,
        Role::CellManager,
        Role::ServiceChief,
        Role::Hr,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::CellManager => "cell_manager",
            Role::ServiceChief => "service_chief",
            Role::Hr => "hr",
            Role::Admin => "admin",
        }
    }
}

impl Urgency {
    pub const ALL: [Urgency; 3] = [Urgency::Normal, Urgency::Urgent, Urgency::Emergency];

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Urgent => "urgent",
            Urgency::Emergency => "emergency",
        }
    }
}

impl LeaveRequestState {
    pub const ALL: [LeaveRequestState; 7] = [
        LeaveRequestState::Draft,
        LeaveRequestState::PendingCellManager,
        LeaveRequestState::PendingServiceChief,
        LeaveRequestState::PendingHr,
        LeaveRequestState::Approved,
        LeaveRequestState::Rejected,
        LeaveRequestState::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveRequestState::Draft => "draft",
            LeaveRequestState::PendingCellManager => "pending_cell_manager",
            LeaveRequestState::PendingServiceChief => "pending_service_chief",
            LeaveRequestState::PendingHr => "pending_hr",
            LeaveRequestState::Approved => "approved",
            LeaveRequestState::Rejected => "rejected",
            LeaveRequestState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeaveRequestState::Approved | LeaveRequestState::Rejected | LeaveRequestState::Cancelled
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            LeaveRequestState::PendingCellManager
                | LeaveRequestState::PendingServiceChief
                | LeaveRequestState::PendingHr
        )
    }

    /// Approved and pending requests are committed or likely absences.
    pub fn counts_as_absence(&self) -> bool {
        self.is_pending() || *self == LeaveRequestState::Approved
    }
}

impl LeaveRequestEvent {
    pub const ALL: [LeaveRequestEvent; 9] = [
        LeaveRequestEvent::Submit,
        LeaveRequestEvent::ApproveN1,
        LeaveRequestEvent::RejectN1,
        LeaveRequestEvent::ApproveN2,
        LeaveRequestEvent::RejectN2,
        LeaveRequestEvent::ApproveHr,
        LeaveRequestEvent::RejectHr,
        LeaveRequestEvent::Cancel,
        LeaveRequestEvent::ReturnToEmployee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveRequestEvent::Submit => "SUBMIT",
            LeaveRequestEvent::ApproveN1 => "APPROVE_N1",
            LeaveRequestEvent::RejectN1 => "REJECT_N1",
            LeaveRequestEvent::ApproveN2 => "APPROVE_N2",
            LeaveRequestEvent::RejectN2 => "REJECT_N2",
            LeaveRequestEvent::ApproveHr => "APPROVE_HR",
            LeaveRequestEvent::RejectHr => "REJECT_HR",
            LeaveRequestEvent::Cancel => "CANCEL",
            LeaveRequestEvent::ReturnToEmployee => "RETURN_TO_EMPLOYEE",
        }
    }

    /// The approval event expected at a pending level, if any.
    pub fn approval_for(state: LeaveRequestState) -> Option<Self> {
        match state {
            LeaveRequestState::PendingCellManager => Some(LeaveRequestEvent::ApproveN1),
            LeaveRequestState::PendingServiceChief => Some(LeaveRequestEvent::ApproveN2),
            LeaveRequestState::PendingHr => Some(LeaveRequestEvent::ApproveHr),
            _ => None,
        }
    }

    /// The rejection event expected at a pending level, if any.
    pub fn rejection_for(state: LeaveRequestState) -> Option<Self> {
        match state {
            LeaveRequestState::PendingCellManager => Some(LeaveRequestEvent::RejectN1),
            LeaveRequestState::PendingServiceChief => Some(LeaveRequestEvent::RejectN2),
            LeaveRequestState::PendingHr => Some(LeaveRequestEvent::RejectHr),
            _ => None,
        }
    }
}

macro_rules! impl_str_conversions {
    ($ty:ty, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| ValidationError::UnknownValue {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_str_conversions!(Role, "role");
impl_str_conversions!(Urgency, "urgency");
impl_str_conversions!(LeaveRequestState, "state");
impl_str_conversions!(LeaveRequestEvent, "event");

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl CalendarDay {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, ValidationError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(CalendarDay)
            .ok_or(ValidationError::InvalidDate { year, month, day })
    }
    pub fn today() -> Self {
        CalendarDay(Utc::now().date_naive())
    }
    pub fn to_naive_date(&self) -> NaiveDate {
        self.0
    }
    pub fn is_working_day(&self) -> bool {
        !matches!(self.0.weekday(), Weekday::Sat | Weekday::Sun)
    }
    /// Saturates at the calendar bounds.
    pub fn add_days(&self, days: u64) -> Self {
        CalendarDay(
            self.0
                .checked_add_days(chrono::Days::new(days))
                .unwrap_or(NaiveDate::MAX),
        )
    }
}

impl From<NaiveDate> for CalendarDay {
    fn from(value: NaiveDate) -> Self {
        CalendarDay(value)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl DateRange {
    pub fn new(start: CalendarDay, end: CalendarDay) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedDateRange { start, end });
        }
        Ok(Self { start, end })
    }
    pub fn single(day: CalendarDay) -> Self {
        Self {
            start: day,
            end: day,
        }
    }
    pub fn start(&self) -> CalendarDay {
        self.start
    }
    pub fn end(&self) -> CalendarDay {
        self.end
    }
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
    /// Monday to Friday days inside the range, both ends included.
    pub fn working_days(&self) -> u32 {
        let span = (self.end.0 - self.start.0).num_days() + 1;
        let first = i64::from(self.start.0.weekday().num_days_from_monday());
        // whole weeks hold five working days, the leftover days start on `first`
        let leftover = (0..span % 7).filter(|i| (first + i) % 7 < 5).count() as i64;

        u32::try_from(span / 7 * 5 + leftover).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

// days since 0001-01-01, the same count chrono exposes
impl<C> minicbor::Encode<C> for CalendarDay {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for CalendarDay {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(CalendarDay)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert day count to a calendar date",
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn persisted_state_strings() {
        for state in LeaveRequestState::ALL {
            assert_eq!(state.as_str().parse::<LeaveRequestState>().unwrap(), state);
        }
        assert!("pending".parse::<LeaveRequestState>().is_err());
        assert_eq!("cell_manager".parse::<Role>().unwrap(), Role::CellManager);
    }

    #[test]
    fn working_days_match_a_day_by_day_count() {
        let monday = CalendarDay::from_ymd(2026, 1, 5).unwrap();
        for offset in 0..7 {
            let start = monday.add_days(offset);
            for length in 0..40 {
                let range = DateRange::new(start, start.add_days(length)).unwrap();
                let walked = (0..=length)
                    .filter(|d| start.add_days(*d).is_working_day())
                    .count() as u32;
                assert_eq!(range.working_days(), walked, "{range}");
            }
        }
    }

    #[test]
    fn working_days_over_the_whole_calendar() {
        let range = DateRange::new(CalendarDay::from(NaiveDate::MIN), CalendarDay::from(NaiveDate::MAX)).unwrap();
        let span = (NaiveDate::MAX - NaiveDate::MIN).num_days() + 1;

        assert!(i64::from(range.working_days()) > span / 7 * 5 - 1);
    }

    #[test]
    fn working_days_skip_weekends() {
        // 2026-03-06 is a Friday
        let friday = CalendarDay::from_ymd(2026, 3, 6).unwrap();
        let tuesday = CalendarDay::from_ymd(2026, 3, 10).unwrap();
        let range = DateRange::new(friday, tuesday).unwrap();

        assert_eq!(range.working_days(), 3);
        assert_eq!(DateRange::single(friday).working_days(), 1);
        assert_eq!(DateRange::single(friday.add_days(1)).working_days(), 0);
    }

    #[test]
    fn ranges_overlap_inclusively() {
        let a = DateRange::new(
            CalendarDay::from_ymd(2026, 3, 2).unwrap(),
            CalendarDay::from_ymd(2026, 3, 6).unwrap(),
        )
        .unwrap();
        let b = DateRange::single(CalendarDay::from_ymd(2026, 3, 6).unwrap());
        let c = DateRange::single(CalendarDay::from_ymd(2026, 3, 7).unwrap());

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }
}
