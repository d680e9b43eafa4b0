//! Core type definitions with validation.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors raised at the mutation boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A clock time was not a valid 24-hour `HH:MM`.
    #[error("invalid time {value:?}: expected 24-hour HH:MM")]
    InvalidClockTime { value: String },

    /// A check-out was supplied for a session without a check-in.
    #[error("check-out requires a check-in")]
    CheckOutWithoutCheckIn,

    /// Check-out is earlier than check-in.
    #[error("check-out {check_out} is before check-in {check_in}")]
    CheckOutBeforeCheckIn { check_in: String, check_out: String },

    /// A session timestamp falls on another date than the session's work date.
    #[error("{field} {at} is not on work date {work_date}")]
    OutsideWorkDate {
        field: &'static str,
        at: String,
        work_date: NaiveDate,
    },

    /// A work-unit value was negative, non-finite or otherwise out of range.
    #[error("invalid {field}: {value}")]
    InvalidUnits { field: &'static str, value: f64 },

    /// Month outside 1..=12 or a year chrono cannot represent.
    #[error("invalid month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    /// Unknown enum string.
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// The session is not in a state that allows the operation.
    #[error("session {session_id} is {status}, expected {expected}")]
    SessionState {
        session_id: String,
        status: SessionStatus,
        expected: SessionStatus,
    },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Identifies an employee whose attendance is tracked.
    UserId, "user ID"
);

define_string_id!(
    /// Identifies the administrator performing an audited mutation.
    AdminId, "admin ID"
);

define_string_id!(
    /// Identifies one attendance session (one check-in/check-out cycle).
    SessionId, "session ID"
);

impl SessionId {
    /// Synthetic id for a date without a stored session.
    pub(crate) fn placeholder(user_id: &UserId, date: NaiveDate) -> Self {
        Self(format!("{user_id}:{date}"))
    }
}

/// Lifecycle state of an attendance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    NotCheckedIn,
    Open,
    Closed,
    Missing,
}

impl SessionStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotCheckedIn => "NOT_CHECKED_IN",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Missing => "MISSING",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_CHECKED_IN" => Ok(Self::NotCheckedIn),
            "OPEN" => Ok(Self::Open),
            "CLOSED" => Ok(Self::Closed),
            "MISSING" => Ok(Self::Missing),
            _ => Err(ValidationError::InvalidValue {
                field: "session status",
                value: s.to_string(),
            }),
        }
    }
}

/// A calendar month, validated on construction. Serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(ValidationError::InvalidMonth { year, month });
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month.
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        let first = self.first_day();
        first
            .checked_add_months(chrono::Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(first)
    }

    /// Every date of the month in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let last = self.last_day();
        self.first_day().iter_days().take_while(move |d| *d <= last)
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for YearMonth {
    type Err = ValidationError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidValue {
            field: "month",
            value: s.to_string(),
        };
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(period: YearMonth) -> Self {
        period.to_string()
    }
}

/// Key of one monthly summary: the unit of serialization for mutations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SummaryKey {
    pub user_id: UserId,
    pub period: YearMonth,
}

impl SummaryKey {
    #[must_use]
    pub const fn new(user_id: UserId, period: YearMonth) -> Self {
        Self { user_id, period }
    }
}

impl fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.period)
    }
}

/// Requires a non-blank audit reason and returns it trimmed.
pub fn require_reason(reason: &str) -> Result<&str, ValidationError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: "reason" });
    }
    Ok(trimmed)
}

/// Rejects negative and non-finite unit values.
pub fn require_units(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidUnits { field, value });
    }
    Ok(value)
}

/// Rounds a work-unit value to one decimal, half away from zero.
#[must_use]
pub fn round_units(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    // -0.0 would serialize differently from 0.0
    if rounded.abs() < f64::EPSILON { 0.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_reject_blank_values() {
        assert_eq!(
            UserId::new("  ").unwrap_err(),
            ValidationError::Empty { field: "user ID" }
        );
        assert_eq!(UserId::new("u-1").unwrap().as_str(), "u-1");
    }

    #[test]
    fn session_status_parses_storage_strings() {
        for status in [
            SessionStatus::NotCheckedIn,
            SessionStatus::Open,
            SessionStatus::Closed,
            SessionStatus::Missing,
        ] {
            let parsed: SessionStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("closed".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn year_month_bounds() {
        let feb = YearMonth::new(2024, 2).unwrap();
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(feb.days().count(), 29);
        assert!(YearMonth::new(2024, 13).is_err());
        assert_eq!("2025-03".parse::<YearMonth>().unwrap().to_string(), "2025-03");
        assert!("2025/03".parse::<YearMonth>().is_err());
    }

    #[test]
    fn reason_must_not_be_blank() {
        assert!(require_reason("   ").is_err());
        assert_eq!(require_reason(" forgot badge ").unwrap(), "forgot badge");
    }

    #[test]
    fn rounding_is_half_up_to_one_decimal() {
        assert!((round_units(0.25) - 0.3).abs() < f64::EPSILON);
        assert!((round_units(1.04) - 1.0).abs() < f64::EPSILON);
        assert_eq!(round_units(-0.01).to_bits(), 0.0_f64.to_bits());
    }
}
