//! Audit records of admin mutations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AdminId, ValidationError};

/// Kind of admin mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Close,
    Adjust,
    Recalculate,
    Grant,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Close => "CLOSE",
            Self::Adjust => "ADJUST",
            Self::Recalculate => "RECALCULATE",
            Self::Grant => "GRANT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "CLOSE" => Ok(Self::Close),
            "ADJUST" => Ok(Self::Adjust),
            "RECALCULATE" => Ok(Self::Recalculate),
            "GRANT" => Ok(Self::Grant),
            _ => Err(ValidationError::InvalidValue {
                field: "audit action",
                value: s.to_string(),
            }),
        }
    }
}

/// Kind of entity an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    AttendanceSession,
    LeaveMonthlySummary,
    LeaveGrant,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AttendanceSession => "attendance_session",
            Self::LeaveMonthlySummary => "leave_monthly_summary",
            Self::LeaveGrant => "leave_grant",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attendance_session" => Ok(Self::AttendanceSession),
            "leave_monthly_summary" => Ok(Self::LeaveMonthlySummary),
            "leave_grant" => Ok(Self::LeaveGrant),
            _ => Err(ValidationError::InvalidValue {
                field: "entity type",
                value: s.to_string(),
            }),
        }
    }
}

/// Immutable record of one admin mutation, written with the mutation itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Assigned by storage; `None` until written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub admin_user_id: AdminId,
    pub action_type: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub before_json: Option<serde_json::Value>,
    pub after_json: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Snapshots `before` and `after` as JSON.
    pub fn record<B: Serialize, A: Serialize>(
        admin_user_id: &AdminId,
        action_type: AuditAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        before: Option<&B>,
        after: Option<&A>,
        reason: Option<&str>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: None,
            admin_user_id: admin_user_id.clone(),
            action_type,
            entity_type,
            entity_id: entity_id.into(),
            before_json: before.map(serde_json::to_value).transpose()?,
            after_json: after.map(serde_json::to_value).transpose()?,
            reason: reason.map(str::to_string),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_strings_round_trip_through_storage_names() {
        assert_eq!("RECALCULATE".parse::<AuditAction>().unwrap(), AuditAction::Recalculate);
        assert_eq!(AuditAction::Grant.to_string(), "GRANT");
        assert!("adjust".parse::<AuditAction>().is_err());
        assert_eq!(
            "leave_grant".parse::<EntityType>().unwrap(),
            EntityType::LeaveGrant
        );
    }

    #[test]
    fn record_snapshots_both_sides() {
        let admin = AdminId::new("root").unwrap();
        let entry = AuditLogEntry::record(
            &admin,
            AuditAction::Adjust,
            EntityType::LeaveMonthlySummary,
            "u-1/2025-03",
            Some(&json!({"paidUsedUnits": 1.0})),
            Some(&json!({"paidUsedUnits": 2.0})),
            Some("carry-over"),
        )
        .unwrap();
        assert_eq!(entry.after_json.unwrap()["paidUsedUnits"], json!(2.0));
        assert_eq!(entry.before_json.unwrap()["paidUsedUnits"], json!(1.0));
        assert_eq!(entry.reason.as_deref(), Some("carry-over"));
        assert!(entry.id.is_none());
    }
}
