use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::{UserId, UserRole};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub fn generate() -> Self {
        Self(format!("step-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sign-off tiers a contract can be routed through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRole {
    Manager,
    Legal,
    Finance,
    Director,
    Ceo,
}

impl ApproverRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::Manager => "Quản lý phòng ban",
            Self::Legal => "Phòng Pháp chế",
            Self::Finance => "Phòng Tài chính",
            Self::Director => "Giám đốc",
            Self::Ceo => "Tổng giám đốc",
        }
    }

    /// Directory role that may resolve this tier regardless of hierarchy level.
    pub fn intended_user_role(self) -> UserRole {
        match self {
            Self::Manager => UserRole::Manager,
            Self::Legal => UserRole::Legal,
            Self::Finance => UserRole::Finance,
            Self::Director => UserRole::Director,
            Self::Ceo => UserRole::Ceo,
        }
    }
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Upper bound of contract value an approval tier covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValueThreshold {
    UpTo(Decimal),
    Unbounded,
}

impl ValueThreshold {
    pub fn covers(&self, value: Decimal) -> bool {
        match self {
            Self::UpTo(limit) => value <= *limit,
            Self::Unbounded => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Approve,
    Reject,
}

impl StepAction {
    pub fn resulting_status(self) -> StepStatus {
        match self {
            Self::Approve => StepStatus::Approved,
            Self::Reject => StepStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: StepId,
    pub step_number: u32,
    pub approver_role: ApproverRole,
    pub required_hierarchy_level: u8,
    pub contract_value_threshold: Option<ValueThreshold>,
    pub status: StepStatus,
    pub approver_id: Option<UserId>,
    pub approver_name: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub time_spent_minutes: Option<u32>,
}

impl ApprovalStep {
    pub fn pending(
        step_number: u32,
        approver_role: ApproverRole,
        required_hierarchy_level: u8,
        contract_value_threshold: Option<ValueThreshold>,
    ) -> Self {
        Self {
            id: StepId::generate(),
            step_number,
            approver_role,
            required_hierarchy_level,
            contract_value_threshold,
            status: StepStatus::Pending,
            approver_id: None,
            approver_name: None,
            approved_at: None,
            comments: None,
            time_spent_minutes: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{ApprovalStep, ApproverRole, StepStatus, ValueThreshold};

    #[test]
    fn thresholds_cover_values_up_to_their_limit() {
        let limit = ValueThreshold::UpTo(Decimal::from(50_000_000));
        assert!(limit.covers(Decimal::from(50_000_000)));
        assert!(!limit.covers(Decimal::from(50_000_001)));
        assert!(ValueThreshold::Unbounded.covers(Decimal::MAX));
    }

    #[test]
    fn steps_serialize_with_tagged_thresholds() {
        let step = ApprovalStep::pending(5, ApproverRole::Ceo, 4, Some(ValueThreshold::Unbounded));
        let value = serde_json::to_value(&step).expect("serialize step");

        assert_eq!(value["approver_role"], json!("ceo"));
        assert_eq!(value["status"], json!("pending"));
        assert_eq!(value["contract_value_threshold"], json!({ "kind": "unbounded" }));

        let restored: ApprovalStep = serde_json::from_value(value).expect("deserialize step");
        assert_eq!(restored, step);
        assert_eq!(restored.status, StepStatus::Pending);
    }
}
