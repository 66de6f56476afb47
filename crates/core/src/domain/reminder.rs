use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::contract::ContractId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderId(pub String);

impl ReminderId {
    pub fn generate() -> Self {
        Self(format!("r-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Expiry,
    Renewal,
    Review,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractReminder {
    pub id: ReminderId,
    pub contract_id: ContractId,
    pub kind: ReminderKind,
    pub reminder_date: NaiveDate,
    pub message: String,
    pub is_active: bool,
}
