use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::contract::Contract;
use crate::domain::reminder::{ContractReminder, ReminderId, ReminderKind};
use crate::errors::{ValidationFailure, WorkflowError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    pub kind: ReminderKind,
    pub reminder_date: NaiveDate,
    pub message: String,
}

impl Contract {
    pub fn add_reminder(&mut self, reminder: NewReminder) -> Result<&ContractReminder, WorkflowError> {
        let message = reminder.message.trim();
        if message.is_empty() {
            return Err(ValidationFailure::EmptyField { field: "message" }.into());
        }

        self.reminders.push(ContractReminder {
            id: ReminderId::generate(),
            contract_id: self.id.clone(),
            kind: reminder.kind,
            reminder_date: reminder.reminder_date,
            message: message.to_string(),
            is_active: true,
        });
        Ok(&self.reminders[self.reminders.len() - 1])
    }

    pub fn remove_reminder(&mut self, id: &ReminderId) -> Result<ContractReminder, WorkflowError> {
        let index = self.reminder_index(id)?;
        Ok(self.reminders.remove(index))
    }

    pub fn deactivate_reminder(&mut self, id: &ReminderId) -> Result<(), WorkflowError> {
        let index = self.reminder_index(id)?;
        self.reminders[index].is_active = false;
        Ok(())
    }

    /// Active reminders dated on or before `today`.
    pub fn due_reminders(&self, today: NaiveDate) -> Vec<&ContractReminder> {
        self.reminders
            .iter()
            .filter(|reminder| reminder.is_active && reminder.reminder_date <= today)
            .collect()
    }

    /// Adds an expiry reminder `lead_days` before the expiry date unless one exists.
    pub fn schedule_expiry_reminder(&mut self, lead_days: u32) -> Option<&ContractReminder> {
        let expiry_date = self.expiry_date?;
        if self.reminders.iter().any(|reminder| reminder.kind == ReminderKind::Expiry) {
            return None;
        }

        let reminder_date =
            expiry_date.checked_sub_days(Days::new(u64::from(lead_days))).unwrap_or(expiry_date);
        let message = format!("Hợp đồng \"{}\" hết hạn vào {}", self.title, expiry_date);
        self.add_reminder(NewReminder { kind: ReminderKind::Expiry, reminder_date, message }).ok()
    }

    fn reminder_index(&self, id: &ReminderId) -> Result<usize, WorkflowError> {
        self.reminders
            .iter()
            .position(|reminder| &reminder.id == id)
            .ok_or_else(|| ValidationFailure::UnknownReminder { reminder_id: id.0.clone() }.into())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::NewReminder;
    use crate::domain::contract::Priority;
    use crate::domain::reminder::{ReminderId, ReminderKind};
    use crate::errors::{ValidationFailure, WorkflowError};
    use crate::test_support::draft_contract;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn due_reminders_include_today_and_skip_inactive() {
        let mut contract = draft_contract(Priority::Medium, None);
        let first = contract
            .add_reminder(NewReminder {
                kind: ReminderKind::Review,
                reminder_date: date(2026, 6, 1),
                message: "Rà soát điều khoản".to_string(),
            })
            .expect("reminder")
            .id
            .clone();
        contract
            .add_reminder(NewReminder {
                kind: ReminderKind::Renewal,
                reminder_date: date(2026, 6, 2),
                message: "Gia hạn".to_string(),
            })
            .expect("reminder");

        assert_eq!(contract.due_reminders(date(2026, 6, 1)).len(), 1);
        assert_eq!(contract.due_reminders(date(2026, 6, 2)).len(), 2);

        contract.deactivate_reminder(&first).expect("deactivate");
        assert_eq!(contract.due_reminders(date(2026, 6, 2)).len(), 1);
    }

    #[test]
    fn blank_messages_and_unknown_ids_are_rejected() {
        let mut contract = draft_contract(Priority::Medium, None);
        let error = contract
            .add_reminder(NewReminder {
                kind: ReminderKind::Expiry,
                reminder_date: date(2026, 6, 1),
                message: "  ".to_string(),
            })
            .expect_err("blank message");
        assert_eq!(error, WorkflowError::Validation(ValidationFailure::EmptyField { field: "message" }));

        let missing = contract
            .remove_reminder(&ReminderId("r-missing".to_string()))
            .expect_err("unknown reminder");
        assert!(matches!(missing, WorkflowError::Validation(ValidationFailure::UnknownReminder { .. })));
    }

    #[test]
    fn expiry_reminder_is_scheduled_once() {
        let mut contract = draft_contract(Priority::Medium, None);
        contract.expiry_date = Some(date(2026, 12, 31));

        let scheduled = contract.schedule_expiry_reminder(30).map(|reminder| reminder.reminder_date);
        assert_eq!(scheduled, Some(date(2026, 12, 1)));
        assert!(contract.schedule_expiry_reminder(30).is_none());
        assert_eq!(contract.reminders.len(), 1);
    }
}
