use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contract::{Contract, Money, Priority};
use crate::domain::user::User;
use crate::errors::{
    AuthorizationFailure, DomainError, InvalidStateFailure, ValidationFailure, WorkflowError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Edited,
    Approved,
    Rejected,
    Signed,
}

/// Immutable snapshot of a contract's editable content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVersion {
    pub version: u32,
    pub title: String,
    pub content: String,
    pub changes: String,
    pub change_type: ChangeType,
    pub changed_fields: Vec<String>,
    pub previous_version: Option<u32>,
    pub created_by: String,
    pub created_by_role: String,
    pub created_at: DateTime<Utc>,
    pub file_size: Option<u64>,
    pub checksum: Option<String>,
    pub change_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewVersion {
    pub title: String,
    pub content: String,
    pub changes: String,
    pub change_type: ChangeType,
    pub changed_fields: Vec<String>,
    pub created_by: String,
    pub created_by_role: String,
    /// Size of the source document when it differs from the stored content.
    pub file_size: Option<u64>,
    pub change_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub contract_value: Option<Money>,
    pub expiry_date: Option<NaiveDate>,
    pub renewal_date: Option<NaiveDate>,
    pub change_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub from_version: u32,
    pub to_version: u32,
    pub title_changed: bool,
    pub content_changed: bool,
    pub added_lines: usize,
    pub removed_lines: usize,
}

pub fn content_checksum(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

impl Contract {
    pub fn append_version(&mut self, new_version: NewVersion) -> &ContractVersion {
        let previous_version = self.versions.last().map(|version| version.version);
        let number = u32::try_from(self.versions.len()).unwrap_or(u32::MAX).saturating_add(1);
        let file_size =
            new_version.file_size.or_else(|| u64::try_from(new_version.content.len()).ok());

        self.versions.push(ContractVersion {
            version: number,
            checksum: Some(content_checksum(&new_version.content)),
            title: new_version.title,
            content: new_version.content,
            changes: new_version.changes,
            change_type: new_version.change_type,
            changed_fields: new_version.changed_fields,
            previous_version,
            created_by: new_version.created_by,
            created_by_role: new_version.created_by_role,
            created_at: Utc::now(),
            file_size,
            change_reason: new_version.change_reason,
        });
        self.current_version = number;

        &self.versions[self.versions.len() - 1]
    }

    pub fn find_version(&self, version: u32) -> Option<&ContractVersion> {
        self.versions.iter().find(|candidate| candidate.version == version)
    }

    /// Applies metadata in place; title or content changes append an `Edited` version.
    pub fn apply_edit(
        &mut self,
        edit: ContractEdit,
        editor: &User,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, WorkflowError> {
        if !self.can_edit(editor) {
            return Err(AuthorizationFailure::EditNotPermitted {
                user_id: editor.id.0.clone(),
                status: self.status,
            }
            .into());
        }

        let routing_changed = edit.priority.is_some_and(|priority| priority != self.priority)
            || edit
                .contract_value
                .as_ref()
                .is_some_and(|value| Some(value) != self.contract_value.as_ref());
        if routing_changed && self.approval_started() {
            return Err(
                InvalidStateFailure::ApprovalAlreadyStarted { contract_id: self.id.0.clone() }.into()
            );
        }
        if edit.title.as_ref().is_some_and(|title| title.trim().is_empty()) {
            return Err(ValidationFailure::EmptyField { field: "title" }.into());
        }

        if let Some(description) = edit.description {
            self.description = description;
        }
        if let Some(priority) = edit.priority {
            self.priority = priority;
        }
        if let Some(contract_value) = edit.contract_value {
            self.contract_value = Some(contract_value);
        }
        if let Some(expiry_date) = edit.expiry_date {
            self.expiry_date = Some(expiry_date);
        }
        if let Some(renewal_date) = edit.renewal_date {
            self.renewal_date = Some(renewal_date);
        }

        let mut changed_fields = Vec::new();
        let title = match edit.title {
            Some(title) if title != self.title => {
                changed_fields.push("title".to_string());
                title
            }
            _ => self.title.clone(),
        };
        let content = match edit.content {
            Some(content) if content != self.current_content() => {
                changed_fields.push("content".to_string());
                content
            }
            _ => self.current_content().to_string(),
        };

        self.touch(&editor.name, now);
        if changed_fields.is_empty() {
            return Ok(None);
        }

        self.title = title.clone();
        if let Some(info) = self.extracted_info.as_mut() {
            info.full_text = content.clone();
        }
        let edit_number = self.versions.len();
        let appended = self.append_version(NewVersion {
            title,
            content,
            changes: format!("edit #{edit_number}: updated {}", changed_fields.join(", ")),
            change_type: ChangeType::Edited,
            changed_fields,
            created_by: editor.name.clone(),
            created_by_role: editor.role.to_string(),
            file_size: None,
            change_reason: edit.change_reason,
        });

        Ok(Some(appended.version))
    }

    /// Restores an earlier version by appending a copy of it.
    pub fn restore_version(
        &mut self,
        version: u32,
        editor: &User,
        now: DateTime<Utc>,
    ) -> Result<u32, WorkflowError> {
        if !self.can_edit(editor) {
            return Err(AuthorizationFailure::EditNotPermitted {
                user_id: editor.id.0.clone(),
                status: self.status,
            }
            .into());
        }

        let source =
            self.find_version(version).cloned().ok_or(ValidationFailure::UnknownVersion { version })?;

        self.title = source.title.clone();
        if let Some(info) = self.extracted_info.as_mut() {
            info.full_text = source.content.clone();
        }
        self.touch(&editor.name, now);
        let appended = self.append_version(NewVersion {
            title: source.title,
            content: source.content,
            changes: format!("restored from version {version}"),
            change_type: ChangeType::Edited,
            changed_fields: vec!["title".to_string(), "content".to_string()],
            created_by: editor.name.clone(),
            created_by_role: editor.role.to_string(),
            file_size: source.file_size,
            change_reason: Some(format!("restore of version {version}")),
        });

        Ok(appended.version)
    }

    pub fn compare_versions(&self, from: u32, to: u32) -> Result<VersionComparison, WorkflowError> {
        let older =
            self.find_version(from).ok_or(ValidationFailure::UnknownVersion { version: from })?;
        let newer = self.find_version(to).ok_or(ValidationFailure::UnknownVersion { version: to })?;

        let mut remaining: HashMap<&str, usize> = HashMap::new();
        for line in older.content.lines() {
            *remaining.entry(line).or_default() += 1;
        }

        let mut added_lines = 0;
        for line in newer.content.lines() {
            match remaining.get_mut(line) {
                Some(count) if *count > 0 => *count -= 1,
                _ => added_lines += 1,
            }
        }
        let removed_lines = remaining.values().sum();

        Ok(VersionComparison {
            from_version: from,
            to_version: to,
            title_changed: older.title != newer.title,
            content_changed: older.checksum != newer.checksum,
            added_lines,
            removed_lines,
        })
    }

    pub fn verify_version_chain(&self) -> Result<(), DomainError> {
        for (index, version) in self.versions.iter().enumerate() {
            let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if version.version != expected {
                return Err(DomainError::InvariantViolation(format!(
                    "contract `{}` has version {} at position {expected}",
                    self.id, version.version
                )));
            }
        }

        let highest = self.versions.last().map(|version| version.version).unwrap_or(0);
        if self.current_version != highest {
            return Err(DomainError::InvariantViolation(format!(
                "contract `{}` points at version {} but the latest is {highest}",
                self.id, self.current_version
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::approval::{ApprovalStep, ApproverRole, StepStatus};
    use crate::domain::contract::{ContractStatus, Money, Priority};
    use crate::domain::user::{User, UserRole};
    use crate::domain::version::{content_checksum, ChangeType, ContractEdit};
    use crate::errors::{AuthorizationFailure, InvalidStateFailure, ValidationFailure, WorkflowError};
    use crate::test_support::draft_contract;

    fn employee() -> User {
        User::with_role("u-3", "Nhân viên", "employee@company.com", UserRole::Employee)
    }

    #[test]
    fn content_edit_appends_a_contiguous_version() {
        let mut contract = draft_contract(Priority::Medium, None);
        let appended = contract
            .apply_edit(
                ContractEdit {
                    content: Some("Điều 1. Phạm vi công việc (sửa đổi)".to_string()),
                    ..ContractEdit::default()
                },
                &employee(),
                Utc::now(),
            )
            .expect("edit draft");

        assert_eq!(appended, Some(2));
        assert_eq!(contract.current_version, 2);
        let latest = contract.latest_version().expect("latest version");
        assert_eq!(latest.change_type, ChangeType::Edited);
        assert_eq!(latest.changed_fields, vec!["content".to_string()]);
        assert_eq!(latest.previous_version, Some(1));
        assert_eq!(
            latest.checksum.as_deref(),
            Some(content_checksum("Điều 1. Phạm vi công việc (sửa đổi)").as_str())
        );
        assert_eq!(contract.versions[0].content, "Điều 1. Phạm vi công việc");
        contract.verify_version_chain().expect("chain stays contiguous");
    }

    #[test]
    fn metadata_edit_does_not_create_a_version() {
        let mut contract = draft_contract(Priority::Medium, None);
        let appended = contract
            .apply_edit(
                ContractEdit {
                    description: Some("Cập nhật mô tả".to_string()),
                    priority: Some(Priority::High),
                    ..ContractEdit::default()
                },
                &employee(),
                Utc::now(),
            )
            .expect("edit draft");

        assert_eq!(appended, None);
        assert_eq!(contract.current_version, 1);
        assert_eq!(contract.priority, Priority::High);
        assert_eq!(contract.last_modified_by.as_deref(), Some("Nhân viên"));
    }

    #[test]
    fn non_admin_cannot_edit_pending_contract() {
        let mut contract = draft_contract(Priority::Medium, None);
        contract.status = ContractStatus::Pending;

        let error = contract
            .apply_edit(
                ContractEdit { title: Some("Khác".to_string()), ..ContractEdit::default() },
                &employee(),
                Utc::now(),
            )
            .expect_err("pending contract is locked");

        assert!(matches!(
            error,
            WorkflowError::Authorization(AuthorizationFailure::EditNotPermitted { .. })
        ));
        assert_eq!(contract.current_version, 1);
    }

    #[test]
    fn value_edit_is_blocked_once_approval_started() {
        let mut contract = draft_contract(Priority::Medium, None);
        let mut step = ApprovalStep::pending(1, ApproverRole::Manager, 2, None);
        step.status = StepStatus::Rejected;
        contract.approval_steps = vec![step];
        contract.status = ContractStatus::Rejected;

        let error = contract
            .apply_edit(
                ContractEdit {
                    contract_value: Some(Money::new(Decimal::from(1_000), "VND")),
                    ..ContractEdit::default()
                },
                &employee(),
                Utc::now(),
            )
            .expect_err("routing inputs are frozen");

        assert!(matches!(
            error,
            WorkflowError::InvalidState(InvalidStateFailure::ApprovalAlreadyStarted { .. })
        ));
        assert_eq!(contract.contract_value, None);
    }

    #[test]
    fn restore_appends_a_copy_instead_of_rewriting_history() {
        let mut contract = draft_contract(Priority::Medium, None);
        contract
            .apply_edit(
                ContractEdit {
                    title: Some("Hợp đồng dịch vụ v2".to_string()),
                    content: Some("Nội dung mới".to_string()),
                    ..ContractEdit::default()
                },
                &employee(),
                Utc::now(),
            )
            .expect("edit");

        let restored = contract.restore_version(1, &employee(), Utc::now()).expect("restore");

        assert_eq!(restored, 3);
        assert_eq!(contract.versions.len(), 3);
        assert_eq!(contract.current_content(), contract.versions[0].content);
        assert_eq!(contract.title, contract.versions[0].title);
        assert_eq!(contract.versions[1].content, "Nội dung mới");
    }

    #[test]
    fn restoring_unknown_version_is_a_validation_error() {
        let mut contract = draft_contract(Priority::Medium, None);
        let error =
            contract.restore_version(9, &employee(), Utc::now()).expect_err("unknown version");
        assert_eq!(error, WorkflowError::Validation(ValidationFailure::UnknownVersion { version: 9 }));
    }

    #[test]
    fn comparison_counts_line_changes() {
        let mut contract = draft_contract(Priority::Medium, None);
        contract
            .apply_edit(
                ContractEdit {
                    content: Some("Điều 1. Phạm vi công việc\nĐiều 2. Thanh toán".to_string()),
                    ..ContractEdit::default()
                },
                &employee(),
                Utc::now(),
            )
            .expect("edit");

        let comparison = contract.compare_versions(1, 2).expect("compare");

        assert!(!comparison.title_changed);
        assert!(comparison.content_changed);
        assert_eq!(comparison.added_lines, 1);
        assert_eq!(comparison.removed_lines, 0);
    }
}
