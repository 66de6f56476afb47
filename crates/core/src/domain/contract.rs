use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::approval::{ApprovalStep, StepStatus};
use crate::domain::reminder::ContractReminder;
use crate::domain::signature::ESignatureRequest;
use crate::domain::tag::TagId;
use crate::domain::user::User;
use crate::domain::version::{ChangeType, ContractVersion, NewVersion};
use crate::errors::{DomainError, InvalidStateFailure, ValidationFailure, WorkflowError};
use crate::flows::engine::derive_contract_status;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractId(pub String);

impl ContractId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Signed,
    Expired,
}

impl ContractStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Signed | Self::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Signed => "signed",
            Self::Expired => "expired",
        }
    }

    pub fn can_transition_to(self, next: ContractStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Pending)
                | (Self::Draft, Self::Approved)
                | (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Signed)
                | (Self::Draft, Self::Expired)
                | (Self::Pending, Self::Expired)
                | (Self::Approved, Self::Expired)
        )
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "signed" => Ok(Self::Signed),
            "expired" => Ok(Self::Expired),
            other => {
                Err(ValidationFailure::UnknownContractStatus { value: other.to_string() }.into())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// High and urgent contracts always go through legal and finance review.
    pub fn is_escalated(self) -> bool {
        matches!(self, Self::High | Self::Urgent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = WorkflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(ValidationFailure::UnknownPriority { value: other.to_string() }.into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self { amount, currency: currency.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCategory {
    Legal,
    Financial,
    Technical,
    Policy,
    Other,
}

/// Document summary produced at intake. Extraction itself is mocked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedInfo {
    pub contract_type: String,
    pub parties: Vec<String>,
    pub numeric_value: Option<Decimal>,
    pub duration: String,
    pub summary: String,
    pub full_text: String,
    pub key_terms: Vec<String>,
    pub risk_level: Option<RiskLevel>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub title: String,
    pub description: String,
    pub status: ContractStatus,
    pub priority: Priority,
    pub contract_value: Option<Money>,
    pub versions: Vec<ContractVersion>,
    pub current_version: u32,
    pub approval_steps: Vec<ApprovalStep>,
    pub current_step: usize,
    pub tags: Vec<TagId>,
    pub reminders: Vec<ContractReminder>,
    pub e_signature: Option<ESignatureRequest>,
    pub extracted_info: Option<ExtractedInfo>,
    pub created_by: String,
    pub created_manually: bool,
    pub uploaded_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub expiry_date: Option<NaiveDate>,
    pub renewal_date: Option<NaiveDate>,
    pub rejection_reason: Option<String>,
    pub rejection_category: Option<RejectionCategory>,
    pub last_modified_by: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub revision: u64,
}

impl Contract {
    /// A draft with no versions yet; intake appends version 1.
    pub fn draft(
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        created_by: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ContractId::generate(),
            title: title.into(),
            description: description.into(),
            status: ContractStatus::Draft,
            priority,
            contract_value: None,
            versions: Vec::new(),
            current_version: 0,
            approval_steps: Vec::new(),
            current_step: 0,
            tags: Vec::new(),
            reminders: Vec::new(),
            e_signature: None,
            extracted_info: None,
            created_by: created_by.into(),
            created_manually: false,
            uploaded_at,
            submitted_at: None,
            reviewed_at: None,
            expiry_date: None,
            renewal_date: None,
            rejection_reason: None,
            rejection_category: None,
            last_modified_by: None,
            last_modified_at: None,
            revision: 0,
        }
    }

    /// Declared value, falling back to the extracted value, then zero.
    pub fn declared_value(&self) -> Decimal {
        self.contract_value
            .as_ref()
            .map(|money| money.amount)
            .or_else(|| self.extracted_info.as_ref().and_then(|info| info.numeric_value))
            .unwrap_or(Decimal::ZERO)
    }

    /// True once a step is resolved or the contract has moved past review.
    /// A zero-step flow counts as started from the moment it is approved.
    pub fn approval_started(&self) -> bool {
        !matches!(self.status, ContractStatus::Draft | ContractStatus::Pending)
            || self.approval_steps.iter().any(|step| step.status != StepStatus::Pending)
    }

    pub fn can_transition_to(&self, next: ContractStatus) -> bool {
        self.status.can_transition_to(next)
    }

    pub fn transition_to(&mut self, next: ContractStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidContractTransition { from: self.status, to: next })
    }

    /// Replaces the approval flow and rewinds the step pointer.
    pub fn replace_approval_flow(&mut self, steps: Vec<ApprovalStep>) -> Result<(), WorkflowError> {
        if self.approval_started() {
            return Err(InvalidStateFailure::ApprovalAlreadyStarted {
                contract_id: self.id.0.clone(),
            }
            .into());
        }

        self.approval_steps = steps;
        self.current_step = 0;
        Ok(())
    }

    /// Attaches the flow and leaves draft. A flow with no steps approves immediately.
    pub fn submit_for_approval(
        &mut self,
        steps: Vec<ApprovalStep>,
        submitter: &User,
        now: DateTime<Utc>,
    ) -> Result<ContractStatus, WorkflowError> {
        if self.status != ContractStatus::Draft {
            return Err(InvalidStateFailure::NotDraft { status: self.status }.into());
        }

        self.replace_approval_flow(steps)?;
        self.submitted_at = Some(now);
        self.status = derive_contract_status(&self.approval_steps);
        self.touch(&submitter.name, now);

        if self.status == ContractStatus::Approved {
            self.reviewed_at = Some(now);
            self.record_outcome_version(
                ChangeType::Approved,
                "approved without approval gates".to_string(),
                submitter,
            );
        }

        Ok(self.status)
    }

    /// Moves a contract past its expiry date to `Expired`.
    pub fn expire_if_due(&mut self, today: NaiveDate) -> bool {
        let Some(expiry_date) = self.expiry_date else {
            return false;
        };

        if expiry_date >= today || !self.can_transition_to(ContractStatus::Expired) {
            return false;
        }

        self.status = ContractStatus::Expired;
        true
    }

    /// Admins edit anything; everyone else only drafts and rejected contracts.
    pub fn can_edit(&self, user: &User) -> bool {
        user.is_admin() || matches!(self.status, ContractStatus::Draft | ContractStatus::Rejected)
    }

    pub fn add_tag(&mut self, tag_id: TagId) -> bool {
        if self.tags.contains(&tag_id) {
            return false;
        }
        self.tags.push(tag_id);
        true
    }

    pub fn remove_tag(&mut self, tag_id: &TagId) -> bool {
        let before = self.tags.len();
        self.tags.retain(|existing| existing != tag_id);
        self.tags.len() != before
    }

    pub fn latest_version(&self) -> Option<&ContractVersion> {
        self.versions.last()
    }

    pub fn current_content(&self) -> &str {
        self.latest_version().map(|version| version.content.as_str()).unwrap_or_default()
    }

    pub(crate) fn touch(&mut self, actor: &str, now: DateTime<Utc>) {
        self.last_modified_by = Some(actor.to_string());
        self.last_modified_at = Some(now);
    }

    /// Snapshots the current content under an outcome change type.
    pub(crate) fn record_outcome_version(
        &mut self,
        change_type: ChangeType,
        changes: String,
        actor: &User,
    ) {
        let new_version = NewVersion {
            title: self.title.clone(),
            content: self.current_content().to_string(),
            changes,
            change_type,
            changed_fields: Vec::new(),
            created_by: actor.name.clone(),
            created_by_role: actor.role.to_string(),
            file_size: None,
            change_reason: None,
        };
        self.append_version(new_version);
    }
}
