use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::contract::{Contract, ExtractedInfo, Money, Priority, RiskLevel};
use crate::domain::tag::TagId;
use crate::domain::user::{Permission, User};
use crate::domain::version::{ChangeType, NewVersion};
use crate::errors::{AuthorizationFailure, ValidationFailure, WorkflowError};

const UPLOAD_DESCRIPTION: &str = "Hợp đồng được tải lên và xử lý tự động";
const PENDING_EXTRACTION: &str = "Nội dung hợp đồng đang được xử lý...";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeDefaults {
    pub currency: String,
    pub priority: Priority,
}

impl Default for IntakeDefaults {
    fn default() -> Self {
        Self { currency: "VND".to_string(), priority: Priority::Medium }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub file_name: String,
    pub size_bytes: u64,
    /// Text already available for the document, if any. Extraction is not performed.
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualContract {
    pub title: String,
    pub description: String,
    pub priority: Option<Priority>,
    pub value: Option<Decimal>,
    pub currency: Option<String>,
    pub tags: Vec<TagId>,
    pub extracted_info: Option<ExtractedInfo>,
    pub expiry_date: Option<NaiveDate>,
    pub renewal_date: Option<NaiveDate>,
}

/// Draft from an uploaded file, titled after the file name without its extension.
pub fn intake_upload(
    document: UploadedDocument,
    author: &User,
    defaults: &IntakeDefaults,
    now: DateTime<Utc>,
) -> Result<Contract, WorkflowError> {
    require(author, Permission::Upload)?;

    let title = strip_extension(document.file_name.trim()).to_string();
    if title.is_empty() {
        return Err(ValidationFailure::EmptyField { field: "file_name" }.into());
    }

    let content = document.text.unwrap_or_else(|| PENDING_EXTRACTION.to_string());
    let mut contract =
        Contract::draft(title.clone(), UPLOAD_DESCRIPTION, defaults.priority, author.name.clone(), now);
    contract.extracted_info = Some(placeholder_extraction(&content));
    contract.append_version(NewVersion {
        title,
        content,
        changes: "Tạo mới".to_string(),
        change_type: ChangeType::Created,
        changed_fields: Vec::new(),
        created_by: author.name.clone(),
        created_by_role: author.role.to_string(),
        file_size: Some(document.size_bytes),
        change_reason: None,
    });

    Ok(contract)
}

/// Draft entered by hand; the full text of the extracted info becomes version 1.
pub fn intake_manual(
    manual: ManualContract,
    author: &User,
    defaults: &IntakeDefaults,
    now: DateTime<Utc>,
) -> Result<Contract, WorkflowError> {
    require(author, Permission::CreateManual)?;

    let title = manual.title.trim().to_string();
    if title.is_empty() {
        return Err(ValidationFailure::EmptyField { field: "title" }.into());
    }
    if let Some(value) = manual.value {
        if value < Decimal::ZERO {
            return Err(ValidationFailure::NegativeContractValue { value }.into());
        }
    }

    let currency = manual
        .currency
        .map(|currency| currency.trim().to_ascii_uppercase())
        .filter(|currency| !currency.is_empty())
        .unwrap_or_else(|| defaults.currency.clone());
    let content = manual
        .extracted_info
        .as_ref()
        .map(|info| info.full_text.clone())
        .unwrap_or_default();

    let mut contract = Contract::draft(
        title.clone(),
        manual.description,
        manual.priority.unwrap_or(defaults.priority),
        author.name.clone(),
        now,
    );
    contract.created_manually = true;
    contract.contract_value = manual.value.map(|amount| Money::new(amount, currency));
    contract.extracted_info = manual.extracted_info;
    contract.expiry_date = manual.expiry_date;
    contract.renewal_date = manual.renewal_date;
    for tag in manual.tags {
        contract.add_tag(tag);
    }
    contract.append_version(NewVersion {
        title,
        content,
        changes: "Tạo hợp đồng thủ công".to_string(),
        change_type: ChangeType::Created,
        changed_fields: Vec::new(),
        created_by: author.name.clone(),
        created_by_role: author.role.to_string(),
        file_size: None,
        change_reason: None,
    });

    Ok(contract)
}

fn require(author: &User, permission: Permission) -> Result<(), AuthorizationFailure> {
    if !author.is_active {
        return Err(AuthorizationFailure::InactiveUser { user_id: author.id.0.clone() });
    }
    if !author.can(permission) {
        return Err(AuthorizationFailure::MissingPermission {
            user_id: author.id.0.clone(),
            permission,
        });
    }
    Ok(())
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.contains('/') => stem,
        _ => file_name,
    }
}

fn placeholder_extraction(full_text: &str) -> ExtractedInfo {
    ExtractedInfo {
        contract_type: "Được trích xuất tự động".to_string(),
        parties: Vec::new(),
        numeric_value: None,
        duration: String::new(),
        summary: "Thông tin trích xuất cần được kiểm tra và chỉnh sửa.".to_string(),
        full_text: full_text.to_string(),
        key_terms: Vec::new(),
        risk_level: Some(RiskLevel::Low),
    }
}
