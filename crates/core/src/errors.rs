use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::approval::StepStatus;
use crate::domain::contract::ContractStatus;
use crate::domain::user::Permission;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authorization,
    InvalidState,
    Validation,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuthorizationFailure {
    #[error("user `{user_id}` is deactivated")]
    InactiveUser { user_id: String },
    #[error("user `{user_id}` has not been approved yet")]
    UnapprovedUser { user_id: String },
    #[error("user `{user_id}` lacks the `{permission}` permission")]
    MissingPermission { user_id: String, permission: Permission },
    #[error(
        "user `{user_id}` at hierarchy level {actual} cannot resolve a step that requires level {required}"
    )]
    InsufficientHierarchyLevel { user_id: String, actual: u8, required: u8 },
    #[error("user `{user_id}` cannot edit a contract in `{status}` status")]
    EditNotPermitted { user_id: String, status: ContractStatus },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidStateFailure {
    #[error("step {step_number} was already resolved as {status:?}")]
    StepAlreadyResolved { step_number: u32, status: StepStatus },
    #[error("step {step_number} cannot be resolved before step {blocking_step} is approved")]
    OutOfOrderResolution { step_number: u32, blocking_step: u32 },
    #[error("approval already started for contract `{contract_id}`; the flow is fixed")]
    ApprovalAlreadyStarted { contract_id: String },
    #[error("contract is `{status}`, only draft contracts can be submitted")]
    NotDraft { status: ContractStatus },
    #[error("contract is `{status}`, not awaiting approval")]
    NotAwaitingApproval { status: ContractStatus },
    #[error("contract is `{status}`, only approved contracts can be sent for signature")]
    NotApproved { status: ContractStatus },
    #[error("contract already has an active signature request")]
    SignatureRequestActive,
    #[error("contract has no active signature request")]
    NoActiveSignatureRequest,
    #[error("signer `{email}` already signed")]
    AlreadySigned { email: String },
    #[error("contract `{contract_id}` was modified concurrently (expected revision {expected}, found {actual})")]
    ConcurrentModification { contract_id: String, expected: u64, actual: u64 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("a rejection requires a non-empty reason")]
    MissingRejectionReason,
    #[error("unknown approval step `{step_id}`")]
    UnknownStep { step_id: String },
    #[error("contract value must not be negative (got {value})")]
    NegativeContractValue { value: Decimal },
    #[error("unknown priority `{value}` (expected low|medium|high|urgent)")]
    UnknownPriority { value: String },
    #[error("unknown contract status `{value}`")]
    UnknownContractStatus { value: String },
    #[error("unknown user role `{value}`")]
    UnknownUserRole { value: String },
    #[error("`{field}` must not be empty")]
    EmptyField { field: &'static str },
    #[error("`{value}` is not a valid email address")]
    InvalidEmail { value: String },
    #[error("unknown version {version}")]
    UnknownVersion { version: u32 },
    #[error("unknown reminder `{reminder_id}`")]
    UnknownReminder { reminder_id: String },
    #[error("a signature request needs at least one complete signer")]
    NoSigners,
    #[error("`{email}` is not a signer on this request")]
    UnknownSigner { email: String },
}

/// Rejected workflow operation; the contract is left unchanged.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("authorization error: {0}")]
    Authorization(#[from] AuthorizationFailure),
    #[error("invalid state: {0}")]
    InvalidState(#[from] InvalidStateFailure),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationFailure),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid contract transition from {from} to {to}")]
    InvalidContractTransition { from: ContractStatus, to: ContractStatus },
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<WorkflowError> for ApplicationError {
    fn from(value: WorkflowError) -> Self {
        Self::Domain(DomainError::Workflow(value))
    }
}

impl ApplicationError {
    pub fn workflow_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Domain(DomainError::Workflow(error)) => Some(error.kind()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::Conflict { .. } => {
                "The contract is not in a state that allows this action. Refresh and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Workflow(error)) => {
                let message = error.to_string();
                match error.kind() {
                    ErrorKind::Authorization => Self::Forbidden { message, correlation_id },
                    ErrorKind::InvalidState => Self::Conflict { message, correlation_id },
                    ErrorKind::Validation => Self::BadRequest { message, correlation_id },
                }
            }
            ApplicationError::Domain(error @ DomainError::InvalidContractTransition { .. }) => {
                Self::Conflict { message: error.to_string(), correlation_id }
            }
            ApplicationError::Domain(DomainError::InvariantViolation(message)) => {
                Self::Internal { message, correlation_id }
            }
            error @ ApplicationError::NotFound { .. } => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
