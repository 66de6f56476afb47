pub mod analytics;
pub mod approvals;
pub mod audit;
pub mod comments;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod esign;
pub mod flows;
pub mod intake;
pub mod reminders;
pub mod search;

pub use analytics::{step_time_by_role, AnalyticsOptions, DashboardStats, RoleStepTime};
pub use approvals::{
    apply_approval_flow, default_rule_table, derive_approval_flow, ApprovalRule,
    FlowDerivationInput, FlowDeriver,
};
pub use comments::{CommentId, ContractComment};
pub use directory::{approve_user, authorize_step, available_approvers, register_user, Registration};
pub use domain::approval::{
    ApprovalStep, ApproverRole, StepAction, StepId, StepStatus, ValueThreshold,
};
pub use domain::contract::{Contract, ContractId, ContractStatus, Money, Priority};
pub use domain::user::{Permission, Permissions, User, UserId, UserRole};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError, WorkflowError};
pub use esign::SignerInput;
pub use flows::{derive_contract_status, ApprovalEngine, ApprovalPolicy, ResolveStepRequest, StepResolution};
pub use intake::{intake_manual, intake_upload, IntakeDefaults, ManualContract, UploadedDocument};
pub use reminders::NewReminder;
pub use search::ContractFilter;
