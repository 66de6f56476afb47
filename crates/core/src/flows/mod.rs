pub mod engine;
pub mod states;

pub use engine::{audit_resolution, derive_contract_status, ApprovalEngine};
pub use states::{ApprovalPolicy, ResolveStepRequest, StepResolution};
