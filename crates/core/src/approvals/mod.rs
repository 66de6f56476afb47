pub mod derive;

pub use derive::{
    apply_approval_flow, default_rule_table, derive_approval_flow, ApprovalRule,
    FlowDerivationInput, FlowDeriver,
};
