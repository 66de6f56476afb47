use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalStep, StepAction, StepId};
use crate::domain::contract::{Contract, ContractStatus, RejectionCategory};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveStepRequest {
    pub step_id: StepId,
    pub action: StepAction,
    pub comments: Option<String>,
    /// Required and non-blank for rejections.
    pub reason: Option<String>,
    pub rejection_category: Option<RejectionCategory>,
}

impl ResolveStepRequest {
    pub fn approve(step_id: StepId) -> Self {
        Self {
            step_id,
            action: StepAction::Approve,
            comments: None,
            reason: None,
            rejection_category: None,
        }
    }

    pub fn reject(step_id: StepId, reason: impl Into<String>) -> Self {
        Self {
            step_id,
            action: StepAction::Reject,
            comments: None,
            reason: Some(reason.into()),
            rejection_category: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_category(mut self, category: RejectionCategory) -> Self {
        self.rejection_category = Some(category);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// Refuse to resolve a step while an earlier step is still pending.
    pub enforce_sequential_order: bool,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self { enforce_sequential_order: true }
    }
}

impl ApprovalPolicy {
    pub fn permissive() -> Self {
        Self { enforce_sequential_order: false }
    }
}

/// Snapshot of the approval state after a successful resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResolution {
    pub approval_steps: Vec<ApprovalStep>,
    pub current_step: usize,
    pub status: ContractStatus,
}

impl StepResolution {
    pub fn snapshot(contract: &Contract) -> Self {
        Self {
            approval_steps: contract.approval_steps.clone(),
            current_step: contract.current_step,
            status: contract.status,
        }
    }
}
