use chrono::{DateTime, Utc};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::directory::authorize_step;
use crate::domain::approval::{ApprovalStep, StepAction, StepStatus};
use crate::domain::contract::{Contract, ContractStatus};
use crate::domain::user::User;
use crate::domain::version::ChangeType;
use crate::errors::{ApplicationError, InvalidStateFailure, ValidationFailure, WorkflowError};
use crate::flows::states::{ApprovalPolicy, ResolveStepRequest, StepResolution};

/// Rejected if any step is rejected, approved if every step is approved
/// (including an empty flow), pending otherwise.
pub fn derive_contract_status(steps: &[ApprovalStep]) -> ContractStatus {
    if steps.iter().any(|step| step.status == StepStatus::Rejected) {
        return ContractStatus::Rejected;
    }
    if steps.iter().all(|step| step.status == StepStatus::Approved) {
        return ContractStatus::Approved;
    }
    ContractStatus::Pending
}

#[derive(Clone, Debug, Default)]
pub struct ApprovalEngine {
    policy: ApprovalPolicy,
}

impl ApprovalEngine {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ApprovalPolicy {
        self.policy
    }

    pub fn resolve_step(
        &self,
        contract: &mut Contract,
        request: &ResolveStepRequest,
        acting_user: &User,
    ) -> Result<StepResolution, WorkflowError> {
        self.resolve_step_at(contract, request, acting_user, Utc::now())
    }

    /// Resolves one step. Every check runs before the first mutation, so an
    /// error leaves the contract untouched.
    pub fn resolve_step_at(
        &self,
        contract: &mut Contract,
        request: &ResolveStepRequest,
        acting_user: &User,
        now: DateTime<Utc>,
    ) -> Result<StepResolution, WorkflowError> {
        let reason = match request.action {
            StepAction::Approve => None,
            StepAction::Reject => Some(
                non_blank(request.reason.as_deref())
                    .ok_or(ValidationFailure::MissingRejectionReason)?,
            ),
        };

        let index = contract
            .approval_steps
            .iter()
            .position(|step| step.id == request.step_id)
            .ok_or_else(|| ValidationFailure::UnknownStep { step_id: request.step_id.0.clone() })?;

        let step = &contract.approval_steps[index];
        authorize_step(acting_user, step)?;

        if step.status.is_resolved() {
            return Err(InvalidStateFailure::StepAlreadyResolved {
                step_number: step.step_number,
                status: step.status,
            }
            .into());
        }

        if contract.status != ContractStatus::Pending {
            return Err(InvalidStateFailure::NotAwaitingApproval { status: contract.status }.into());
        }

        if self.policy.enforce_sequential_order {
            if let Some(blocking) =
                contract.approval_steps[..index].iter().find(|earlier| earlier.is_pending())
            {
                return Err(InvalidStateFailure::OutOfOrderResolution {
                    step_number: step.step_number,
                    blocking_step: blocking.step_number,
                }
                .into());
            }
        }

        let active_since = contract.approval_steps[..index]
            .iter()
            .rev()
            .find_map(|earlier| earlier.approved_at)
            .or(contract.submitted_at);
        let time_spent_minutes = active_since.map(|since| elapsed_minutes(since, now));

        let step = &mut contract.approval_steps[index];
        step.status = request.action.resulting_status();
        step.approver_id = Some(acting_user.id.clone());
        step.approver_name = Some(acting_user.name.clone());
        step.approved_at = Some(now);
        step.comments = non_blank(request.comments.as_deref()).or_else(|| reason.clone());
        step.time_spent_minutes = time_spent_minutes;
        let step_number = step.step_number;

        contract.current_step = match request.action {
            StepAction::Approve => index + 1,
            StepAction::Reject => index,
        };
        contract.status = derive_contract_status(&contract.approval_steps);
        contract.touch(&acting_user.name, now);

        match contract.status {
            ContractStatus::Approved => {
                contract.reviewed_at = Some(now);
                contract.record_outcome_version(
                    ChangeType::Approved,
                    format!("approved at step {step_number} by {}", acting_user.name),
                    acting_user,
                );
            }
            ContractStatus::Rejected => {
                contract.reviewed_at = Some(now);
                contract.rejection_reason = reason.clone();
                contract.rejection_category = request.rejection_category;
                contract.record_outcome_version(
                    ChangeType::Rejected,
                    format!(
                        "rejected at step {step_number} by {}: {}",
                        acting_user.name,
                        reason.unwrap_or_default()
                    ),
                    acting_user,
                );
            }
            _ => {}
        }

        Ok(StepResolution::snapshot(contract))
    }

    pub fn resolve_step_with_audit<S>(
        &self,
        contract: &mut Contract,
        request: &ResolveStepRequest,
        acting_user: &User,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<StepResolution, WorkflowError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.resolve_step_at(contract, request, acting_user, now);
        match &result {
            Ok(resolution) => audit_resolution(sink, audit, request, Ok(resolution)),
            Err(error) => {
                audit_resolution(sink, audit, request, Err(&ApplicationError::from(error.clone())))
            }
        }
        result
    }
}

/// Emits `approval.step_resolved` for a stored resolution and
/// `approval.step_rejected_operation` for a refused one.
pub fn audit_resolution<S>(
    sink: &S,
    audit: &AuditContext,
    request: &ResolveStepRequest,
    outcome: Result<&StepResolution, &ApplicationError>,
) where
    S: AuditSink + ?Sized,
{
    match outcome {
        Ok(resolution) => {
            let step_number = resolution
                .approval_steps
                .iter()
                .find(|step| step.id == request.step_id)
                .map(|step| step.step_number.to_string())
                .unwrap_or_default();
            sink.emit(
                AuditEvent::from_context(
                    audit,
                    "approval.step_resolved",
                    AuditCategory::Approval,
                    AuditOutcome::Success,
                )
                .with_metadata("step_number", step_number)
                .with_metadata("action", format!("{:?}", request.action))
                .with_metadata("contract_status", resolution.status.as_str())
                .with_metadata("current_step", resolution.current_step.to_string()),
            );
        }
        Err(error) => {
            let error_kind = error
                .workflow_kind()
                .map(|kind| format!("{kind:?}"))
                .unwrap_or_else(|| "Application".to_string());
            sink.emit(
                AuditEvent::from_context(
                    audit,
                    "approval.step_rejected_operation",
                    AuditCategory::Approval,
                    AuditOutcome::Rejected,
                )
                .with_metadata("step_id", request.step_id.0.clone())
                .with_metadata("error_kind", error_kind)
                .with_metadata("error", error.to_string()),
            );
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
}

fn elapsed_minutes(since: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let minutes = (now - since).num_minutes().max(0);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}
