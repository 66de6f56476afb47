use std::sync::Arc;

use contractflow_core::approvals::FlowDerivationInput;
use contractflow_core::config::{AppConfig, LoadOptions};
use contractflow_core::directory::available_approvers;
use contractflow_core::domain::approval::ApprovalStep;
use contractflow_core::domain::contract::ContractStatus;
use contractflow_core::domain::user::{User, UserId};
use contractflow_core::errors::ApplicationError;
use contractflow_core::flows::ResolveStepRequest;
use contractflow_core::intake::ManualContract;
use contractflow_db::{
    seed, ContractWorkflowService, InMemoryCommentRepository, InMemoryContractRepository,
    InMemoryTagRepository, InMemoryUserRepository, RepositoryError, UserRepository,
};
use serde::Serialize;

use super::derive::parse_input;
use super::{CommandResult, EXIT_USAGE_ERROR, EXIT_WORKFLOW_ERROR};

const AUTHOR_ID: &str = "u-2";
const SUBMITTER_ID: &str = "u-3";

#[derive(Clone, Debug, Default)]
pub struct SimulateArgs {
    pub value: String,
    pub priority: String,
    /// Step number to reject instead of approve.
    pub reject_at: Option<u32>,
    pub reason: Option<String>,
    pub permissive: bool,
    /// Resolve steps from the last one back to the first.
    pub reverse: bool,
}

#[derive(Debug, Serialize)]
struct SimulationOutcome {
    contract_id: String,
    status: ContractStatus,
    current_step: usize,
    sequential_order_enforced: bool,
    steps: Vec<ApprovalStep>,
}

pub fn run(options: &LoadOptions, args: SimulateArgs) -> CommandResult {
    let input = match parse_input("simulate", &args.value, &args.priority) {
        Ok(input) => input,
        Err(result) => return result,
    };

    let mut config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "config_validation",
                error.to_string(),
                EXIT_USAGE_ERROR,
            );
        }
    };
    if args.permissive {
        config.approval.enforce_sequential_order = false;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_WORKFLOW_ERROR,
            );
        }
    };

    match runtime.block_on(simulate(&config, input, &args)) {
        Ok(outcome) => {
            let message = format!(
                "contract finished as `{}` after {} step(s)",
                outcome.status, outcome.current_step
            );
            CommandResult::success_with_data("simulate", message, Some(outcome))
        }
        Err(error) => CommandResult::from_application_error("simulate", error, "simulate"),
    }
}

async fn simulate(
    config: &AppConfig,
    input: FlowDerivationInput,
    args: &SimulateArgs,
) -> Result<SimulationOutcome, ApplicationError> {
    let users = Arc::new(InMemoryUserRepository::default());
    seed(users.as_ref(), &InMemoryTagRepository::default()).await.map_err(storage_error)?;
    let directory = users.list().await.map_err(storage_error)?;
    let service = ContractWorkflowService::from_config(
        Arc::new(InMemoryContractRepository::default()),
        users,
        Arc::new(InMemoryCommentRepository::default()),
        config,
    );

    let manual = ManualContract {
        title: "Hợp đồng mô phỏng".to_string(),
        value: input.value,
        priority: Some(input.priority),
        ..ManualContract::default()
    };
    let contract = service.create_manual(manual, &UserId(AUTHOR_ID.to_string())).await?;
    service.submit_for_approval(&contract.id, &UserId(SUBMITTER_ID.to_string())).await?;

    let mut steps = service.find_contract(&contract.id).await?.approval_steps;
    if args.reverse {
        steps.reverse();
    }

    for step in steps {
        let status = service.find_contract(&contract.id).await?.status;
        if status != ContractStatus::Pending {
            break;
        }

        let approver = pick_approver(&step, &directory).ok_or_else(|| {
            ApplicationError::NotFound { entity: "approver", id: step.approver_role.to_string() }
        })?;
        let request = if args.reject_at == Some(step.step_number) {
            ResolveStepRequest::reject(step.id.clone(), args.reason.clone().unwrap_or_default())
        } else {
            ResolveStepRequest::approve(step.id.clone())
        };
        let correlation_id = format!("simulate-step-{}", step.step_number);
        service.resolve_step(&contract.id, request, &approver.id, &correlation_id).await?;
    }

    let finished = service.find_contract(&contract.id).await?;
    Ok(SimulationOutcome {
        contract_id: finished.id.0,
        status: finished.status,
        current_step: finished.current_step,
        sequential_order_enforced: service.engine().policy().enforce_sequential_order,
        steps: finished.approval_steps,
    })
}

/// Prefers the user holding the step's own role over a higher-ranked stand-in.
fn pick_approver<'a>(step: &ApprovalStep, directory: &'a [User]) -> Option<&'a User> {
    let candidates = available_approvers(step, directory);
    let intended = step.approver_role.intended_user_role();
    candidates
        .iter()
        .copied()
        .find(|user| user.role == intended)
        .or_else(|| candidates.first().copied())
}

fn storage_error(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
