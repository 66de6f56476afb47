use std::str::FromStr;

use contractflow_core::approvals::{FlowDerivationInput, FlowDeriver};
use contractflow_core::domain::approval::ApprovalStep;
use contractflow_core::domain::contract::Priority;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{CommandResult, EXIT_USAGE_ERROR};

#[derive(Debug, Serialize)]
struct DerivedFlow {
    value: Decimal,
    priority: Priority,
    steps: Vec<ApprovalStep>,
}

pub fn run(value: &str, priority: &str) -> CommandResult {
    let input = match parse_input("derive", value, priority) {
        Ok(input) => input,
        Err(result) => return result,
    };

    match FlowDeriver::default().derive(&input) {
        Ok(steps) => {
            let message = format!("{} approval step(s) required", steps.len());
            let flow = DerivedFlow {
                value: input.value.unwrap_or(Decimal::ZERO),
                priority: input.priority,
                steps,
            };
            CommandResult::success_with_data("derive", message, Some(flow))
        }
        Err(error) => CommandResult::from_application_error("derive", error.into(), "derive"),
    }
}

pub(crate) fn parse_input(
    command: &str,
    value: &str,
    priority: &str,
) -> Result<FlowDerivationInput, CommandResult> {
    let value = Decimal::from_str(value.trim()).map_err(|error| {
        CommandResult::failure(
            command,
            "invalid_input",
            format!("`{value}` is not a decimal amount: {error}"),
            EXIT_USAGE_ERROR,
        )
    })?;
    let priority = Priority::from_str(priority).map_err(|error| {
        CommandResult::failure(command, "invalid_input", error.to_string(), EXIT_USAGE_ERROR)
    })?;

    Ok(FlowDerivationInput { value: Some(value), priority })
}
