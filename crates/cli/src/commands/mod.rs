pub mod config;
pub mod derive;
pub mod doctor;
pub mod simulate;

use contractflow_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;

/// Exit code for rejected workflow operations.
pub const EXIT_WORKFLOW_ERROR: u8 = 1;
/// Exit code for bad input or configuration.
pub const EXIT_USAGE_ERROR: u8 = 2;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<T: Serialize> {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data::<()>(command, message, None)
    }

    pub fn success_with_data<T: Serialize>(
        command: &str,
        message: impl Into<String>,
        data: Option<T>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            user_message: None,
            correlation_id: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload: CommandOutcome<()> = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            user_message: None,
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    /// Maps through the interface error so the class and exit code follow one table.
    pub fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let interface = error.into_interface(correlation_id);
        let (error_class, exit_code) = match &interface {
            InterfaceError::BadRequest { .. } => ("validation", EXIT_USAGE_ERROR),
            InterfaceError::Forbidden { .. } => ("authorization", EXIT_WORKFLOW_ERROR),
            InterfaceError::Conflict { .. } => ("invalid_state", EXIT_WORKFLOW_ERROR),
            InterfaceError::NotFound { .. } => ("not_found", EXIT_WORKFLOW_ERROR),
            InterfaceError::ServiceUnavailable { .. } => ("persistence", EXIT_WORKFLOW_ERROR),
            InterfaceError::Internal { .. } => ("internal", EXIT_WORKFLOW_ERROR),
        };
        let payload: CommandOutcome<()> = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: interface.to_string(),
            user_message: Some(interface.user_message().to_string()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

fn serialize_payload<T: Serialize>(payload: &CommandOutcome<T>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
