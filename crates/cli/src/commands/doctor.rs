use std::collections::HashSet;

use chrono::Utc;
use contractflow_core::approvals::{FlowDerivationInput, FlowDeriver};
use contractflow_core::config::{AppConfig, LoadOptions};
use contractflow_core::domain::approval::ApproverRole;
use contractflow_core::domain::contract::{Contract, Priority};
use contractflow_db::{ContractRepository, InMemoryContractRepository};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{CommandResult, EXIT_WORKFLOW_ERROR};

const SAMPLE_VALUES: [i64; 12] = [
    0,
    10_000_000,
    10_000_001,
    20_000_000,
    20_000_001,
    30_000_000,
    30_000_001,
    50_000_000,
    50_000_001,
    200_000_000,
    200_000_001,
    1_000_000_000,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_WORKFLOW_ERROR };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: format!(
                    "configuration loaded and validated (sequential order {})",
                    if config.approval.enforce_sequential_order { "enforced" } else { "relaxed" }
                ),
            });
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
        }
    }
    checks.push(check_rule_table(&FlowDeriver::default()));
    checks.push(check_repository_round_trip());

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// A higher value must never drop an approver, and steps stay numbered 1..N.
fn check_rule_table(deriver: &FlowDeriver) -> DoctorCheck {
    let priorities = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];
    for priority in priorities {
        let mut previous: HashSet<ApproverRole> = HashSet::new();
        for value in SAMPLE_VALUES {
            let input = FlowDerivationInput { value: Some(Decimal::from(value)), priority };
            let steps = match deriver.derive(&input) {
                Ok(steps) => steps,
                Err(error) => return rule_table_failure(format!("{priority}/{value}: {error}")),
            };

            let numbered = steps.iter().zip(1_u32..).all(|(step, expected)| step.step_number == expected);
            if !numbered {
                return rule_table_failure(format!("{priority}/{value}: steps are not numbered 1..N"));
            }

            let roles: HashSet<ApproverRole> = steps.iter().map(|step| step.approver_role).collect();
            if !previous.is_subset(&roles) {
                return rule_table_failure(format!(
                    "{priority}/{value}: raising the value dropped an approver"
                ));
            }
            previous = roles;
        }
    }

    DoctorCheck {
        name: "rule_table",
        status: CheckStatus::Pass,
        details: format!(
            "{} rules, monotonic in value across {} samples per priority",
            deriver.rules().len(),
            SAMPLE_VALUES.len()
        ),
    }
}

fn rule_table_failure(details: String) -> DoctorCheck {
    DoctorCheck { name: "rule_table", status: CheckStatus::Fail, details }
}

fn check_repository_round_trip() -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "repository_round_trip",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let repository = InMemoryContractRepository::default();
        let probe = Contract::draft("doctor probe", "", Priority::Low, "doctor", Utc::now());
        let stored = repository
            .save_if_revision(probe, 0)
            .await
            .map_err(|error| format!("failed to store probe contract: {error}"))?;
        let found = repository
            .find_by_id(&stored.id)
            .await
            .map_err(|error| format!("failed to read probe contract: {error}"))?;

        if found.as_ref() == Some(&stored) {
            Ok::<u64, String>(stored.revision)
        } else {
            Err("probe contract did not round-trip".to_string())
        }
    });

    match result {
        Ok(revision) => DoctorCheck {
            name: "repository_round_trip",
            status: CheckStatus::Pass,
            details: format!("in-memory contract store answered at revision {revision}"),
        },
        Err(error) => {
            DoctorCheck { name: "repository_round_trip", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
