use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use contractflow_cli::commands::simulate::SimulateArgs;
use contractflow_cli::commands::{config, derive, doctor, simulate};
use contractflow_core::config::LoadOptions;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn derive_returns_the_four_tier_flow_for_sixty_million() {
    let result = derive::run("60000000", "medium");
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "derive");
    assert_eq!(payload["status"], "ok");
    let roles = step_roles(&payload);
    assert_eq!(roles, vec!["manager", "legal", "finance", "director"]);
    assert_eq!(payload["data"]["steps"][3]["required_hierarchy_level"], 3);
}

#[test]
fn derive_escalates_urgent_contracts_to_the_ceo() {
    let result = derive::run("250000000", "urgent");
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    let steps = payload["data"]["steps"].as_array().expect("steps array");
    assert_eq!(steps.len(), 5);
    assert_eq!(steps[4]["approver_role"], "ceo");
    assert_eq!(steps[4]["contract_value_threshold"]["kind"], "unbounded");
    assert!(steps.iter().all(|step| step["status"] == "pending"));
}

#[test]
fn derive_returns_no_steps_for_small_low_priority_contracts() {
    let payload = parse_payload(&derive::run("10000000", "low").output);
    assert!(step_roles(&payload).is_empty());
}

#[test]
fn derive_rejects_bad_input() {
    let result = derive::run("mười triệu", "medium");
    assert_eq!(result.exit_code, 2);
    assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");

    let result = derive::run("1000", "critical");
    assert_eq!(result.exit_code, 2);
    assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");

    let result = derive::run("-1", "low");
    assert_eq!(result.exit_code, 2);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "validation");
    assert_eq!(payload["correlation_id"], "derive");
    assert_eq!(
        payload["user_message"],
        "The request could not be processed. Check inputs and try again."
    );
}

#[test]
fn simulate_approves_every_step_in_order() {
    with_env(&[], || {
        let result = simulate::run(&LoadOptions::default(), args("60000000", "medium"));
        assert_eq!(result.exit_code, 0, "simulation failed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["status"], "approved");
        assert_eq!(payload["data"]["current_step"], 4);
        assert_eq!(payload["data"]["sequential_order_enforced"], true);
        let approvers: Vec<&str> = payload["data"]["steps"]
            .as_array()
            .expect("steps")
            .iter()
            .map(|step| step["approver_id"].as_str().expect("approver id"))
            .collect();
        assert_eq!(approvers, vec!["u-2", "u-4", "u-6", "u-5"]);
    });
}

#[test]
fn simulate_stops_at_a_rejection() {
    with_env(&[], || {
        let mut args = args("250000000", "urgent");
        args.reject_at = Some(3);
        args.reason = Some("Thiếu phụ lục thanh toán".to_string());

        let result = simulate::run(&LoadOptions::default(), args);
        assert_eq!(result.exit_code, 0, "simulation failed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["status"], "rejected");
        assert_eq!(payload["data"]["current_step"], 2);
        let statuses: Vec<&str> = payload["data"]["steps"]
            .as_array()
            .expect("steps")
            .iter()
            .map(|step| step["status"].as_str().expect("status"))
            .collect();
        assert_eq!(statuses, vec!["approved", "approved", "rejected", "pending", "pending"]);
    });
}

#[test]
fn simulate_requires_a_rejection_reason() {
    with_env(&[], || {
        let mut args = args("15000000", "low");
        args.reject_at = Some(1);

        let result = simulate::run(&LoadOptions::default(), args);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "validation");
    });
}

#[test]
fn simulate_out_of_order_depends_on_the_policy() {
    with_env(&[], || {
        let mut strict = args("60000000", "medium");
        strict.reverse = true;
        let result = simulate::run(&LoadOptions::default(), strict);
        assert_eq!(result.exit_code, 1);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_state");
        assert!(payload["message"].as_str().expect("message").starts_with("conflict: "));
        assert_eq!(
            payload["user_message"],
            "The contract is not in a state that allows this action. Refresh and try again."
        );

        let mut relaxed = args("60000000", "medium");
        relaxed.reverse = true;
        relaxed.permissive = true;
        let result = simulate::run(&LoadOptions::default(), relaxed);
        assert_eq!(result.exit_code, 0, "simulation failed: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["status"], "approved");
        assert_eq!(payload["data"]["sequential_order_enforced"], false);
    });
}

#[test]
fn simulate_honours_the_sequential_order_env_override() {
    with_env(&[("CONTRACTFLOW_APPROVAL_ENFORCE_SEQUENTIAL_ORDER", "false")], || {
        let mut reversed = args("25000000", "medium");
        reversed.reverse = true;

        let result = simulate::run(&LoadOptions::default(), reversed);
        assert_eq!(result.exit_code, 0, "simulation failed: {}", result.output);
        assert_eq!(parse_payload(&result.output)["data"]["status"], "approved");
    });
}

#[test]
fn doctor_passes_with_defaults() {
    with_env(&[], || {
        let result = doctor::run(&LoadOptions::default(), true);
        assert_eq!(result.exit_code, 0, "doctor failed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .map(|check| check["name"].as_str().expect("name"))
            .collect();
        assert_eq!(names, vec!["config_validation", "rule_table", "repository_round_trip"]);
    });
}

#[test]
fn doctor_reports_invalid_config() {
    with_env(&[("CONTRACTFLOW_LOGGING_FORMAT", "xml")], || {
        let result = doctor::run(&LoadOptions::default(), true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "pass");
    });
}

#[test]
fn doctor_human_output_lists_checks() {
    with_env(&[], || {
        let result = doctor::run(&LoadOptions::default(), false);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] rule_table"));
    });
}

#[test]
fn config_attributes_values_to_their_source() {
    with_env(&[("CONTRACTFLOW_ANALYTICS_EXPIRING_SOON_DAYS", "45")], || {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("contractflow.toml");
        fs::write(&path, "[intake]\ndefault_currency = \"USD\"\n").expect("write config");
        let options = LoadOptions { config_path: Some(path), ..LoadOptions::default() };

        let output = config::run(&options);

        assert!(output.contains(
            "- analytics.expiring_soon_days = 45 (source: env (CONTRACTFLOW_ANALYTICS_EXPIRING_SOON_DAYS))"
        ));
        assert!(output.contains("- intake.default_currency = USD (source: file ("));
        assert!(output.contains("- approval.enforce_sequential_order = true (source: default)"));
    });
}

#[test]
fn config_reports_validation_failures() {
    with_env(&[("CONTRACTFLOW_ANALYTICS_EXPIRING_SOON_DAYS", "0")], || {
        let output = config::run(&LoadOptions::default());
        assert!(output.starts_with("config validation failed"));
    });
}

fn args(value: &str, priority: &str) -> SimulateArgs {
    SimulateArgs {
        value: value.to_string(),
        priority: priority.to_string(),
        ..SimulateArgs::default()
    }
}

fn step_roles(payload: &Value) -> Vec<String> {
    payload["data"]["steps"]
        .as_array()
        .expect("steps array")
        .iter()
        .map(|step| step["approver_role"].as_str().expect("role").to_string())
        .collect()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "CONTRACTFLOW_APPROVAL_ENFORCE_SEQUENTIAL_ORDER",
        "CONTRACTFLOW_ANALYTICS_EXPIRING_SOON_DAYS",
        "CONTRACTFLOW_INTAKE_DEFAULT_CURRENCY",
        "CONTRACTFLOW_INTAKE_DEFAULT_PRIORITY",
        "CONTRACTFLOW_INTAKE_EXPIRY_REMINDER_DAYS",
        "CONTRACTFLOW_LOGGING_LEVEL",
        "CONTRACTFLOW_LOGGING_FORMAT",
        "CONTRACTFLOW_LOG_LEVEL",
        "CONTRACTFLOW_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
