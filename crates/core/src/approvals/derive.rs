use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalStep, ApproverRole, ValueThreshold};
use crate::domain::contract::{Contract, Priority};
use crate::errors::{ValidationFailure, WorkflowError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDerivationInput {
    /// Declared contract value; unknown values count as zero.
    pub value: Option<Decimal>,
    pub priority: Priority,
}

impl FlowDerivationInput {
    pub fn for_contract(contract: &Contract) -> Self {
        Self { value: Some(contract.declared_value()), priority: contract.priority }
    }
}

/// One row of the routing table. A rule fires when the value exceeds
/// `value_trigger`, or when `escalated_priority_triggers` is set and the
/// contract is high or urgent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub approver_role: ApproverRole,
    pub required_hierarchy_level: u8,
    pub value_trigger: Decimal,
    pub escalated_priority_triggers: bool,
    pub contract_value_threshold: Option<ValueThreshold>,
}

impl ApprovalRule {
    fn applies(&self, value: Decimal, priority: Priority) -> bool {
        value > self.value_trigger || (self.escalated_priority_triggers && priority.is_escalated())
    }
}

pub fn default_rule_table() -> Vec<ApprovalRule> {
    vec![
        ApprovalRule {
            approver_role: ApproverRole::Manager,
            required_hierarchy_level: 2,
            value_trigger: Decimal::from(10_000_000),
            escalated_priority_triggers: false,
            contract_value_threshold: Some(ValueThreshold::UpTo(Decimal::from(50_000_000))),
        },
        ApprovalRule {
            approver_role: ApproverRole::Legal,
            required_hierarchy_level: 2,
            value_trigger: Decimal::from(20_000_000),
            escalated_priority_triggers: true,
            contract_value_threshold: None,
        },
        ApprovalRule {
            approver_role: ApproverRole::Finance,
            required_hierarchy_level: 2,
            value_trigger: Decimal::from(30_000_000),
            escalated_priority_triggers: true,
            contract_value_threshold: None,
        },
        ApprovalRule {
            approver_role: ApproverRole::Director,
            required_hierarchy_level: 3,
            value_trigger: Decimal::from(50_000_000),
            escalated_priority_triggers: false,
            contract_value_threshold: Some(ValueThreshold::UpTo(Decimal::from(200_000_000))),
        },
        ApprovalRule {
            approver_role: ApproverRole::Ceo,
            required_hierarchy_level: 4,
            value_trigger: Decimal::from(200_000_000),
            escalated_priority_triggers: false,
            contract_value_threshold: Some(ValueThreshold::Unbounded),
        },
    ]
}

/// Stateless deriver over a fixed rule table.
#[derive(Clone, Debug)]
pub struct FlowDeriver {
    rules: Vec<ApprovalRule>,
}

impl Default for FlowDeriver {
    fn default() -> Self {
        Self::new(default_rule_table())
    }
}

impl FlowDeriver {
    pub fn new(rules: Vec<ApprovalRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ApprovalRule] {
        &self.rules
    }

    /// Fresh pending steps, numbered 1..N in table order.
    pub fn derive(&self, input: &FlowDerivationInput) -> Result<Vec<ApprovalStep>, WorkflowError> {
        let value = input.value.unwrap_or(Decimal::ZERO);
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ValidationFailure::NegativeContractValue { value }.into());
        }

        let steps = self
            .rules
            .iter()
            .filter(|rule| rule.applies(value, input.priority))
            .zip(1_u32..)
            .map(|(rule, step_number)| {
                ApprovalStep::pending(
                    step_number,
                    rule.approver_role,
                    rule.required_hierarchy_level,
                    rule.contract_value_threshold,
                )
            })
            .collect();

        Ok(steps)
    }
}

pub fn derive_approval_flow(input: &FlowDerivationInput) -> Result<Vec<ApprovalStep>, WorkflowError> {
    FlowDeriver::default().derive(input)
}

/// Attaches a freshly derived flow; refused once any step is resolved.
pub fn apply_approval_flow(
    contract: &mut Contract,
    steps: Vec<ApprovalStep>,
) -> Result<(), WorkflowError> {
    contract.replace_approval_flow(steps)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{derive_approval_flow, FlowDerivationInput, FlowDeriver};
    use crate::domain::approval::{ApprovalStep, ApproverRole, StepStatus, ValueThreshold};
    use crate::domain::contract::Priority;
    use crate::errors::{ValidationFailure, WorkflowError};

    const ALL_PRIORITIES: [Priority; 4] =
        [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    fn derive(value: i64, priority: Priority) -> Vec<ApprovalStep> {
        derive_approval_flow(&FlowDerivationInput { value: Some(Decimal::from(value)), priority })
            .expect("derivation should succeed")
    }

    fn roles(steps: &[ApprovalStep]) -> Vec<ApproverRole> {
        steps.iter().map(|step| step.approver_role).collect()
    }

    type StepShape = (u32, ApproverRole, u8, Option<ValueThreshold>);

    fn shape(steps: &[ApprovalStep]) -> Vec<StepShape> {
        steps
            .iter()
            .map(|step| {
                (
                    step.step_number,
                    step.approver_role,
                    step.required_hierarchy_level,
                    step.contract_value_threshold,
                )
            })
            .collect()
    }

    #[test]
    fn low_priority_at_or_below_ten_million_needs_no_approval() {
        for value in [0, 1, 5_000_000, 9_999_999, 10_000_000] {
            assert!(derive(value, Priority::Low).is_empty(), "value {value} should not need steps");
        }
    }

    #[test]
    fn unknown_value_counts_as_zero() {
        let steps =
            derive_approval_flow(&FlowDerivationInput { value: None, priority: Priority::Medium })
                .expect("derivation");
        assert!(steps.is_empty());
    }

    #[test]
    fn manager_only_between_ten_and_twenty_million() {
        let steps = derive(15_000_000, Priority::Medium);

        assert_eq!(roles(&steps), vec![ApproverRole::Manager]);
        assert_eq!(steps[0].step_number, 1);
        assert_eq!(steps[0].required_hierarchy_level, 2);
        assert_eq!(
            steps[0].contract_value_threshold,
            Some(ValueThreshold::UpTo(Decimal::from(50_000_000)))
        );
    }

    #[test]
    fn sixty_million_medium_routes_through_four_tiers() {
        let steps = derive(60_000_000, Priority::Medium);

        assert_eq!(
            roles(&steps),
            vec![
                ApproverRole::Manager,
                ApproverRole::Legal,
                ApproverRole::Finance,
                ApproverRole::Director
            ]
        );
        assert_eq!(
            steps.iter().map(|step| step.step_number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(steps[3].required_hierarchy_level, 3);
        assert_eq!(steps[1].contract_value_threshold, None);
        assert_eq!(steps[2].contract_value_threshold, None);
    }

    #[test]
    fn above_two_hundred_million_urgent_requires_every_tier() {
        let steps = derive(250_000_000, Priority::Urgent);

        assert_eq!(steps.len(), 5);
        let ceo = &steps[4];
        assert_eq!(ceo.approver_role, ApproverRole::Ceo);
        assert_eq!(ceo.step_number, 5);
        assert_eq!(ceo.required_hierarchy_level, 4);
        assert_eq!(ceo.contract_value_threshold, Some(ValueThreshold::Unbounded));
        assert!(steps.iter().all(|step| step.status == StepStatus::Pending));
        assert!(steps.iter().all(|step| step.approver_id.is_none()));
    }

    #[test]
    fn escalated_priority_adds_legal_and_finance_regardless_of_value() {
        for priority in [Priority::High, Priority::Urgent] {
            let steps = derive(0, priority);
            assert_eq!(roles(&steps), vec![ApproverRole::Legal, ApproverRole::Finance]);
            assert_eq!(steps[0].step_number, 1);
            assert_eq!(steps[1].step_number, 2);
        }
    }

    #[test]
    fn thresholds_are_strictly_greater_than() {
        assert_eq!(roles(&derive(20_000_000, Priority::Low)), vec![ApproverRole::Manager]);
        assert_eq!(
            roles(&derive(20_000_001, Priority::Low)),
            vec![ApproverRole::Manager, ApproverRole::Legal]
        );
        assert_eq!(derive(200_000_000, Priority::Low).len(), 4);
        assert_eq!(derive(200_000_001, Priority::Low).len(), 5);
    }

    #[test]
    fn raising_value_never_removes_a_step() {
        let values = [
            0,
            10_000_000,
            10_000_001,
            20_000_001,
            30_000_001,
            50_000_000,
            50_000_001,
            120_000_000,
            200_000_001,
            1_000_000_000,
        ];

        for priority in ALL_PRIORITIES {
            let mut previous: Vec<ApproverRole> = Vec::new();
            for value in values {
                let current = roles(&derive(value, priority));
                assert!(
                    previous.iter().all(|role| current.contains(role)),
                    "value {value} at {priority} dropped a step: {previous:?} -> {current:?}"
                );
                assert!(current.len() >= previous.len());
                previous = current;
            }
        }
    }

    #[test]
    fn derivation_is_idempotent_but_issues_fresh_identities() {
        for priority in ALL_PRIORITIES {
            let first = derive(250_000_000, priority);
            let second = derive(250_000_000, priority);

            assert_eq!(shape(&first), shape(&second));
            for (left, right) in first.iter().zip(&second) {
                assert_ne!(left.id, right.id);
            }
        }
    }

    #[test]
    fn negative_value_is_rejected() {
        let error = derive_approval_flow(&FlowDerivationInput {
            value: Some(Decimal::from(-1)),
            priority: Priority::Low,
        })
        .expect_err("negative values are malformed");

        assert_eq!(
            error,
            WorkflowError::Validation(ValidationFailure::NegativeContractValue {
                value: Decimal::from(-1)
            })
        );
    }

    #[test]
    fn unknown_priority_text_is_a_validation_error() {
        let error = "critical".parse::<Priority>().expect_err("unknown priority");
        assert!(matches!(
            error,
            WorkflowError::Validation(ValidationFailure::UnknownPriority { ref value }) if value == "critical"
        ));
        assert_eq!("URGENT".parse::<Priority>().expect("urgent"), Priority::Urgent);
    }

    #[test]
    fn custom_rule_tables_are_honored() {
        let mut rules = super::default_rule_table();
        rules.retain(|rule| rule.approver_role != ApproverRole::Finance);
        let deriver = FlowDeriver::new(rules);

        let steps = deriver
            .derive(&FlowDerivationInput {
                value: Some(Decimal::from(60_000_000)),
                priority: Priority::Medium,
            })
            .expect("derive");

        assert_eq!(
            roles(&steps),
            vec![ApproverRole::Manager, ApproverRole::Legal, ApproverRole::Director]
        );
        assert_eq!(steps[2].step_number, 3);
    }
}
