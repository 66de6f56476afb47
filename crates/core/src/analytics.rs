use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::ApproverRole;
use crate::domain::contract::{Contract, ContractStatus};

const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsOptions {
    pub expiring_soon_days: u32,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self { expiring_soon_days: 30 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionReasonCount {
    pub reason: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_contracts: usize,
    pub pending_approval: usize,
    pub approved: usize,
    pub rejected: usize,
    pub expiring_soon: usize,
    pub average_processing_days: Decimal,
    /// Percentage of decided contracts that were approved, rounded.
    pub approval_rate: u32,
    pub monthly_uploads: [usize; 12],
    pub rejection_reasons: Vec<RejectionReasonCount>,
}

impl DashboardStats {
    pub fn compute(contracts: &[Contract], today: NaiveDate, options: AnalyticsOptions) -> Self {
        let count = |status: ContractStatus| {
            contracts.iter().filter(|contract| contract.status == status).count()
        };
        let approved = count(ContractStatus::Approved);
        let signed = count(ContractStatus::Signed);
        let rejected = count(ContractStatus::Rejected);

        Self {
            total_contracts: contracts.len(),
            pending_approval: count(ContractStatus::Pending),
            approved,
            rejected,
            expiring_soon: expiring_soon(contracts, today, options.expiring_soon_days),
            average_processing_days: average_processing_days(contracts),
            approval_rate: approval_rate(approved + signed, rejected),
            monthly_uploads: monthly_uploads(contracts, today.year()),
            rejection_reasons: rejection_reasons(contracts),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStepTime {
    pub role: ApproverRole,
    pub resolved_steps: usize,
    pub average_minutes: Decimal,
}

/// Mean time spent on resolved steps, per approver role, in routing order.
pub fn step_time_by_role(contracts: &[Contract]) -> Vec<RoleStepTime> {
    let roles = [
        ApproverRole::Manager,
        ApproverRole::Legal,
        ApproverRole::Finance,
        ApproverRole::Director,
        ApproverRole::Ceo,
    ];

    roles
        .into_iter()
        .filter_map(|role| {
            let minutes: Vec<u32> = contracts
                .iter()
                .flat_map(|contract| contract.approval_steps.iter())
                .filter(|step| step.approver_role == role)
                .filter_map(|step| step.time_spent_minutes)
                .collect();
            if minutes.is_empty() {
                return None;
            }
            let total: u64 = minutes.iter().map(|value| u64::from(*value)).sum();
            let average = Decimal::from(total) / Decimal::from(minutes.len());
            Some(RoleStepTime {
                role,
                resolved_steps: minutes.len(),
                average_minutes: average.round_dp(1),
            })
        })
        .collect()
}

fn expiring_soon(contracts: &[Contract], today: NaiveDate, window_days: u32) -> usize {
    let horizon = today.checked_add_days(Days::new(u64::from(window_days))).unwrap_or(NaiveDate::MAX);
    contracts
        .iter()
        .filter(|contract| !matches!(contract.status, ContractStatus::Rejected | ContractStatus::Expired))
        .filter_map(|contract| contract.expiry_date)
        .filter(|expiry| *expiry >= today && *expiry <= horizon)
        .count()
}

fn average_processing_days(contracts: &[Contract]) -> Decimal {
    let durations: Vec<i64> = contracts
        .iter()
        .filter_map(|contract| {
            contract.reviewed_at.map(|reviewed| (reviewed - contract.uploaded_at).num_minutes().max(0))
        })
        .collect();
    if durations.is_empty() {
        return Decimal::ZERO;
    }

    let total_minutes: i64 = durations.iter().sum();
    let days = Decimal::from(total_minutes)
        / Decimal::from(MINUTES_PER_DAY)
        / Decimal::from(durations.len());
    days.round_dp(1)
}

fn approval_rate(approved: usize, rejected: usize) -> u32 {
    let decided = approved + rejected;
    if decided == 0 {
        return 0;
    }
    let rate = (Decimal::from(approved) * Decimal::ONE_HUNDRED / Decimal::from(decided)).round();
    rate.to_u32().unwrap_or(100)
}

fn monthly_uploads(contracts: &[Contract], year: i32) -> [usize; 12] {
    let mut buckets = [0; 12];
    for contract in contracts.iter().filter(|contract| contract.uploaded_at.year() == year) {
        let month = contract.uploaded_at.month0() as usize;
        buckets[month] += 1;
    }
    buckets
}

fn rejection_reasons(contracts: &[Contract]) -> Vec<RejectionReasonCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for reason in contracts
        .iter()
        .filter_map(|contract| contract.rejection_reason.as_deref())
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
    {
        *counts.entry(reason.to_string()).or_default() += 1;
    }

    let mut reasons: Vec<RejectionReasonCount> =
        counts.into_iter().map(|(reason, count)| RejectionReasonCount { reason, count }).collect();
    reasons.sort_by(|left, right| right.count.cmp(&left.count).then_with(|| left.reason.cmp(&right.reason)));
    reasons
}
