//! Assembly of complete bills from resolved configs.

use super::charges::compute_charges;
use super::error::EngineError;
use super::interest::accrue;
use super::resolver::resolve;
use crate::models::{
    non_zero, Actor, ApprovalEntry, ApprovalStatus, AuditEntry, AuditTrail, BillStatus,
    BillingConfig, FlatBillingInput, MaintenanceBill, Period,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Request-wide inputs shared by every bill of a generation run.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub society_id: &'a str,
    pub due_date: NaiveDate,
    pub notes: Option<&'a str>,
    pub now: DateTime<Utc>,
    pub actor: &'a Actor,
}

/// What happens to validated periods when another period of the same batch
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Any failed period fails the whole request before anything is stored.
    #[default]
    AbortAll,
    /// Failed periods are reported; the rest are stored.
    KeepValidated,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort_all" => Ok(FailurePolicy::AbortAll),
            "keep_validated" => Ok(FailurePolicy::KeepValidated),
            other => Err(format!("Unknown generation failure policy: {}", other)),
        }
    }
}

#[derive(Debug)]
pub struct PeriodFailure {
    pub period: Period,
    pub error: EngineError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub bills: Vec<MaintenanceBill>,
    pub failures: Vec<PeriodFailure>,
}

/// Build one bill for `flat` in `period` under `config`.
pub fn build_bill(
    config: &BillingConfig,
    flat: &FlatBillingInput,
    period: Period,
    ctx: &GenerationContext<'_>,
) -> Result<MaintenanceBill, EngineError> {
    let today = ctx.now.date_naive();
    let charges = compute_charges(config, flat, ctx.due_date, today)?;
    let interest = accrue(
        &config.interest_rules,
        ctx.due_date,
        today,
        charges.interest_principal(),
    )?;

    let mut bill = new_draft(
        ctx,
        &flat.flat_number,
        &flat.user_id,
        period,
        charges.breakdown.clone(),
    );
    bill.discount_amount = non_zero(charges.discount_amount);
    bill.discount_reason = bill.discount_amount.and(charges.discount_reason());
    bill.waiver_amount = non_zero(charges.waiver_amount);
    bill.waiver_reason = bill.waiver_amount.and(charges.waiver_reason.clone());
    bill.penalty_amount = non_zero(charges.penalty_amount);
    bill.penalty_reason = bill.penalty_amount.and(charges.penalty_reason());
    if let Some(accrual) = interest {
        bill.interest_amount = Some(accrual.amount);
        bill.interest_reason = Some(accrual.reason);
    }
    bill.ad_hoc_charges = flat.ad_hoc_charges.clone();
    bill.config_effective_from = Some(config.effective_from);
    bill.recompute_amount();
    Ok(bill)
}

/// Manual one-off bill that bypasses the rule engine. The whole amount is
/// booked under a single `manual` breakdown entry.
pub fn build_manual_bill(
    flat_number: &str,
    user_id: &str,
    period: Period,
    amount: Decimal,
    ctx: &GenerationContext<'_>,
) -> Result<MaintenanceBill, EngineError> {
    if amount < Decimal::ZERO {
        return Err(EngineError::validation("amount must not be negative"));
    }
    let breakdown = BTreeMap::from([("manual".to_string(), amount)]);
    let mut bill = new_draft(ctx, flat_number, user_id, period, breakdown);
    bill.recompute_amount();
    Ok(bill)
}

fn new_draft(
    ctx: &GenerationContext<'_>,
    flat_number: &str,
    user_id: &str,
    period: Period,
    breakdown: BTreeMap<String, Decimal>,
) -> MaintenanceBill {
    let mut audit_trail = AuditTrail::default();
    audit_trail.append(AuditEntry::created(ctx.actor, ctx.now, None));

    MaintenanceBill {
        id: Uuid::new_v4().to_string(),
        society_id: ctx.society_id.to_string(),
        flat_number: flat_number.to_string(),
        user_id: user_id.to_string(),
        period,
        amount: Decimal::ZERO,
        breakdown,
        discount_amount: None,
        discount_reason: None,
        waiver_amount: None,
        waiver_reason: None,
        penalty_amount: None,
        penalty_reason: None,
        interest_amount: None,
        interest_reason: None,
        ad_hoc_charges: Vec::new(),
        due_date: ctx.due_date,
        notes: ctx.notes.map(str::to_string),
        status: BillStatus::Unpaid,
        approval_status: ApprovalStatus::Draft,
        approval_history: vec![ApprovalEntry {
            status: ApprovalStatus::Draft,
            changed_by: ctx.actor.id.clone(),
            changed_by_name: ctx.actor.name.clone(),
            changed_at: ctx.now,
            notes: None,
        }],
        audit_trail,
        version: 1,
        config_effective_from: None,
        created_at: ctx.now,
        updated_at: ctx.now,
    }
}

/// Every flat must have a type and a rate in every category before any bill
/// of the period is built.
fn validate_coverage(config: &BillingConfig, flats: &[FlatBillingInput]) -> Result<(), EngineError> {
    for flat in flats {
        if flat.flat_type.trim().is_empty() {
            return Err(EngineError::validation(format!(
                "flat {} is missing flat_type",
                flat.flat_number
            )));
        }
        if let Some(category) = config
            .categories
            .iter()
            .find(|category| !category.per_flat_type.contains_key(&flat.flat_type))
        {
            return Err(EngineError::MissingRate {
                category: category.key.clone(),
                flat_type: flat.flat_type.clone(),
                flat_number: flat.flat_number.clone(),
            });
        }
    }
    Ok(())
}

/// One bill per flat for a single period.
pub fn generate(
    config: &BillingConfig,
    flats: &[FlatBillingInput],
    period: Period,
    ctx: &GenerationContext<'_>,
) -> Result<Vec<MaintenanceBill>, EngineError> {
    if flats.is_empty() {
        return Err(EngineError::validation("at least one flat is required"));
    }
    validate_coverage(config, flats)?;
    flats
        .iter()
        .map(|flat| build_bill(config, flat, period, ctx))
        .collect()
}

/// Bills for every flat in every period. Each period resolves its own config.
pub fn generate_batch(
    configs: &[BillingConfig],
    flats: &[FlatBillingInput],
    periods: &[Period],
    ctx: &GenerationContext<'_>,
    policy: FailurePolicy,
) -> Result<BatchOutcome, EngineError> {
    if periods.is_empty() {
        return Err(EngineError::validation("at least one period is required"));
    }

    let mut outcome = BatchOutcome::default();
    for &period in periods {
        let result = resolve(configs, period).and_then(|config| generate(config, flats, period, ctx));
        match (result, policy) {
            (Ok(bills), _) => outcome.bills.extend(bills),
            (Err(error), FailurePolicy::AbortAll) => return Err(error),
            (Err(error), FailurePolicy::KeepValidated) => {
                tracing::warn!(period = %period, error = %error, "Skipping period");
                outcome.failures.push(PeriodFailure { period, error });
            }
        }
    }

    if outcome.bills.is_empty() && !outcome.failures.is_empty() {
        return Err(outcome.failures.swap_remove(0).error);
    }
    Ok(outcome)
}
