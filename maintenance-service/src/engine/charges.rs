//! Charge calculation: base breakdown plus layered adjustments.
//!
//! The calculation is an ordered pipeline of pure steps over a
//! [`ChargeBreakdown`] accumulator. Steps run in a fixed order because the
//! percentage rules of later steps are taken over the base total produced by
//! the first one.

use super::error::EngineError;
use super::{percent_of, round_money};
use crate::models::{BillingConfig, DiscountRule, FlatBillingInput, RateType};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Accumulated charges for one flat in one period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargeBreakdown {
    pub breakdown: BTreeMap<String, Decimal>,
    pub total: Decimal,
    pub discount_amount: Decimal,
    pub discount_reasons: Vec<String>,
    pub waiver_amount: Decimal,
    pub waiver_reason: Option<String>,
    pub penalty_amount: Decimal,
    pub penalty_reasons: Vec<String>,
    pub ad_hoc_total: Decimal,
}

impl ChargeBreakdown {
    /// Base for interest accrual.
    pub fn interest_principal(&self) -> Decimal {
        (self.total - self.discount_amount - self.waiver_amount).max(Decimal::ZERO)
    }

    pub fn discount_reason(&self) -> Option<String> {
        join_reasons(&self.discount_reasons)
    }

    pub fn penalty_reason(&self) -> Option<String> {
        join_reasons(&self.penalty_reasons)
    }
}

fn join_reasons(reasons: &[String]) -> Option<String> {
    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join(", "))
    }
}

struct ChargeContext<'a> {
    config: &'a BillingConfig,
    flat: &'a FlatBillingInput,
    due_date: NaiveDate,
    today: NaiveDate,
}

type Step = fn(&ChargeContext<'_>, ChargeBreakdown) -> Result<ChargeBreakdown, EngineError>;

const PIPELINE: [(&str, Step); 5] = [
    ("base", base_charges),
    ("discount", discounts),
    ("waiver", waivers),
    ("penalty", penalties),
    ("ad_hoc", ad_hoc_charges),
];

/// Compute the charges for `flat` under `config`. `today` is the calendar
/// date of the generation instant.
pub fn compute_charges(
    config: &BillingConfig,
    flat: &FlatBillingInput,
    due_date: NaiveDate,
    today: NaiveDate,
) -> Result<ChargeBreakdown, EngineError> {
    let ctx = ChargeContext {
        config,
        flat,
        due_date,
        today,
    };
    PIPELINE
        .iter()
        .try_fold(ChargeBreakdown::default(), |acc, (name, step)| {
            tracing::trace!(step = *name, flat_number = %flat.flat_number, "charge step");
            step(&ctx, acc)
        })
}

fn base_charges(ctx: &ChargeContext<'_>, mut acc: ChargeBreakdown) -> Result<ChargeBreakdown, EngineError> {
    for category in &ctx.config.categories {
        let rate = category
            .per_flat_type
            .get(&ctx.flat.flat_type)
            .copied()
            .ok_or_else(|| EngineError::MissingRate {
                category: category.key.clone(),
                flat_type: ctx.flat.flat_type.clone(),
                flat_number: ctx.flat.flat_number.clone(),
            })?;
        acc.breakdown.insert(category.key.clone(), rate);
        acc.total += rate;
    }
    Ok(acc)
}

fn discounts(ctx: &ChargeContext<'_>, mut acc: ChargeBreakdown) -> Result<ChargeBreakdown, EngineError> {
    let days_before_due = (ctx.due_date - ctx.today).num_days();
    for rule in &ctx.config.discount_rules {
        if let DiscountRule::EarlyPayment {
            label,
            before_days,
            rate_type,
            amount,
        } = rule
        {
            if days_before_due >= *before_days {
                acc.discount_amount += rated(*rate_type, *amount, acc.total);
                acc.discount_reasons.push(label.clone());
            }
        }
    }

    if let Some(extra) = ctx.flat.discount_amount {
        acc.discount_amount += extra;
        if let Some(reason) = &ctx.flat.discount_reason {
            acc.discount_reasons.push(reason.clone());
        }
    }
    Ok(acc)
}

fn waivers(ctx: &ChargeContext<'_>, mut acc: ChargeBreakdown) -> Result<ChargeBreakdown, EngineError> {
    acc.waiver_amount = ctx.flat.waiver_amount.unwrap_or_default();
    acc.waiver_reason = ctx.flat.waiver_reason.clone();
    Ok(acc)
}

fn penalties(ctx: &ChargeContext<'_>, mut acc: ChargeBreakdown) -> Result<ChargeBreakdown, EngineError> {
    if let Some(rule) = ctx
        .config
        .penalty_rules
        .late_payment
        .as_ref()
        .filter(|rule| rule.enabled)
    {
        let grace_end = ctx.due_date + chrono::Duration::days(rule.days_after_due);
        if ctx.today > grace_end {
            let mut penalty = rated(rule.rate_type, rule.amount, acc.total);
            if let Some(cap) = rule.max_amount {
                penalty = penalty.min(cap);
            }
            acc.penalty_amount += penalty;
            acc.penalty_reasons.push("Late payment penalty".to_string());
        }
    }

    if let Some(extra) = ctx.flat.penalty_amount {
        acc.penalty_amount += extra;
        if let Some(reason) = &ctx.flat.penalty_reason {
            acc.penalty_reasons.push(reason.clone());
        }
    }
    Ok(acc)
}

fn ad_hoc_charges(ctx: &ChargeContext<'_>, mut acc: ChargeBreakdown) -> Result<ChargeBreakdown, EngineError> {
    acc.ad_hoc_total = ctx.flat.ad_hoc_charges.iter().map(|c| c.amount).sum();
    Ok(acc)
}

fn rated(rate_type: RateType, amount: Decimal, total: Decimal) -> Decimal {
    match rate_type {
        RateType::Fixed => amount,
        RateType::Percent => round_money(percent_of(total, amount)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdHocCharge, LatePaymentPenalty};
    use serde_json::json;

    fn config() -> BillingConfig {
        serde_json::from_value(json!({
            "effective_from": "2024-01-01",
            "flat_types": ["1BHK", "2BHK"],
            "categories": [
                { "key": "maintenance", "label": "Maintenance", "per_flat_type": { "1BHK": "800", "2BHK": "1000" } },
                { "key": "sinking_fund", "label": "Sinking fund", "per_flat_type": { "1BHK": "150", "2BHK": "200" } }
            ]
        }))
        .unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn every_category_contributes_its_rate() {
        let flat = FlatBillingInput::new("A-101", "2BHK", "u-1");
        let charges = compute_charges(&config(), &flat, date("2024-05-10"), date("2024-05-01")).unwrap();

        assert_eq!(charges.breakdown.len(), 2);
        assert_eq!(charges.breakdown["maintenance"], d("1000"));
        assert_eq!(charges.breakdown["sinking_fund"], d("200"));
        assert_eq!(charges.total, d("1200"));
        assert_eq!(charges.discount_amount, Decimal::ZERO);
        assert_eq!(charges.penalty_amount, Decimal::ZERO);
    }

    #[test]
    fn missing_rate_names_category_and_flat_type() {
        let flat = FlatBillingInput::new("C-7", "3BHK", "u-9");
        let err = compute_charges(&config(), &flat, date("2024-05-10"), date("2024-05-01")).unwrap_err();
        match err {
            EngineError::MissingRate {
                category,
                flat_type,
                flat_number,
            } => {
                assert_eq!(category, "maintenance");
                assert_eq!(flat_type, "3BHK");
                assert_eq!(flat_number, "C-7");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn early_payment_discount_applies_inside_window() {
        let mut config = config();
        config.categories.truncate(1);
        config.discount_rules = vec![DiscountRule::EarlyPayment {
            label: "Early payment".to_string(),
            before_days: 10,
            rate_type: RateType::Percent,
            amount: d("5"),
        }];
        let flat = FlatBillingInput::new("A-101", "2BHK", "u-1");

        let early = compute_charges(&config, &flat, date("2024-05-16"), date("2024-05-01")).unwrap();
        assert_eq!(early.discount_amount, d("50"));
        assert_eq!(early.discount_reason().as_deref(), Some("Early payment"));

        let late = compute_charges(&config, &flat, date("2024-05-05"), date("2024-05-01")).unwrap();
        assert_eq!(late.discount_amount, Decimal::ZERO);
        assert!(late.discount_reason().is_none());
    }

    #[test]
    fn unsupported_discount_rules_are_ignored() {
        let mut config = config();
        config.discount_rules = vec![DiscountRule::Unsupported];
        let flat = FlatBillingInput::new("A-101", "1BHK", "u-1");
        let charges = compute_charges(&config, &flat, date("2024-05-30"), date("2024-05-01")).unwrap();
        assert_eq!(charges.discount_amount, Decimal::ZERO);
    }

    #[test]
    fn overrides_add_on_top_of_rules() {
        let mut flat = FlatBillingInput::new("A-101", "2BHK", "u-1");
        flat.discount_amount = Some(d("25"));
        flat.discount_reason = Some("Committee member".to_string());
        flat.waiver_amount = Some(d("100"));
        flat.waiver_reason = Some("Hardship".to_string());
        flat.ad_hoc_charges = vec![AdHocCharge {
            label: "Parking sticker".to_string(),
            amount: d("75.50"),
            description: None,
            is_one_time: true,
            category_key: None,
        }];

        let charges = compute_charges(&config(), &flat, date("2024-05-10"), date("2024-05-01")).unwrap();
        assert_eq!(charges.discount_amount, d("25"));
        assert_eq!(charges.waiver_amount, d("100"));
        assert_eq!(charges.waiver_reason.as_deref(), Some("Hardship"));
        assert_eq!(charges.ad_hoc_total, d("75.50"));
        assert_eq!(charges.interest_principal(), d("1075"));
    }

    #[test]
    fn late_penalty_is_capped() {
        let mut config = config();
        config.penalty_rules.late_payment = Some(LatePaymentPenalty {
            enabled: true,
            days_after_due: 5,
            rate_type: RateType::Percent,
            amount: d("10"),
            max_amount: Some(d("100")),
        });
        let flat = FlatBillingInput::new("A-101", "2BHK", "u-1");

        let within_grace = compute_charges(&config, &flat, date("2024-05-01"), date("2024-05-06")).unwrap();
        assert_eq!(within_grace.penalty_amount, Decimal::ZERO);

        let overdue = compute_charges(&config, &flat, date("2024-05-01"), date("2024-05-07")).unwrap();
        assert_eq!(overdue.penalty_amount, d("100"));
        assert_eq!(overdue.penalty_reason().as_deref(), Some("Late payment penalty"));
    }

    #[test]
    fn percentage_amounts_round_to_cents() {
        let mut config = config();
        config.discount_rules = vec![DiscountRule::EarlyPayment {
            label: "Early".to_string(),
            before_days: 0,
            rate_type: RateType::Percent,
            amount: d("3.333"),
        }];
        let flat = FlatBillingInput::new("A-101", "1BHK", "u-1");
        let charges = compute_charges(&config, &flat, date("2024-05-01"), date("2024-05-01")).unwrap();
        // 950 * 3.333% = 31.6635
        assert_eq!(charges.discount_amount, d("31.66"));
    }
}
