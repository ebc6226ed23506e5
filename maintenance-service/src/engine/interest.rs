//! Overdue interest accrual.

use super::{round_money, EngineError};
use crate::models::{Compounding, InterestRules, RateType};
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct InterestAccrual {
    pub amount: Decimal,
    pub reason: String,
    pub periods_overdue: u32,
}

/// Interest owed on `principal` as of `today`. Returns `Ok(None)` when the
/// rules are disabled, the grace period has not elapsed or nothing accrued.
///
/// Fixed-rate interest accrues per period regardless of the principal. Percent
/// accrual stops once `max_amount` is reached; an uncapped amount too large
/// for a `Decimal` is an error.
pub fn accrue(
    rules: &InterestRules,
    due_date: NaiveDate,
    today: NaiveDate,
    principal: Decimal,
) -> Result<Option<InterestAccrual>, EngineError> {
    if !rules.enabled {
        return Ok(None);
    }
    let start = due_date + Duration::days(rules.days_after_due);
    if today <= start {
        return Ok(None);
    }

    let periods = periods_overdue(rules.compounding, start, today);
    if periods == 0 {
        return Ok(None);
    }

    let mut amount = match rules.rate_type {
        RateType::Fixed => rules
            .amount
            .checked_mul(Decimal::from(periods))
            .or(rules.max_amount)
            .ok_or(EngineError::InterestOverflow { periods })?,
        RateType::Percent if principal <= Decimal::ZERO => return Ok(None),
        RateType::Percent => percent_accrual(rules, principal, periods)?,
    };
    if let Some(cap) = rules.max_amount {
        amount = amount.min(cap);
    }
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Ok(None);
    }

    Ok(Some(InterestAccrual {
        amount,
        reason: rules
            .description
            .clone()
            .unwrap_or_else(|| describe(rules, periods)),
        periods_overdue: periods,
    }))
}

fn percent_accrual(rules: &InterestRules, principal: Decimal, periods: u32) -> Result<Decimal, EngineError> {
    // past the cap (or past Decimal::MAX with a cap set) the capped amount is owed
    let exhausted = || rules.max_amount.ok_or(EngineError::InterestOverflow { periods });
    let rate = rules.amount / Decimal::ONE_HUNDRED;

    if rules.compounding == Compounding::Simple {
        return match rate
            .checked_mul(principal)
            .and_then(|per_period| per_period.checked_mul(Decimal::from(periods)))
        {
            Some(accrued) => Ok(accrued),
            None => exhausted(),
        };
    }

    let mut base = principal;
    let mut accrued = Decimal::ZERO;
    for _ in 0..periods {
        let Some(interest) = base.checked_mul(rate) else {
            return exhausted();
        };
        match (accrued.checked_add(interest), base.checked_add(interest)) {
            (Some(total), Some(next_base)) => {
                accrued = total;
                base = next_base;
            }
            _ => return exhausted(),
        }
        if rules.max_amount.is_some_and(|cap| accrued >= cap) {
            break;
        }
    }
    Ok(accrued)
}

/// Elapsed accrual periods between `start` and `today`: whole days for daily
/// compounding, otherwise calendar months with a started month counted.
pub fn periods_overdue(compounding: Compounding, start: NaiveDate, today: NaiveDate) -> u32 {
    if today <= start {
        return 0;
    }
    match compounding {
        Compounding::Daily => (today - start).num_days().max(0) as u32,
        Compounding::Monthly | Compounding::Simple => {
            let mut months = (today.year() - start.year()) * 12
                + (today.month() as i32 - start.month() as i32);
            if today.day() > start.day() {
                months += 1;
            }
            months.max(0) as u32
        }
    }
}

fn describe(rules: &InterestRules, periods: u32) -> String {
    let unit = match (rules.compounding, periods) {
        (Compounding::Daily, 1) => "day",
        (Compounding::Daily, _) => "days",
        (_, 1) => "month",
        _ => "months",
    };
    match rules.rate_type {
        RateType::Percent => format!(
            "Interest at {}% ({}) for {} {} overdue",
            rules.amount.normalize(),
            compounding_label(rules.compounding),
            periods,
            unit
        ),
        RateType::Fixed => format!(
            "Interest of {} per {} for {} {} overdue",
            rules.amount.normalize(),
            unit.trim_end_matches('s'),
            periods,
            unit
        ),
    }
}

fn compounding_label(compounding: Compounding) -> &'static str {
    match compounding {
        Compounding::Daily => "compounded daily",
        Compounding::Monthly => "compounded monthly",
        Compounding::Simple => "simple",
    }
}
