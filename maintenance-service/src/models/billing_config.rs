//! Versioned per-society billing configuration.

use super::audit::AuditTrail;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Whether an amount is an absolute value or a percentage of the base total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    Percent,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    #[default]
    Recurring,
    OneTime,
}

/// How overdue interest feeds back into the interest base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compounding {
    Daily,
    #[default]
    Monthly,
    /// Simple interest repeated per elapsed month.
    #[serde(rename = "none", alias = "simple")]
    Simple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub key: String,
    pub label: String,
    pub per_flat_type: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub charge_type: ChargeType,
    #[serde(default = "default_true")]
    pub is_mandatory: bool,
}

fn default_true() -> bool {
    true
}

/// Config-level discount rules. Unknown rule types are kept as `Unsupported`
/// and never contribute a discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountRule {
    EarlyPayment {
        label: String,
        before_days: i64,
        rate_type: RateType,
        amount: Decimal,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatePaymentPenalty {
    pub enabled: bool,
    #[serde(default)]
    pub days_after_due: i64,
    pub rate_type: RateType,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PenaltyRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_payment: Option<LatePaymentPenalty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRules {
    pub enabled: bool,
    #[serde(default)]
    pub days_after_due: i64,
    pub rate_type: RateType,
    pub amount: Decimal,
    #[serde(default)]
    pub compounding: Compounding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    #[serde(default)]
    pub per_category: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for InterestRules {
    fn default() -> Self {
        Self {
            enabled: false,
            days_after_due: 0,
            rate_type: RateType::Percent,
            amount: Decimal::ZERO,
            compounding: Compounding::default(),
            max_amount: None,
            per_category: false,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    pub effective_from: NaiveDate,
    pub flat_types: BTreeSet<String>,
    pub categories: Vec<Category>,
    #[serde(default)]
    pub discount_rules: Vec<DiscountRule>,
    #[serde(default)]
    pub penalty_rules: PenaltyRules,
    #[serde(default)]
    pub interest_rules: InterestRules,
    #[serde(default)]
    pub audit_trail: AuditTrail,
}

impl BillingConfig {
    /// Categories lacking a rate for one of the declared flat types, as
    /// `(category_key, flat_type)` pairs.
    pub fn missing_rates(&self) -> Vec<(String, String)> {
        self.categories
            .iter()
            .flat_map(|category| {
                self.flat_types
                    .iter()
                    .filter(|flat_type| !category.per_flat_type.contains_key(*flat_type))
                    .map(|flat_type| (category.key.clone(), flat_type.clone()))
            })
            .collect()
    }
}

/// Society-level configuration document holding the billing config versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocietyConfigDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub society_id: String,
    #[serde(default)]
    pub billing_configs: Vec<BillingConfig>,
}
