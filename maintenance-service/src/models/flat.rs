//! Per-flat input to bill generation.

use super::bill::AdHocCharge;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A flat to bill, with optional per-flat adjustments layered on top of the
/// configured rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FlatBillingInput {
    #[validate(length(min = 1, message = "flat_number is required"))]
    pub flat_number: String,
    #[validate(length(min = 1, message = "flat_type is required"))]
    pub flat_type: String,
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiver_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiver_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_reason: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub ad_hoc_charges: Vec<AdHocCharge>,
}

impl FlatBillingInput {
    pub fn new(
        flat_number: impl Into<String>,
        flat_type: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            flat_number: flat_number.into(),
            flat_type: flat_type.into(),
            user_id: user_id.into(),
            discount_amount: None,
            discount_reason: None,
            waiver_amount: None,
            waiver_reason: None,
            penalty_amount: None,
            penalty_reason: None,
            ad_hoc_charges: Vec::new(),
        }
    }
}
