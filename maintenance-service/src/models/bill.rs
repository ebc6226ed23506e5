//! Maintenance bill document.

use super::audit::AuditTrail;
use super::period::Period;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Payment status of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    #[default]
    Unpaid,
    Paid,
    Overdue,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Unpaid => "unpaid",
            BillStatus::Paid => "paid",
            BillStatus::Overdue => "overdue",
        }
    }
}

/// Position of a bill in the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Published,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Draft => "draft",
            ApprovalStatus::PendingApproval => "pending_approval",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-off charge attached to a single bill outside the category structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AdHocCharge {
    #[validate(length(min = 1, message = "ad-hoc charge label is required"))]
    pub label: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_one_time: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub status: ApprovalStatus,
    pub changed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by_name: Option<String>,
    pub changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceBill {
    #[serde(rename = "_id")]
    pub id: String,
    pub society_id: String,
    pub flat_number: String,
    pub user_id: String,
    pub period: Period,
    pub amount: Decimal,
    pub breakdown: BTreeMap<String, Decimal>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ad_hoc_charges: Vec<AdHocCharge>,
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: BillStatus,
    pub approval_status: ApprovalStatus,
    pub approval_history: Vec<ApprovalEntry>,
    #[serde(default)]
    pub audit_trail: AuditTrail,
    /// Optimistic concurrency token, bumped on every mutation.
    pub version: u64,
    /// Effective date of the billing config used, absent for manual bills.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_effective_from: Option<NaiveDate>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceBill {
    pub fn base_total(&self) -> Decimal {
        self.breakdown.values().copied().sum()
    }

    pub fn ad_hoc_total(&self) -> Decimal {
        self.ad_hoc_charges.iter().map(|c| c.amount).sum()
    }

    /// Interest base: base total less discount and waiver, never negative.
    pub fn interest_principal(&self) -> Decimal {
        (self.base_total() - self.discount_amount.unwrap_or_default()
            - self.waiver_amount.unwrap_or_default())
        .max(Decimal::ZERO)
    }

    /// Net payable from the stored components.
    pub fn computed_amount(&self) -> Decimal {
        self.base_total() - self.discount_amount.unwrap_or_default()
            - self.waiver_amount.unwrap_or_default()
            + self.penalty_amount.unwrap_or_default()
            + self.ad_hoc_total()
            + self.interest_amount.unwrap_or_default()
    }

    pub fn recompute_amount(&mut self) {
        self.amount = self.computed_amount();
    }

    /// Full-entity snapshot for audit entries. The audit trail itself is
    /// left out so snapshots do not nest.
    pub fn snapshot(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("audit_trail");
        }
        Ok(value)
    }

    /// Mark a mutation: bump the version and the update timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// `Some(amount)` unless the amount is zero; zero-valued adjustments are
/// left out of stored bills.
pub fn non_zero(amount: Decimal) -> Option<Decimal> {
    if amount.is_zero() {
        None
    } else {
        Some(amount)
    }
}

/// Filter parameters for listing bills.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBillsFilter {
    pub user_id: Option<String>,
    pub flat_number: Option<String>,
    pub period: Option<Period>,
}

impl ListBillsFilter {
    pub fn matches(&self, bill: &MaintenanceBill) -> bool {
        self.user_id.as_ref().map_or(true, |u| &bill.user_id == u)
            && self
                .flat_number
                .as_ref()
                .map_or(true, |f| &bill.flat_number == f)
            && self.period.map_or(true, |p| bill.period == p)
    }
}

/// Field edits merged onto a stored bill. `expected_version` must match the
/// stored version.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BillUpdate {
    pub expected_version: u64,
    pub status: Option<BillStatus>,
    pub approval_status: Option<ApprovalStatus>,
    pub approval_notes: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub discount_amount: Option<Decimal>,
    pub discount_reason: Option<String>,
    pub waiver_amount: Option<Decimal>,
    pub waiver_reason: Option<String>,
    pub penalty_amount: Option<Decimal>,
    pub penalty_reason: Option<String>,
    pub interest_amount: Option<Decimal>,
    pub interest_reason: Option<String>,
    #[validate(nested)]
    pub ad_hoc_charges: Option<Vec<AdHocCharge>>,
}
