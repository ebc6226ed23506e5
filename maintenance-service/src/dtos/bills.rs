use crate::engine::EngineError;
use crate::models::{
    AdHocCharge, ApprovalEntry, ApprovalStatus, AuditTrail, BillStatus, BillingFrequency,
    FlatBillingInput, MaintenanceBill, Period, PeriodSpec,
};
use crate::services::{GenerateBills, GenerationReport, RecalculationReport, SingleBill};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecurringPeriods {
    pub frequency: BillingFrequency,
    #[validate(range(min = 1, max = 60, message = "count must be between 1 and 60"))]
    pub count: u32,
    pub start_period: Period,
}

/// Generation request. Exactly one of `period`, `periods` or `recurring`
/// selects the billing periods.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateBillsRequest {
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub flats: Vec<FlatBillingInput>,
    pub period: Option<Period>,
    pub periods: Option<Vec<Period>>,
    #[validate(nested)]
    pub recurring: Option<RecurringPeriods>,
}

impl GenerateBillsRequest {
    pub fn into_command(self) -> Result<GenerateBills, EngineError> {
        let due_date = self
            .due_date
            .ok_or_else(|| EngineError::validation("due_date is required"))?;
        if self.flats.is_empty() {
            return Err(EngineError::validation("at least one flat is required"));
        }
        let periods = match (self.period, self.periods, self.recurring) {
            (Some(period), None, None) => PeriodSpec::Explicit(vec![period]),
            (None, Some(periods), None) if !periods.is_empty() => PeriodSpec::Explicit(periods),
            (None, None, Some(recurring)) => PeriodSpec::Recurring {
                frequency: recurring.frequency,
                count: recurring.count,
                start: recurring.start_period,
            },
            _ => {
                return Err(EngineError::validation(
                    "exactly one of period, periods or recurring is required",
                ))
            }
        };

        Ok(GenerateBills {
            due_date,
            notes: self.notes,
            flats: self.flats,
            periods,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SingleBillRequest {
    #[validate(length(min = 1, message = "flat_number is required"))]
    pub flat_number: String,
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    pub period: Period,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

impl From<SingleBillRequest> for SingleBill {
    fn from(request: SingleBillRequest) -> Self {
        Self {
            flat_number: request.flat_number,
            user_id: request.user_id,
            period: request.period,
            amount: request.amount,
            due_date: request.due_date,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub status: ApprovalStatus,
    pub notes: Option<String>,
    pub expected_version: u64,
}

#[derive(Debug, Serialize)]
pub struct BillResponse {
    pub id: String,
    pub society_id: String,
    pub flat_number: String,
    pub user_id: String,
    pub period: Period,
    pub amount: Decimal,
    pub breakdown: BTreeMap<String, Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiver_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiver_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ad_hoc_charges: Vec<AdHocCharge>,
    pub due_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: BillStatus,
    pub approval_status: ApprovalStatus,
    pub approval_history: Vec<ApprovalEntry>,
    pub audit_trail: AuditTrail,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_effective_from: Option<NaiveDate>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MaintenanceBill> for BillResponse {
    fn from(bill: MaintenanceBill) -> Self {
        Self {
            id: bill.id,
            society_id: bill.society_id,
            flat_number: bill.flat_number,
            user_id: bill.user_id,
            period: bill.period,
            amount: bill.amount,
            breakdown: bill.breakdown,
            discount_amount: bill.discount_amount,
            discount_reason: bill.discount_reason,
            waiver_amount: bill.waiver_amount,
            waiver_reason: bill.waiver_reason,
            penalty_amount: bill.penalty_amount,
            penalty_reason: bill.penalty_reason,
            interest_amount: bill.interest_amount,
            interest_reason: bill.interest_reason,
            ad_hoc_charges: bill.ad_hoc_charges,
            due_date: bill.due_date,
            notes: bill.notes,
            status: bill.status,
            approval_status: bill.approval_status,
            approval_history: bill.approval_history,
            audit_trail: bill.audit_trail,
            version: bill.version,
            config_effective_from: bill.config_effective_from,
            created_at: bill.created_at.to_rfc3339(),
            updated_at: bill.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BillListResponse {
    pub bills: Vec<BillResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct FailedPeriod {
    pub period: Period,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateBillsResponse {
    pub count: usize,
    pub bills: Vec<BillResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_periods: Vec<FailedPeriod>,
}

impl From<GenerationReport> for GenerateBillsResponse {
    fn from(report: GenerationReport) -> Self {
        Self {
            count: report.bills.len(),
            bills: report.bills.into_iter().map(BillResponse::from).collect(),
            failed_periods: report
                .failed_periods
                .into_iter()
                .map(|(period, error)| FailedPeriod { period, error })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecalculateInterestResponse {
    pub examined: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl From<RecalculationReport> for RecalculateInterestResponse {
    fn from(report: RecalculationReport) -> Self {
        Self {
            examined: report.examined,
            updated: report.updated,
            skipped: report.skipped,
        }
    }
}
