pub mod actor;
pub mod audit;
pub mod bill;
pub mod billing_config;
pub mod flat;
pub mod period;

pub use actor::{Actor, ActorRole, SYSTEM_ACTOR};
pub use audit::{AuditEntry, AuditTrail, ChangeType, DeletionRecord};
pub use bill::{
    non_zero, AdHocCharge, ApprovalEntry, ApprovalStatus, BillStatus, BillUpdate,
    ListBillsFilter, MaintenanceBill,
};
pub use billing_config::{
    BillingConfig, Category, ChargeType, Compounding, DiscountRule, InterestRules,
    LatePaymentPenalty, PenaltyRules, RateType, SocietyConfigDocument,
};
pub use flat::FlatBillingInput;
pub use period::{BillingFrequency, Period, PeriodError, PeriodSpec};
