//! Bill operations: orchestrates the engine, the stores and the notifier.

use super::metrics;
use super::notifier::{Notification, NotificationKind, Notifier};
use super::repository::{BillRepository, ConfigRepository, ReplaceOutcome};
use crate::config::GenerationSettings;
use crate::engine::{
    self, accrue, build_manual_bill, generate_batch, resolve, EngineError, GenerationContext,
};
use crate::models::{
    non_zero, Actor, ActorRole, ApprovalStatus, AuditEntry, AuditTrail, BillStatus, BillUpdate,
    BillingConfig, DeletionRecord, FlatBillingInput, ListBillsFilter, MaintenanceBill, Period,
    PeriodSpec, SYSTEM_ACTOR,
};
use chrono::{DateTime, NaiveDate, Utc};
use futures::{stream, StreamExt};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Inputs of a generation request.
#[derive(Debug, Clone)]
pub struct GenerateBills {
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub flats: Vec<FlatBillingInput>,
    pub periods: PeriodSpec,
}

#[derive(Debug)]
pub struct GenerationReport {
    pub bills: Vec<MaintenanceBill>,
    /// Periods skipped under the keep-validated policy, with the reason.
    pub failed_periods: Vec<(Period, String)>,
}

#[derive(Debug, Clone)]
pub struct SingleBill {
    pub flat_number: String,
    pub user_id: String,
    pub period: Period,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecalculationReport {
    pub examined: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub struct BillingService {
    bills: Arc<dyn BillRepository>,
    configs: Arc<dyn ConfigRepository>,
    notifier: Arc<dyn Notifier>,
    settings: GenerationSettings,
    notification_timeout: Duration,
}

impl BillingService {
    pub fn new(
        bills: Arc<dyn BillRepository>,
        configs: Arc<dyn ConfigRepository>,
        notifier: Arc<dyn Notifier>,
        settings: GenerationSettings,
        notification_timeout: Duration,
    ) -> Self {
        Self {
            bills,
            configs,
            notifier,
            settings,
            notification_timeout,
        }
    }

    /// Bills of a society, newest first. Residents only ever see their own.
    #[tracing::instrument(skip_all, fields(society_id = %society_id, actor_id = %actor.id))]
    pub async fn list_bills(
        &self,
        society_id: &str,
        mut filter: ListBillsFilter,
        actor: &Actor,
    ) -> Result<Vec<MaintenanceBill>, AppError> {
        if actor.role == ActorRole::Resident {
            filter.user_id = Some(actor.id.clone());
        }
        self.bills.list_bills(society_id, &filter).await
    }

    pub async fn get_bill(
        &self,
        society_id: &str,
        bill_id: &str,
        actor: &Actor,
    ) -> Result<MaintenanceBill, AppError> {
        let bill = self.load(society_id, bill_id).await?;
        if actor.role == ActorRole::Resident && bill.user_id != actor.id {
            return Err(bill_not_found(bill_id));
        }
        Ok(bill)
    }

    #[tracing::instrument(skip_all, fields(society_id = %society_id, actor_id = %actor.id))]
    pub async fn generate_bills(
        &self,
        society_id: &str,
        request: GenerateBills,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<GenerationReport, AppError> {
        require_edit(actor)?;
        let periods = request.periods.periods();
        let configs = self.configs.billing_configs(society_id).await?;

        let ctx = GenerationContext {
            society_id,
            due_date: request.due_date,
            notes: request.notes.as_deref(),
            now,
            actor,
        };
        let outcome = generate_batch(
            &configs,
            &request.flats,
            &periods,
            &ctx,
            self.settings.failure_policy,
        )
        .map_err(|e| {
            metrics::record_generation_failure(failure_reason(&e));
            tracing::warn!(error = %e, "Bill generation rejected");
            AppError::from(e)
        })?;

        for failure in &outcome.failures {
            metrics::record_generation_failure(failure_reason(&failure.error));
        }

        self.persist_all(&outcome.bills).await?;
        metrics::record_bills_generated(society_id, outcome.bills.len());
        tracing::info!(
            bills = outcome.bills.len(),
            periods = periods.len(),
            failed_periods = outcome.failures.len(),
            "Generated maintenance bills"
        );

        self.announce_generated(society_id, &outcome.bills).await;

        Ok(GenerationReport {
            bills: outcome.bills,
            failed_periods: outcome
                .failures
                .into_iter()
                .map(|f| (f.period, f.error.to_string()))
                .collect(),
        })
    }

    /// Manual bill outside the rule engine.
    #[tracing::instrument(skip_all, fields(society_id = %society_id, actor_id = %actor.id))]
    pub async fn create_single_bill(
        &self,
        society_id: &str,
        request: SingleBill,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceBill, AppError> {
        require_edit(actor)?;
        let ctx = GenerationContext {
            society_id,
            due_date: request.due_date,
            notes: request.notes.as_deref(),
            now,
            actor,
        };
        let bill = build_manual_bill(
            &request.flat_number,
            &request.user_id,
            request.period,
            request.amount,
            &ctx,
        )?;
        self.bills.insert_bill(&bill).await?;
        metrics::record_bills_generated(society_id, 1);
        tracing::info!(bill_id = %bill.id, flat_number = %bill.flat_number, "Created manual bill");

        self.announce_generated(society_id, std::slice::from_ref(&bill)).await;
        Ok(bill)
    }

    #[tracing::instrument(skip_all, fields(society_id = %society_id, bill_id = %bill_id, actor_id = %actor.id))]
    pub async fn update_bill(
        &self,
        society_id: &str,
        bill_id: &str,
        update: BillUpdate,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceBill, AppError> {
        let mut bill = self.load(society_id, bill_id).await?;
        let expected_version = update.expected_version;
        let previous_status = bill.approval_status;

        if !engine::apply_update(&mut bill, update, actor, now)? {
            return Ok(bill);
        }
        self.store_versioned(&bill, expected_version).await?;

        if bill.approval_status != previous_status {
            metrics::record_transition(bill.approval_status.as_str());
            self.announce_published(&bill).await;
        }
        tracing::info!(version = bill.version, "Updated bill");
        Ok(bill)
    }

    #[tracing::instrument(skip_all, fields(society_id = %society_id, bill_id = %bill_id, actor_id = %actor.id))]
    #[allow(clippy::too_many_arguments)]
    pub async fn transition_bill(
        &self,
        society_id: &str,
        bill_id: &str,
        to: ApprovalStatus,
        notes: Option<String>,
        expected_version: u64,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceBill, AppError> {
        let mut bill = self.load(society_id, bill_id).await?;
        if bill.version != expected_version {
            return Err(EngineError::Conflict {
                bill_id: bill_id.to_string(),
                expected: expected_version,
            }
            .into());
        }

        let from = bill.approval_status;
        engine::transition(&mut bill, to, actor, notes, now)?;
        self.store_versioned(&bill, expected_version).await?;

        metrics::record_transition(to.as_str());
        tracing::info!(from = %from, to = %to, version = bill.version, "Bill transitioned");
        self.announce_published(&bill).await;
        Ok(bill)
    }

    /// Remove a bill. A tombstone with the final snapshot is written first.
    #[tracing::instrument(skip_all, fields(society_id = %society_id, bill_id = %bill_id, actor_id = %actor.id))]
    pub async fn delete_bill(
        &self,
        society_id: &str,
        bill_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        require_admin(actor, "delete bills")?;
        let bill = self.load(society_id, bill_id).await?;

        let entry = AuditEntry::deleted(actor, now, bill.snapshot().map_err(EngineError::from)?, None);
        self.bills
            .record_deletion(&DeletionRecord::new(&bill.id, society_id, entry))
            .await?;

        if !self.bills.delete_bill(society_id, bill_id).await? {
            return Err(bill_not_found(bill_id));
        }
        tracing::info!("Deleted bill");
        Ok(())
    }

    pub async fn list_billing_configs(&self, society_id: &str) -> Result<Vec<BillingConfig>, AppError> {
        self.configs.billing_configs(society_id).await
    }

    /// Append a new config version. Every category must price every
    /// declared flat type.
    #[tracing::instrument(skip_all, fields(society_id = %society_id, actor_id = %actor.id))]
    pub async fn add_billing_config(
        &self,
        society_id: &str,
        mut config: BillingConfig,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<BillingConfig, AppError> {
        require_admin(actor, "change billing configs")?;
        if config.flat_types.is_empty() {
            return Err(EngineError::validation("flat_types must not be empty").into());
        }
        if config.categories.is_empty() {
            return Err(EngineError::validation("at least one category is required").into());
        }
        if let Some((category, flat_type)) = config.missing_rates().into_iter().next() {
            return Err(EngineError::MissingRate {
                category,
                flat_type,
                flat_number: "*".to_string(),
            }
            .into());
        }
        let mut keys = BTreeSet::new();
        if let Some(duplicate) = config.categories.iter().find(|c| !keys.insert(c.key.as_str())) {
            return Err(EngineError::validation(format!("duplicate category key '{}'", duplicate.key)).into());
        }

        config.audit_trail = AuditTrail::default();
        config.audit_trail.append(AuditEntry::created(actor, now, None));
        self.configs.append_billing_config(society_id, &config).await?;
        tracing::info!(effective_from = %config.effective_from, "Added billing config");
        Ok(config)
    }

    /// Refresh overdue interest on approved and published bills that are not
    /// paid. Changes are attributed to the system actor.
    #[tracing::instrument(skip_all, fields(society_id = %society_id))]
    pub async fn recalculate_interest(
        &self,
        society_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RecalculationReport, AppError> {
        let configs = self.configs.billing_configs(society_id).await?;
        let bills = self
            .bills
            .list_bills(society_id, &ListBillsFilter::default())
            .await?;
        let today = now.date_naive();
        let mut report = RecalculationReport::default();

        for mut bill in bills.into_iter().filter(accrues_interest) {
            report.examined += 1;
            let config = match resolve(&configs, bill.period) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(bill_id = %bill.id, error = %e, "Skipping interest refresh");
                    report.skipped += 1;
                    continue;
                }
            };

            let accrual = match accrue(&config.interest_rules, bill.due_date, today, bill.interest_principal()) {
                Ok(accrual) => accrual,
                Err(e) => {
                    tracing::warn!(bill_id = %bill.id, error = %e, "Skipping interest refresh");
                    report.skipped += 1;
                    continue;
                }
            };
            let interest_amount = accrual.as_ref().and_then(|a| non_zero(a.amount));
            let interest_reason = accrual.map(|a| a.reason);
            let status = if today > bill.due_date {
                BillStatus::Overdue
            } else {
                bill.status
            };
            if interest_amount == bill.interest_amount
                && interest_reason == bill.interest_reason
                && status == bill.status
            {
                continue;
            }

            let expected_version = bill.version;
            let before = bill.snapshot().map_err(EngineError::from)?;
            bill.interest_amount = interest_amount;
            bill.interest_reason = interest_reason;
            bill.status = status;
            bill.recompute_amount();
            bill.touch(now);
            let after = bill.snapshot().map_err(EngineError::from)?;
            bill.audit_trail.append(AuditEntry::updated(
                &SYSTEM_ACTOR,
                now,
                before,
                after,
                Some("interest_amount".to_string()),
                Some("Scheduled interest recalculation".to_string()),
            ));

            match self.bills.replace_bill(&bill, expected_version).await? {
                ReplaceOutcome::Replaced => report.updated += 1,
                outcome => {
                    tracing::warn!(bill_id = %bill.id, ?outcome, "Bill changed during interest refresh");
                    report.skipped += 1;
                }
            }
        }

        metrics::record_interest_updates(society_id, report.updated);
        tracing::info!(
            examined = report.examined,
            updated = report.updated,
            skipped = report.skipped,
            "Interest recalculated"
        );
        Ok(report)
    }

    async fn load(&self, society_id: &str, bill_id: &str) -> Result<MaintenanceBill, AppError> {
        self.bills
            .get_bill(society_id, bill_id)
            .await?
            .ok_or_else(|| bill_not_found(bill_id))
    }

    async fn store_versioned(&self, bill: &MaintenanceBill, expected_version: u64) -> Result<(), AppError> {
        match self.bills.replace_bill(bill, expected_version).await? {
            ReplaceOutcome::Replaced => Ok(()),
            ReplaceOutcome::VersionMismatch => Err(EngineError::Conflict {
                bill_id: bill.id.clone(),
                expected: expected_version,
            }
            .into()),
            ReplaceOutcome::Missing => Err(bill_not_found(&bill.id)),
        }
    }

    /// Insert bills concurrently. Bills already written stay written when a
    /// sibling insert fails.
    async fn persist_all(&self, bills: &[MaintenanceBill]) -> Result<(), AppError> {
        let inserts: Vec<_> = bills.iter().map(|bill| self.bills.insert_bill(bill)).collect();
        let results: Vec<Result<(), AppError>> = stream::iter(inserts)
            .buffer_unordered(self.settings.persist_concurrency)
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        match results.into_iter().find_map(Result::err) {
            Some(err) => {
                tracing::error!(
                    persisted = bills.len() - failed,
                    failed,
                    error = %err,
                    "Bill batch partially persisted"
                );
                metrics::record_generation_failure("persistence");
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// One notification per affected resident plus a summary for admins.
    async fn announce_generated(&self, society_id: &str, bills: &[MaintenanceBill]) {
        if bills.is_empty() {
            return;
        }
        let residents: BTreeSet<&str> = bills.iter().map(|b| b.user_id.as_str()).collect();
        let resident_notice = Notification {
            kind: NotificationKind::BillGenerated,
            title: "New maintenance bill".to_string(),
            message: "A new maintenance bill has been generated for your flat.".to_string(),
            link: Some(format!("/societies/{}/bills", society_id)),
        };
        let summary = Notification {
            kind: NotificationKind::BillsGeneratedSummary,
            title: "Maintenance bills generated".to_string(),
            message: format!(
                "{} bill(s) generated for {} resident(s).",
                bills.len(),
                residents.len()
            ),
            link: Some(format!("/societies/{}/bills", society_id)),
        };

        let sends = async {
            let sends: Vec<_> = residents
                .iter()
                .map(|user_id| self.notifier.notify(user_id, &resident_notice))
                .collect();
            let resident_results = stream::iter(sends)
                .buffer_unordered(self.settings.persist_concurrency)
                .collect::<Vec<_>>()
                .await;
            for err in resident_results.into_iter().filter_map(Result::err) {
                tracing::warn!(error = %err, "Resident notification failed");
                metrics::record_notification_failure("bill_generated");
            }
            if let Err(err) = self.notifier.notify_admins(society_id, &summary).await {
                tracing::warn!(error = %err, "Admin notification failed");
                metrics::record_notification_failure("bills_generated_summary");
            }
        };

        if tokio::time::timeout(self.notification_timeout, sends).await.is_err() {
            tracing::warn!(society_id = %society_id, "Notifications timed out");
            metrics::record_notification_failure("timeout");
        }
    }

    async fn announce_published(&self, bill: &MaintenanceBill) {
        if bill.approval_status != ApprovalStatus::Published {
            return;
        }
        let notice = Notification {
            kind: NotificationKind::BillPublished,
            title: "Maintenance bill published".to_string(),
            message: format!(
                "Your maintenance bill for {} of {} is due on {}.",
                bill.period, bill.amount, bill.due_date
            ),
            link: Some(format!("/societies/{}/bills/{}", bill.society_id, bill.id)),
        };
        match tokio::time::timeout(self.notification_timeout, self.notifier.notify(&bill.user_id, &notice)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(bill_id = %bill.id, error = %err, "Publish notification failed");
                metrics::record_notification_failure("bill_published");
            }
            Err(_) => {
                tracing::warn!(bill_id = %bill.id, "Publish notification timed out");
                metrics::record_notification_failure("timeout");
            }
        }
    }
}

fn accrues_interest(bill: &MaintenanceBill) -> bool {
    bill.status != BillStatus::Paid
        && matches!(
            bill.approval_status,
            ApprovalStatus::Approved | ApprovalStatus::Published
        )
}

fn require_edit(actor: &Actor) -> Result<(), AppError> {
    if actor.role.can_edit() {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "role '{}' may not create bills",
            actor.role.as_str()
        )))
    }
}

fn require_admin(actor: &Actor, action: &str) -> Result<(), AppError> {
    if matches!(actor.role, ActorRole::Admin | ActorRole::System) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "role '{}' may not {}",
            actor.role.as_str(),
            action
        )))
    }
}

fn bill_not_found(bill_id: &str) -> AppError {
    AppError::not_found(format!("Bill {} not found", bill_id))
}

fn failure_reason(err: &EngineError) -> &'static str {
    match err {
        EngineError::Validation(_) => "validation",
        EngineError::ConfigNotFound { .. } => "config_not_found",
        EngineError::MissingRate { .. } => "missing_rate",
        _ => "other",
    }
}
