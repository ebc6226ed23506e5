//! Field edits on stored bills.

use super::error::EngineError;
use super::workflow;
use crate::models::{non_zero, Actor, AuditEntry, BillUpdate, MaintenanceBill};
use chrono::{DateTime, Utc};

/// Merge `update` into `bill`. Returns `false` when nothing changed, in which
/// case the bill is left untouched. Otherwise the amount is recomputed, the
/// version bumped and a single audit entry naming the changed fields is
/// appended. An approval status change must follow the workflow.
pub fn apply_update(
    bill: &mut MaintenanceBill,
    update: BillUpdate,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<bool, EngineError> {
    if !actor.role.can_edit() {
        return Err(EngineError::Forbidden(format!(
            "role '{}' may not edit bills",
            actor.role.as_str()
        )));
    }
    if update.expected_version != bill.version {
        return Err(EngineError::Conflict {
            bill_id: bill.id.clone(),
            expected: update.expected_version,
        });
    }

    let before = bill.snapshot()?;
    let mut changed = Vec::new();

    if let Some(to) = update.approval_status.filter(|to| *to != bill.approval_status) {
        workflow::advance(bill, to, actor, update.approval_notes.clone(), now)?;
        changed.push("approval_status");
    }

    set(&mut bill.status, update.status, "status", &mut changed);
    set(&mut bill.due_date, update.due_date, "due_date", &mut changed);
    set(&mut bill.notes, update.notes.map(Some), "notes", &mut changed);
    set(&mut bill.discount_amount, update.discount_amount.map(non_zero), "discount_amount", &mut changed);
    set(&mut bill.discount_reason, update.discount_reason.map(Some), "discount_reason", &mut changed);
    set(&mut bill.waiver_amount, update.waiver_amount.map(non_zero), "waiver_amount", &mut changed);
    set(&mut bill.waiver_reason, update.waiver_reason.map(Some), "waiver_reason", &mut changed);
    set(&mut bill.penalty_amount, update.penalty_amount.map(non_zero), "penalty_amount", &mut changed);
    set(&mut bill.penalty_reason, update.penalty_reason.map(Some), "penalty_reason", &mut changed);
    set(&mut bill.interest_amount, update.interest_amount.map(non_zero), "interest_amount", &mut changed);
    set(&mut bill.interest_reason, update.interest_reason.map(Some), "interest_reason", &mut changed);
    set(&mut bill.ad_hoc_charges, update.ad_hoc_charges, "ad_hoc_charges", &mut changed);

    if changed.is_empty() {
        return Ok(false);
    }

    if bill.discount_amount.is_none() {
        bill.discount_reason = None;
    }
    if bill.waiver_amount.is_none() {
        bill.waiver_reason = None;
    }
    if bill.penalty_amount.is_none() {
        bill.penalty_reason = None;
    }
    if bill.interest_amount.is_none() {
        bill.interest_reason = None;
    }
    bill.recompute_amount();
    bill.touch(now);

    let after = bill.snapshot()?;
    bill.audit_trail.append(AuditEntry::updated(
        actor,
        now,
        before,
        after,
        Some(changed.join(",")),
        update.approval_notes,
    ));
    Ok(true)
}

fn set<T: PartialEq>(slot: &mut T, value: Option<T>, field: &'static str, changed: &mut Vec<&'static str>) {
    if let Some(value) = value {
        if *slot != value {
            *slot = value;
            changed.push(field);
        }
    }
}
