//! Approval state machine for bills.

use super::error::EngineError;
use crate::models::{Actor, ApprovalEntry, ApprovalStatus, AuditEntry, MaintenanceBill};
use chrono::{DateTime, Utc};

/// Capability an actor needs to take a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Edit,
    Approve,
}

impl Permission {
    fn granted_to(&self, actor: &Actor) -> bool {
        match self {
            Permission::Edit => actor.role.can_edit(),
            Permission::Approve => actor.role.can_approve(),
        }
    }
}

const TRANSITIONS: &[(ApprovalStatus, ApprovalStatus, Permission)] = &[
    (ApprovalStatus::Draft, ApprovalStatus::PendingApproval, Permission::Edit),
    (ApprovalStatus::PendingApproval, ApprovalStatus::Approved, Permission::Approve),
    (ApprovalStatus::PendingApproval, ApprovalStatus::Rejected, Permission::Approve),
    (ApprovalStatus::Approved, ApprovalStatus::Published, Permission::Edit),
];

pub fn required_permission(from: ApprovalStatus, to: ApprovalStatus) -> Option<Permission> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, permission)| *permission)
}

/// Check that `from -> to` is a legal transition and that `actor` may take it.
pub fn authorize(from: ApprovalStatus, to: ApprovalStatus, actor: &Actor) -> Result<(), EngineError> {
    let permission = required_permission(from, to).ok_or(EngineError::InvalidTransition { from, to })?;
    if !permission.granted_to(actor) {
        return Err(EngineError::Forbidden(format!(
            "role '{}' may not move a bill from {} to {}",
            actor.role.as_str(),
            from,
            to
        )));
    }
    Ok(())
}

/// Record the status change on the bill without touching version or audit.
pub(crate) fn advance(
    bill: &mut MaintenanceBill,
    to: ApprovalStatus,
    actor: &Actor,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    authorize(bill.approval_status, to, actor)?;
    bill.approval_status = to;
    bill.approval_history.push(ApprovalEntry {
        status: to,
        changed_by: actor.id.clone(),
        changed_by_name: actor.name.clone(),
        changed_at: now,
        notes,
    });
    Ok(())
}

/// Move `bill` to `to`: one approval entry, one audit entry and a version bump.
pub fn transition(
    bill: &mut MaintenanceBill,
    to: ApprovalStatus,
    actor: &Actor,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let before = bill.snapshot()?;
    advance(bill, to, actor, notes.clone(), now)?;
    bill.touch(now);
    let after = bill.snapshot()?;
    bill.audit_trail.append(AuditEntry::updated(
        actor,
        now,
        before,
        after,
        Some("approval_status".to_string()),
        notes,
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::factory::tests::sample_bill;
    use crate::models::{ActorRole, ChangeType};

    fn actor(role: ActorRole) -> Actor {
        Actor::new(format!("{}-1", role.as_str()), None, role)
    }

    #[test]
    fn draft_cannot_jump_to_published() {
        let mut bill = sample_bill();
        let err = transition(&mut bill, ApprovalStatus::Published, &actor(ActorRole::Admin), None, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: ApprovalStatus::Draft,
                to: ApprovalStatus::Published
            }
        ));
        assert_eq!(bill.approval_history.len(), 1);
        assert_eq!(bill.version, 1);
    }

    #[test]
    fn full_path_records_every_step() {
        let mut bill = sample_bill();
        let now = Utc::now();
        transition(&mut bill, ApprovalStatus::PendingApproval, &actor(ActorRole::Staff), None, now).unwrap();
        transition(
            &mut bill,
            ApprovalStatus::Approved,
            &actor(ActorRole::Approver),
            Some("ok".to_string()),
            now,
        )
        .unwrap();
        transition(&mut bill, ApprovalStatus::Published, &actor(ActorRole::Admin), None, now).unwrap();

        let statuses: Vec<_> = bill.approval_history.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                ApprovalStatus::Draft,
                ApprovalStatus::PendingApproval,
                ApprovalStatus::Approved,
                ApprovalStatus::Published
            ]
        );
        assert_eq!(bill.version, 4);
        assert_eq!(bill.audit_trail.len(), 4);
        assert_eq!(bill.audit_trail.entries()[0].change_type, ChangeType::Created);
        let last = bill.audit_trail.last().unwrap();
        assert_eq!(last.change_type, ChangeType::Updated);
        assert_eq!(last.before.as_ref().unwrap()["approval_status"], "approved");
        assert_eq!(last.after.as_ref().unwrap()["approval_status"], "published");
        assert!(last.after.as_ref().unwrap().get("audit_trail").is_none());
    }

    #[test]
    fn only_approvers_decide() {
        let mut bill = sample_bill();
        transition(&mut bill, ApprovalStatus::PendingApproval, &actor(ActorRole::Staff), None, Utc::now()).unwrap();

        let err = transition(&mut bill, ApprovalStatus::Approved, &actor(ActorRole::Admin), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));

        transition(&mut bill, ApprovalStatus::Rejected, &actor(ActorRole::Approver), None, Utc::now()).unwrap();
        assert_eq!(bill.approval_status, ApprovalStatus::Rejected);
    }

    #[test]
    fn residents_cannot_submit() {
        let mut bill = sample_bill();
        let err = transition(
            &mut bill,
            ApprovalStatus::PendingApproval,
            &actor(ActorRole::Resident),
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[test]
    fn rejected_and_published_are_terminal() {
        for from in [ApprovalStatus::Rejected, ApprovalStatus::Published] {
            for to in [
                ApprovalStatus::Draft,
                ApprovalStatus::PendingApproval,
                ApprovalStatus::Approved,
                ApprovalStatus::Rejected,
                ApprovalStatus::Published,
            ] {
                assert!(required_permission(from, to).is_none());
            }
        }
    }
}
