//! Append-only change log attached to bills and billing configs.

use super::actor::Actor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub changed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by_role: Option<String>,
    pub changed_at: DateTime<Utc>,
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AuditEntry {
    pub fn created(actor: &Actor, at: DateTime<Utc>, notes: Option<String>) -> Self {
        Self::new(actor, at, ChangeType::Created, notes)
    }

    pub fn updated(
        actor: &Actor,
        at: DateTime<Utc>,
        before: serde_json::Value,
        after: serde_json::Value,
        field: Option<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
            field,
            ..Self::new(actor, at, ChangeType::Updated, notes)
        }
    }

    pub fn deleted(
        actor: &Actor,
        at: DateTime<Utc>,
        before: serde_json::Value,
        notes: Option<String>,
    ) -> Self {
        Self {
            before: Some(before),
            ..Self::new(actor, at, ChangeType::Deleted, notes)
        }
    }

    fn new(actor: &Actor, at: DateTime<Utc>, change_type: ChangeType, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            changed_by: actor.id.clone(),
            changed_by_name: actor.name.clone(),
            changed_by_role: Some(actor.role.as_str().to_string()),
            changed_at: at,
            change_type,
            before: None,
            after: None,
            field: None,
            notes,
        }
    }
}

/// Ordered audit entries. Only appends are possible; existing entries are
/// never rewritten, removed or compacted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail(Vec<AuditEntry>);

impl AuditTrail {
    /// Append an entry. A timestamp earlier than the last entry is raised to
    /// it so the trail stays ordered by `changed_at`.
    pub fn append(&mut self, mut entry: AuditEntry) {
        if let Some(last) = self.0.last() {
            if entry.changed_at < last.changed_at {
                entry.changed_at = last.changed_at;
            }
        }
        self.0.push(entry);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tombstone written to the deletion log before a bill is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub bill_id: String,
    pub society_id: String,
    pub entry: AuditEntry,
}

impl DeletionRecord {
    pub fn new(bill_id: &str, society_id: &str, entry: AuditEntry) -> Self {
        Self {
            id: entry.id.clone(),
            bill_id: bill_id.to_string(),
            society_id: society_id.to_string(),
            entry,
        }
    }
}
