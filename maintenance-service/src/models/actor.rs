//! Acting user carried by every mutating operation.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Role of the acting user within a society.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Resident,
    Staff,
    Admin,
    Approver,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Resident => "resident",
            ActorRole::Staff => "staff",
            ActorRole::Admin => "admin",
            ActorRole::Approver => "approver",
            ActorRole::System => "system",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "resident" => Some(ActorRole::Resident),
            "staff" => Some(ActorRole::Staff),
            "admin" => Some(ActorRole::Admin),
            "approver" => Some(ActorRole::Approver),
            "system" => Some(ActorRole::System),
            _ => None,
        }
    }

    /// May create, adjust and advance bills through non-approval steps.
    pub fn can_edit(&self) -> bool {
        !matches!(self, ActorRole::Resident)
    }

    /// May decide on bills awaiting approval.
    pub fn can_approve(&self) -> bool {
        matches!(self, ActorRole::Approver)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: Option<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            name,
            role,
        }
    }
}

/// Identity used by unattended jobs such as interest recalculation.
pub static SYSTEM_ACTOR: Lazy<Actor> = Lazy::new(|| Actor {
    id: "system".to_string(),
    name: Some("System".to_string()),
    role: ActorRole::System,
});
