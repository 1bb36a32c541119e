//! People: directory identities and the acting party of a transition

use crate::{DepartmentCode, Role, UserId};
use serde::{Deserialize, Serialize};

/// A person known to the organization directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentCode>,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: UserId::new(id),
            display_name: display_name.into(),
            email: email.into(),
            role,
            department: None,
        }
    }

    pub fn in_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(DepartmentCode::new(department));
        self
    }

    /// Key used to deduplicate recipients: the email address, trimmed and
    /// lowercased.
    pub fn identity_key(&self) -> String {
        self.email.trim().to_ascii_lowercase()
    }
}

/// The party performing a workflow action
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(id),
            display_name: display_name.into(),
            role,
        }
    }
}

impl From<&Identity> for Actor {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            role: identity.role,
        }
    }
}
