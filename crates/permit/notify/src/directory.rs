//! Organization directory: department and role membership lookups
//!
//! The router only reads from the directory. Lookups are synchronous; an
//! implementation backed by a remote service is expected to answer from a
//! local cache.

use permit_types::{DepartmentCode, Identity, Role, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type for directory lookups
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("directory entry not found: {0}")]
    NotFound(String),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of people, roles and departments
pub trait OrgDirectory: Send + Sync {
    /// Holders of `role` who belong to `department`
    fn role_holders_in_department(
        &self,
        role: Role,
        department: &DepartmentCode,
    ) -> DirectoryResult<Vec<Identity>>;

    /// Holders of `role` in any department
    fn role_holders(&self, role: Role) -> DirectoryResult<Vec<Identity>>;

    fn identity_by_id(&self, id: &UserId) -> DirectoryResult<Identity>;

    fn identity_by_display_name(&self, name: &str) -> DirectoryResult<Identity>;

    fn department_display_name(&self, code: &DepartmentCode) -> DirectoryResult<String>;
}

// ── In-memory Directory ──────────────────────────────────────────────

/// A department entry in a directory seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentEntry {
    pub code: DepartmentCode,
    pub name: String,
}

/// Serializable directory content, as loaded from a seed file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub departments: Vec<DepartmentEntry>,
    #[serde(default)]
    pub people: Vec<Identity>,
}

/// Directory held entirely in memory. Deterministic: lookups return people
/// in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    people: Vec<Identity>,
    departments: HashMap<DepartmentCode, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let mut directory = Self::new();
        for department in seed.departments {
            directory.departments.insert(department.code, department.name);
        }
        directory.people = seed.people;
        directory
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let seed: DirectorySeed = serde_json::from_str(json)?;
        Ok(Self::from_seed(seed))
    }

    pub fn with_department(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.departments
            .insert(DepartmentCode::new(code), name.into());
        self
    }

    pub fn with_person(mut self, identity: Identity) -> Self {
        self.people.push(identity);
        self
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

impl OrgDirectory for InMemoryDirectory {
    fn role_holders_in_department(
        &self,
        role: Role,
        department: &DepartmentCode,
    ) -> DirectoryResult<Vec<Identity>> {
        Ok(self
            .people
            .iter()
            .filter(|p| p.role == role && p.department.as_ref() == Some(department))
            .cloned()
            .collect())
    }

    fn role_holders(&self, role: Role) -> DirectoryResult<Vec<Identity>> {
        Ok(self
            .people
            .iter()
            .filter(|p| p.role == role)
            .cloned()
            .collect())
    }

    fn identity_by_id(&self, id: &UserId) -> DirectoryResult<Identity> {
        self.people
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("user {}", id)))
    }

    fn identity_by_display_name(&self, name: &str) -> DirectoryResult<Identity> {
        let wanted = name.trim();
        self.people
            .iter()
            .find(|p| p.display_name.trim().eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("user named '{}'", wanted)))
    }

    fn department_display_name(&self, code: &DepartmentCode) -> DirectoryResult<String> {
        self.departments
            .get(code)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(format!("department {}", code)))
    }
}
