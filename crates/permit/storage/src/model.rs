use chrono::{DateTime, Utc};
use permit_types::{DepartmentCode, PermitEntity, PermitKind, PermitStatus};
use serde::{Deserialize, Serialize};

/// A persisted snapshot and the version it was stored under.
///
/// Versions start at 1 and grow by one on every successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPermit {
    pub entity: PermitEntity,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// One element of an atomic batch save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitUpdate {
    pub entity: PermitEntity,
    pub expected_version: u64,
}

impl PermitUpdate {
    pub fn new(entity: PermitEntity, expected_version: u64) -> Self {
        Self {
            entity,
            expected_version,
        }
    }
}

/// Optional predicates for listing permits. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermitFilter {
    pub kind: Option<PermitKind>,
    pub status: Option<PermitStatus>,
    pub department: Option<DepartmentCode>,
}

impl PermitFilter {
    pub fn matches(&self, entity: &PermitEntity) -> bool {
        self.kind.map_or(true, |k| k == entity.kind)
            && self.status.map_or(true, |s| s == entity.status)
            && self
                .department
                .as_ref()
                .map_or(true, |d| d == &entity.department)
    }
}

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}
