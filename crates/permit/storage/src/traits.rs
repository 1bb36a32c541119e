use crate::model::{PermitFilter, PermitUpdate, QueryWindow, StoredPermit};
use crate::StorageResult;
use async_trait::async_trait;
use permit_types::{PermitEntity, PermitId};

/// Storage interface for permit snapshots.
///
/// Writes are guarded by optimistic versioning: a save names the version
/// it was computed from and fails with `Conflict` if another writer got
/// there first. Nothing is ever overwritten silently.
#[async_trait]
pub trait PermitRepository: Send + Sync {
    /// Store a new permit at version 1.
    async fn insert(&self, entity: &PermitEntity) -> StorageResult<StoredPermit>;

    /// Load a permit, failing with `NotFound` if it does not exist.
    async fn load(&self, id: &PermitId) -> StorageResult<StoredPermit>;

    /// Replace a snapshot if it is still at `expected_version`.
    async fn save(&self, entity: &PermitEntity, expected_version: u64)
        -> StorageResult<StoredPermit>;

    /// Save several snapshots all-or-nothing.
    async fn save_batch(&self, updates: &[PermitUpdate]) -> StorageResult<Vec<StoredPermit>>;

    /// List permits newest-first.
    async fn list(&self, filter: &PermitFilter, window: QueryWindow)
        -> StorageResult<Vec<StoredPermit>>;

    /// Permits to Work raised against a Job Permit.
    async fn children(&self, parent_id: &PermitId) -> StorageResult<Vec<StoredPermit>>;
}
