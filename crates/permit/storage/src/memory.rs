//! In-memory reference implementation of the permit repository.
//!
//! Deterministic and test-friendly. A single lock guards every write, so
//! batch saves are atomic.

use crate::model::{PermitFilter, PermitUpdate, QueryWindow, StoredPermit};
use crate::traits::PermitRepository;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use permit_types::{PermitEntity, PermitId};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory permit repository.
#[derive(Default)]
pub struct InMemoryPermitRepository {
    permits: RwLock<HashMap<PermitId, StoredPermit>>,
}

impl InMemoryPermitRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> StorageResult<std::sync::RwLockReadGuard<'_, HashMap<PermitId, StoredPermit>>> {
        self.permits
            .read()
            .map_err(|_| StorageError::Backend("permits lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> StorageResult<std::sync::RwLockWriteGuard<'_, HashMap<PermitId, StoredPermit>>> {
        self.permits
            .write()
            .map_err(|_| StorageError::Backend("permits lock poisoned".to_string()))
    }
}

fn check_version(
    guard: &HashMap<PermitId, StoredPermit>,
    id: &PermitId,
    expected_version: u64,
) -> StorageResult<u64> {
    let current = guard
        .get(id)
        .ok_or_else(|| StorageError::NotFound(format!("permit {} not found", id)))?;
    if current.version != expected_version {
        return Err(StorageError::Conflict(format!(
            "permit {} is at version {}, expected {}",
            id, current.version, expected_version
        )));
    }
    Ok(current.version)
}

#[async_trait]
impl PermitRepository for InMemoryPermitRepository {
    async fn insert(&self, entity: &PermitEntity) -> StorageResult<StoredPermit> {
        let mut guard = self.write()?;
        if guard.contains_key(&entity.id) {
            return Err(StorageError::Conflict(format!(
                "permit {} already exists",
                entity.id
            )));
        }
        let stored = StoredPermit {
            entity: entity.clone(),
            version: 1,
            updated_at: Utc::now(),
        };
        guard.insert(entity.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn load(&self, id: &PermitId) -> StorageResult<StoredPermit> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("permit {} not found", id)))
    }

    async fn save(
        &self,
        entity: &PermitEntity,
        expected_version: u64,
    ) -> StorageResult<StoredPermit> {
        let mut guard = self.write()?;
        let version = check_version(&guard, &entity.id, expected_version)?;
        let stored = StoredPermit {
            entity: entity.clone(),
            version: version + 1,
            updated_at: Utc::now(),
        };
        guard.insert(entity.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn save_batch(&self, updates: &[PermitUpdate]) -> StorageResult<Vec<StoredPermit>> {
        let mut guard = self.write()?;

        let mut seen = HashSet::new();
        for update in updates {
            if !seen.insert(&update.entity.id) {
                return Err(StorageError::InvalidInput(format!(
                    "permit {} appears twice in one batch",
                    update.entity.id
                )));
            }
            check_version(&guard, &update.entity.id, update.expected_version)?;
        }

        let now = Utc::now();
        let mut stored = Vec::with_capacity(updates.len());
        for update in updates {
            let record = StoredPermit {
                entity: update.entity.clone(),
                version: update.expected_version + 1,
                updated_at: now,
            };
            guard.insert(update.entity.id.clone(), record.clone());
            stored.push(record);
        }
        Ok(stored)
    }

    async fn list(
        &self,
        filter: &PermitFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<StoredPermit>> {
        let guard = self.read()?;
        let mut rows: Vec<StoredPermit> = guard
            .values()
            .filter(|p| filter.matches(&p.entity))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.entity
                .created_at
                .cmp(&a.entity.created_at)
                .then_with(|| a.entity.id.cmp(&b.entity.id))
        });
        Ok(rows
            .into_iter()
            .skip(window.offset)
            .take(window.limit)
            .collect())
    }

    async fn children(&self, parent_id: &PermitId) -> StorageResult<Vec<StoredPermit>> {
        let guard = self.read()?;
        let mut rows: Vec<StoredPermit> = guard
            .values()
            .filter(|p| p.entity.parent_id.as_ref() == Some(parent_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.entity.created_at.cmp(&b.entity.created_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use permit_types::*;

    fn permit(id: &str, kind: PermitKind) -> PermitEntity {
        let now = Utc::now();
        PermitEntity {
            id: PermitId::new(id),
            kind,
            parent_id: None,
            title: "Valve replacement".into(),
            department: DepartmentCode::new("MAINT"),
            status: PermitStatus::Pending,
            assigned_to: Some(AssignedTo::Iss),
            gates: Gates::default(),
            completion: None,
            revocation: None,
            window: DateWindow::new(now, now + Duration::days(1)),
            receiver_name: None,
            receiver_email: None,
            creator_id: UserId::new("u1"),
            created_at: now,
            changed_at: now,
            changed_by: None,
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_load() {
        let repo = InMemoryPermitRepository::new();
        let stored = repo.insert(&permit("JP-1", PermitKind::JobPermit)).await.unwrap();
        assert_eq!(stored.version, 1);

        let loaded = repo.load(&PermitId::new("JP-1")).await.unwrap();
        assert_eq!(loaded.entity.title, "Valve replacement");
        assert!(matches!(
            repo.load(&PermitId::new("JP-404")).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let repo = InMemoryPermitRepository::new();
        repo.insert(&permit("JP-1", PermitKind::JobPermit)).await.unwrap();
        let err = repo
            .insert(&permit("JP-1", PermitKind::JobPermit))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_stale_save_is_rejected() {
        let repo = InMemoryPermitRepository::new();
        let mut entity = permit("JP-1", PermitKind::JobPermit);
        repo.insert(&entity).await.unwrap();

        entity.status = PermitStatus::Rejected;
        let saved = repo.save(&entity, 1).await.unwrap();
        assert_eq!(saved.version, 2);

        // a second writer still holding version 1
        let err = repo.save(&entity, 1).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(repo.load(&entity.id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let repo = InMemoryPermitRepository::new();
        let a = permit("JP-1", PermitKind::JobPermit);
        let b = permit("JP-2", PermitKind::JobPermit);
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();
        repo.save(&b, 1).await.unwrap();

        let mut a2 = a.clone();
        a2.status = PermitStatus::Revoked;
        let mut b2 = b.clone();
        b2.status = PermitStatus::Revoked;

        let err = repo
            .save_batch(&[PermitUpdate::new(a2.clone(), 1), PermitUpdate::new(b2.clone(), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(repo.load(&a.id).await.unwrap().entity.status, PermitStatus::Pending);

        let stored = repo
            .save_batch(&[PermitUpdate::new(a2, 1), PermitUpdate::new(b2, 2)])
            .await
            .unwrap();
        assert_eq!(stored[0].version, 2);
        assert_eq!(stored[1].version, 3);
    }

    #[tokio::test]
    async fn test_list_and_children() {
        let repo = InMemoryPermitRepository::new();
        repo.insert(&permit("JP-1", PermitKind::JobPermit)).await.unwrap();
        let mut ptw = permit("PTW-1", PermitKind::PermitToWork);
        ptw.parent_id = Some(PermitId::new("JP-1"));
        repo.insert(&ptw).await.unwrap();

        let filter = PermitFilter {
            kind: Some(PermitKind::PermitToWork),
            ..Default::default()
        };
        let listed = repo.list(&filter, QueryWindow::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entity.id, PermitId::new("PTW-1"));

        let children = repo.children(&PermitId::new("JP-1")).await.unwrap();
        assert_eq!(children.len(), 1);
    }
}
