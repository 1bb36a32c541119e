//! The transition orchestrator: load, transition, persist, notify

use std::sync::Arc;

use permit_engine::{Transition, WorkflowEngine};
use permit_notify::{DispatchQueue, NotificationRouter, OrgDirectory};
use permit_storage::{PermitFilter, PermitRepository, PermitUpdate, QueryWindow, StoredPermit};
use permit_types::{
    Actor, Decision, PermitDraft, PermitError, PermitEvent, PermitId, PermitKind,
};

use crate::error::ServiceResult;
use crate::validation::validate_draft;

/// Runs workflow transitions against the repository.
///
/// Each operation loads the current snapshot, asks the engine for the next
/// one, saves it under the loaded version and only then routes and
/// enqueues the notification. A lost race surfaces as a retryable storage
/// conflict; notification problems never fail an operation.
pub struct PermitService {
    engine: WorkflowEngine,
    repository: Arc<dyn PermitRepository>,
    router: NotificationRouter,
    dispatch: DispatchQueue,
}

impl PermitService {
    pub fn new(
        repository: Arc<dyn PermitRepository>,
        directory: Arc<dyn OrgDirectory>,
        dispatch: DispatchQueue,
    ) -> Self {
        Self {
            engine: WorkflowEngine::new(),
            repository,
            router: NotificationRouter::new(directory),
            dispatch,
        }
    }

    pub fn repository(&self) -> &Arc<dyn PermitRepository> {
        &self.repository
    }

    // ============ Creation ============

    pub async fn create_job_permit(
        &self,
        draft: PermitDraft,
        actor: &Actor,
    ) -> ServiceResult<StoredPermit> {
        validate_draft(PermitKind::JobPermit, &draft)?;
        let transition = self.engine.create_job_permit(draft, actor)?;
        let stored = self.repository.insert(&transition.entity).await?;
        tracing::info!(permit_id = %stored.entity.id, actor = %actor.id, "Job permit raised");
        self.notify(transition.event);
        Ok(stored)
    }

    /// Raise a Permit to Work against an approved Job Permit
    pub async fn create_permit_to_work(
        &self,
        parent_id: &PermitId,
        draft: PermitDraft,
        actor: &Actor,
    ) -> ServiceResult<StoredPermit> {
        validate_draft(PermitKind::PermitToWork, &draft)?;
        let parent = self.load_existing(parent_id, "parent job permit").await?;
        let transition = self
            .engine
            .create_permit_to_work(draft, &parent.entity, actor)?;
        let stored = self.repository.insert(&transition.entity).await?;
        tracing::info!(
            permit_id = %stored.entity.id,
            parent_id = %parent_id,
            actor = %actor.id,
            "Permit to work raised"
        );
        self.notify(transition.event);
        Ok(stored)
    }

    // ============ Transitions ============

    pub async fn advance_gate(
        &self,
        id: &PermitId,
        gate: &str,
        actor: &Actor,
        decision: Decision,
        comments: Option<&str>,
    ) -> ServiceResult<StoredPermit> {
        let current = self.load_existing(id, "permit").await?;
        let transition = self
            .engine
            .advance_gate(&current.entity, gate, actor, decision, comments)?;
        self.commit(transition, current.version).await
    }

    /// Start a revocation. Only ISS and QA role holders may do this.
    pub async fn initiate_revocation(
        &self,
        id: &PermitId,
        actor: &Actor,
        reason: &str,
    ) -> ServiceResult<StoredPermit> {
        if !actor.role.may_initiate_revocation() {
            return Err(PermitError::PermissionDenied(format!(
                "role {} may not initiate a revocation",
                actor.role
            ))
            .into());
        }
        let current = self.load_existing(id, "permit").await?;
        let transition = self
            .engine
            .initiate_revocation(&current.entity, actor, reason)?;
        self.commit(transition, current.version).await
    }

    pub async fn resolve_revocation(
        &self,
        id: &PermitId,
        actor: &Actor,
        decision: Decision,
        comments: Option<&str>,
    ) -> ServiceResult<StoredPermit> {
        let mut stored = self
            .resolve_revocation_batch(std::slice::from_ref(id), actor, decision, comments)
            .await?;
        stored
            .pop()
            .ok_or_else(|| PermitError::NotFound(format!("permit {}", id)).into())
    }

    /// Resolve several pending revocations at once. Every permit is
    /// validated first; if any one fails nothing is saved. The batch is
    /// then committed atomically.
    pub async fn resolve_revocation_batch(
        &self,
        ids: &[PermitId],
        actor: &Actor,
        decision: Decision,
        comments: Option<&str>,
    ) -> ServiceResult<Vec<StoredPermit>> {
        let mut updates = Vec::with_capacity(ids.len());
        let mut events = Vec::with_capacity(ids.len());

        for id in ids {
            let current = self.load_existing(id, "permit").await?;
            let transition = self
                .engine
                .resolve_revocation(&current.entity, actor, decision, comments)
                .map_err(|e| {
                    tracing::warn!(
                        permit_id = %id,
                        batch_size = ids.len(),
                        error = %e,
                        "Revocation batch aborted"
                    );
                    e
                })?;
            updates.push(PermitUpdate::new(transition.entity, current.version));
            events.push(transition.event);
        }

        let stored = self.repository.save_batch(&updates).await?;
        tracing::info!(
            count = stored.len(),
            decision = %decision,
            actor = %actor.id,
            "Revocations resolved"
        );
        for event in events {
            self.notify(event);
        }
        Ok(stored)
    }

    /// Record a Permit to Work close-out step (`ISS` or `QA`)
    pub async fn complete_stage(
        &self,
        id: &PermitId,
        stage: &str,
        actor: &Actor,
        remarks: Option<&str>,
    ) -> ServiceResult<StoredPermit> {
        let current = self.load_existing(id, "permit").await?;
        let transition = self
            .engine
            .complete_stage(&current.entity, stage, actor, remarks)?;
        self.commit(transition, current.version).await
    }

    // ============ Queries ============

    pub async fn get(&self, id: &PermitId) -> ServiceResult<StoredPermit> {
        self.load_existing(id, "permit").await
    }

    pub async fn list(
        &self,
        filter: &PermitFilter,
        window: QueryWindow,
    ) -> ServiceResult<Vec<StoredPermit>> {
        Ok(self.repository.list(filter, window).await?)
    }

    pub async fn permits_to_work(&self, parent_id: &PermitId) -> ServiceResult<Vec<StoredPermit>> {
        Ok(self.repository.children(parent_id).await?)
    }

    // ============ Internals ============

    async fn load_existing(&self, id: &PermitId, what: &str) -> ServiceResult<StoredPermit> {
        match self.repository.load(id).await {
            Ok(stored) => Ok(stored),
            Err(permit_storage::StorageError::NotFound(_)) => {
                Err(PermitError::NotFound(format!("{} {} does not exist", what, id)).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(
        &self,
        transition: Transition,
        expected_version: u64,
    ) -> ServiceResult<StoredPermit> {
        let stored = self
            .repository
            .save(&transition.entity, expected_version)
            .await
            .map_err(|e| {
                if e.is_retryable() {
                    tracing::warn!(
                        permit_id = %transition.entity.id,
                        expected_version,
                        "Concurrent update detected, transition not saved"
                    );
                }
                e
            })?;
        tracing::info!(
            permit_id = %stored.entity.id,
            event = transition.event.kind.name(),
            status = %stored.entity.status,
            version = stored.version,
            "Permit transition committed"
        );
        self.notify(transition.event);
        Ok(stored)
    }

    /// Route and enqueue. Runs after the commit and cannot fail it.
    fn notify(&self, event: PermitEvent) {
        let notification = self.router.route(&event);
        if !notification.unresolved.is_empty() {
            tracing::warn!(
                permit_id = %event.entity.id,
                stage = %notification.stage,
                unresolved = ?notification.unresolved,
                "Some recipients could not be resolved"
            );
        }
        self.dispatch.enqueue(notification);
    }
}
