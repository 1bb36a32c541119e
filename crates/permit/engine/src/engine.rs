//! Workflow Engine: pure transitions over permit snapshots
//!
//! Each operation validates the requested action against the snapshot and
//! the acting party, then returns the next snapshot and the event it emits.
//! The input snapshot is never modified; a failed validation leaves nothing
//! half-applied.
//!
//! Rejections are deterministic: an action on a permit that has already
//! reached a terminal state fails with `InvalidState` rather than
//! succeeding as a no-op, so callers can tell a lost race from success.

use crate::gate_table::gate_record_mut;
use crate::invariants::check_invariants;
use crate::policy::policy_for;
use chrono::Utc;
use permit_types::*;

/// Result of a successful transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// The snapshot to persist
    pub entity: PermitEntity,
    /// The event to route once the snapshot is committed
    pub event: PermitEvent,
}

impl Transition {
    fn new(entity: PermitEntity, actor: &Actor, kind: PermitEventKind) -> PermitResult<Self> {
        check_invariants(&entity)?;
        let event = PermitEvent::new(entity.clone(), actor.clone(), kind);
        Ok(Self { entity, event })
    }
}

/// The permit state machine. Holds no state of its own and is safe to
/// share across threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkflowEngine;

impl WorkflowEngine {
    pub fn new() -> Self {
        Self
    }

    // ── Creation ─────────────────────────────────────────────────────

    /// Create a Job Permit in the ISS queue
    pub fn create_job_permit(&self, draft: PermitDraft, creator: &Actor) -> PermitResult<Transition> {
        let entity = self.new_entity(PermitKind::JobPermit, None, draft, creator);
        tracing::debug!(permit_id = %entity.id, "Job permit created");
        Transition::new(entity, creator, PermitEventKind::Created)
    }

    /// Create a Permit to Work against an approved Job Permit
    pub fn create_permit_to_work(
        &self,
        draft: PermitDraft,
        parent: &PermitEntity,
        creator: &Actor,
    ) -> PermitResult<Transition> {
        if parent.kind != PermitKind::JobPermit {
            return Err(PermitError::InvalidArgument(format!(
                "parent {} is a {}, not a job permit",
                parent.id, parent.kind
            )));
        }
        if parent.status != PermitStatus::Approved {
            return Err(PermitError::InvalidState(format!(
                "parent job permit {} is {}, a permit to work requires it Approved",
                parent.id, parent.status
            )));
        }

        let entity = self.new_entity(
            PermitKind::PermitToWork,
            Some(parent.id.clone()),
            draft,
            creator,
        );
        tracing::debug!(permit_id = %entity.id, parent_id = %parent.id, "Permit to work created");
        Transition::new(entity, creator, PermitEventKind::Created)
    }

    fn new_entity(
        &self,
        kind: PermitKind,
        parent_id: Option<PermitId>,
        draft: PermitDraft,
        creator: &Actor,
    ) -> PermitEntity {
        let now = Utc::now();
        let completion = policy_for(kind)
            .supports_completion()
            .then(Completion::default);
        let mut entity = PermitEntity {
            id: PermitId::generate(),
            kind,
            parent_id,
            title: draft.title,
            department: draft.department,
            status: PermitStatus::Pending,
            assigned_to: Some(AssignedTo::Iss),
            gates: Gates::default(),
            completion,
            revocation: None,
            window: draft.window,
            receiver_name: draft.receiver_name,
            receiver_email: draft.receiver_email,
            creator_id: creator.id.clone(),
            created_at: now,
            changed_at: now,
            changed_by: None,
            history: Vec::new(),
        };
        entity.record_change(
            "created",
            &creator.id,
            creator.role,
            now,
            format!("{} created", kind.display_name()),
        );
        entity
    }

    // ── Gate Advancement ─────────────────────────────────────────────

    /// Approve or reject the gate the permit is currently assigned to.
    ///
    /// `gate` is the gate name as submitted by the caller. The actor's role
    /// must be the role of the assigned gate.
    pub fn advance_gate(
        &self,
        entity: &PermitEntity,
        gate: &str,
        actor: &Actor,
        decision: Decision,
        comments: Option<&str>,
    ) -> PermitResult<Transition> {
        let gate: GateName = gate.parse()?;
        ensure_not_terminal(entity)?;
        if entity.status != PermitStatus::Pending {
            return Err(PermitError::InvalidState(format!(
                "permit {} is {}, gate decisions require Pending",
                entity.id, entity.status
            )));
        }
        let assigned = entity.pending_gate().ok_or_else(|| {
            PermitError::InvalidState(format!("permit {} is not waiting on a gate", entity.id))
        })?;
        if actor.role != Role::from(assigned) {
            return Err(PermitError::PermissionDenied(format!(
                "permit {} is assigned to {}, acting role is {}",
                entity.id, assigned, actor.role
            )));
        }
        if gate != assigned {
            return Err(PermitError::InvalidState(format!(
                "gate {} is out of sequence, permit {} is assigned to {}",
                gate, entity.id, assigned
            )));
        }

        let policy = policy_for(entity.kind);
        let now = Utc::now();
        let comments = normalize(comments);
        let mut next = entity.clone();

        *gate_record_mut(&mut next.gates, gate) = GateRecord {
            status: decision.into(),
            comments: comments.clone(),
            approver_id: Some(actor.id.clone()),
            approved_at: Some(now),
        };

        match decision {
            Decision::Rejected => {
                next.status = PermitStatus::Rejected;
                next.assigned_to = Some(policy.rejected_marker());
            }
            Decision::Approved => match gate.next() {
                Some(following) => next.assigned_to = Some(following.into()),
                None => {
                    next.status = PermitStatus::Approved;
                    next.assigned_to = Some(policy.approved_marker());
                }
            },
        }

        next.record_change(
            format!("gate_{}", decision.as_str().to_ascii_lowercase()),
            &actor.id,
            actor.role,
            now,
            format!("{} gate {}", gate, decision),
        );

        tracing::info!(
            permit_id = %next.id,
            gate = %gate,
            decision = %decision,
            assigned_to = ?next.assigned_to.map(|a| a.as_str()),
            "Gate resolved"
        );

        let kind = PermitEventKind::GateResolved {
            gate,
            decision,
            next: next.assigned_to,
            comments,
        };
        Transition::new(next, actor, kind)
    }

    // ── Revocation ───────────────────────────────────────────────────

    /// Start a revocation of an approved permit.
    ///
    /// Whether the actor holds the revocation privilege is checked by the
    /// caller; the engine only checks that the permit can be revoked.
    pub fn initiate_revocation(
        &self,
        entity: &PermitEntity,
        actor: &Actor,
        reason: &str,
    ) -> PermitResult<Transition> {
        ensure_not_terminal(entity)?;
        if entity.status == PermitStatus::RevocationPending {
            return Err(PermitError::InvalidState(format!(
                "permit {} already has a pending revocation",
                entity.id
            )));
        }
        if !policy_for(entity.kind).is_revocable(entity) {
            return Err(PermitError::InvalidState(format!(
                "permit {} is {} and cannot be revoked",
                entity.id, entity.status
            )));
        }
        let reason = normalize(Some(reason)).ok_or_else(|| {
            PermitError::InvalidArgument("a revocation reason is required".into())
        })?;

        let now = Utc::now();
        let mut next = entity.clone();
        next.revocation = Some(Revocation {
            reason: reason.clone(),
            initiated_by: actor.id.clone(),
            initiated_at: now,
            is_pending: true,
            prior_status: entity.status,
            prior_assigned_to: entity.assigned_to,
            resolved_by: None,
            resolved_at: None,
            resolution_comments: None,
        });
        next.status = PermitStatus::RevocationPending;
        next.record_change("revocation_initiated", &actor.id, actor.role, now, reason.clone());

        tracing::info!(permit_id = %next.id, initiated_by = %actor.id, "Revocation initiated");
        Transition::new(next, actor, PermitEventKind::RevocationInitiated { reason })
    }

    /// QA decision on a pending revocation.
    ///
    /// Approval revokes the permit for good. Rejection restores the exact
    /// status and assignment recorded when the revocation was initiated.
    pub fn resolve_revocation(
        &self,
        entity: &PermitEntity,
        actor: &Actor,
        decision: Decision,
        comments: Option<&str>,
    ) -> PermitResult<Transition> {
        ensure_not_terminal(entity)?;
        if entity.status != PermitStatus::RevocationPending {
            return Err(PermitError::InvalidState(format!(
                "permit {} is {}, no revocation to resolve",
                entity.id, entity.status
            )));
        }
        if actor.role != Role::Qa {
            return Err(PermitError::PermissionDenied(format!(
                "revocations are resolved by QA, acting role is {}",
                actor.role
            )));
        }
        let revocation = entity.revocation.as_ref().ok_or_else(|| {
            PermitError::InvariantViolation(format!(
                "permit {} is RevocationPending without a revocation record",
                entity.id
            ))
        })?;

        let now = Utc::now();
        let comments = normalize(comments);
        let mut next = entity.clone();

        match decision {
            Decision::Approved => {
                next.status = PermitStatus::Revoked;
                next.revocation = Some(Revocation {
                    is_pending: false,
                    resolved_by: Some(actor.id.clone()),
                    resolved_at: Some(now),
                    resolution_comments: comments.clone(),
                    ..revocation.clone()
                });
            }
            Decision::Rejected => {
                next.status = revocation.prior_status;
                next.assigned_to = revocation.prior_assigned_to;
                next.revocation = None;
            }
        }

        next.record_change(
            format!("revocation_{}", decision.as_str().to_ascii_lowercase()),
            &actor.id,
            actor.role,
            now,
            comments.clone().unwrap_or_else(|| format!("revocation {}", decision)),
        );

        tracing::info!(
            permit_id = %next.id,
            decision = %decision,
            status = %next.status,
            "Revocation resolved"
        );
        Transition::new(next, actor, PermitEventKind::RevocationResolved { decision, comments })
    }

    // ── Completion (Permit to Work) ──────────────────────────────────

    /// Record a close-out step. `stage` is `ISS` (issuer) or `QA` (QHSSE);
    /// remarks are mandatory for the QHSSE step only.
    pub fn complete_stage(
        &self,
        entity: &PermitEntity,
        stage: &str,
        actor: &Actor,
        remarks: Option<&str>,
    ) -> PermitResult<Transition> {
        let stage: CompletionStage = stage.parse()?;
        ensure_not_terminal(entity)?;
        if !policy_for(entity.kind).supports_completion() {
            return Err(PermitError::InvalidArgument(format!(
                "permit {} is a {}, close-out applies to permits to work only",
                entity.id, entity.kind
            )));
        }

        let remarks = normalize(remarks);
        if stage == CompletionStage::Qhsse && remarks.is_none() {
            return Err(PermitError::InvalidArgument(
                "remarks are required for QHSSE completion".into(),
            ));
        }
        if entity.status != PermitStatus::Approved {
            return Err(PermitError::InvalidState(format!(
                "permit {} is {}, close-out requires Approved",
                entity.id, entity.status
            )));
        }
        let completion = entity.completion.as_ref().ok_or_else(|| {
            PermitError::InvariantViolation(format!(
                "permit to work {} has no completion record",
                entity.id
            ))
        })?;

        let now = Utc::now();
        let mut next = entity.clone();
        let mut updated = completion.clone();

        match stage {
            CompletionStage::Issuer => {
                if completion.issuer_completion == CompletionStatus::Completed {
                    return Err(PermitError::InvalidState(format!(
                        "issuer completion already recorded for {}",
                        entity.id
                    )));
                }
                ensure_role(actor, Role::Iss, "issuer completion")?;
                updated.issuer_completion = CompletionStatus::Completed;
                updated.issuer_remarks = remarks.clone();
                updated.issuer_completed_by = Some(actor.id.clone());
                updated.issuer_completed_at = Some(now);
            }
            CompletionStage::Qhsse => {
                if completion.issuer_completion != CompletionStatus::Completed {
                    return Err(PermitError::InvalidState(format!(
                        "issuer completion is still pending for {}",
                        entity.id
                    )));
                }
                if completion.qhsse_completion == CompletionStatus::Completed {
                    return Err(PermitError::InvalidState(format!(
                        "QHSSE completion already recorded for {}",
                        entity.id
                    )));
                }
                ensure_role(actor, Role::Qa, "QHSSE completion")?;
                updated.qhsse_completion = CompletionStatus::Completed;
                updated.qhsse_remarks = remarks.clone();
                updated.qhsse_completed_by = Some(actor.id.clone());
                updated.qhsse_completed_at = Some(now);
                next.status = PermitStatus::Completed;
                next.assigned_to = Some(AssignedTo::Completed);
            }
        }

        next.completion = Some(updated);
        next.record_change(
            format!("completion_{}", stage.as_str().to_ascii_lowercase()),
            &actor.id,
            actor.role,
            now,
            remarks.clone().unwrap_or_else(|| format!("{} completion", stage)),
        );

        tracing::info!(permit_id = %next.id, stage = %stage, status = %next.status, "Completion recorded");
        Transition::new(next, actor, PermitEventKind::CompletionRecorded { stage, remarks })
    }
}

fn ensure_not_terminal(entity: &PermitEntity) -> PermitResult<()> {
    if entity.is_terminal() {
        return Err(PermitError::InvalidState(format!(
            "permit {} is {} and accepts no further actions",
            entity.id, entity.status
        )));
    }
    Ok(())
}

fn ensure_role(actor: &Actor, required: Role, action: &str) -> PermitResult<()> {
    if actor.role != required {
        return Err(PermitError::PermissionDenied(format!(
            "{} requires role {}, acting role is {}",
            action, required, actor.role
        )));
    }
    Ok(())
}

/// Trim free text; blank input counts as absent
fn normalize(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new()
    }

    fn creator() -> Actor {
        Actor::new("creator", "Casey Creator", Role::User)
    }

    fn issuer() -> Actor {
        Actor::new("iss-1", "Ian Issuer", Role::Iss)
    }

    fn hod() -> Actor {
        Actor::new("hod-1", "Hana Head", Role::Hod)
    }

    fn qa() -> Actor {
        Actor::new("qa-1", "Quinn QHSSE", Role::Qa)
    }

    fn draft() -> PermitDraft {
        let now = Utc::now();
        PermitDraft::new("Confined space entry", "MAINT", DateWindow::new(now, now + Duration::days(2)))
            .with_receiver("Riley Receiver")
    }

    fn approve_all(permit: &PermitEntity) -> PermitEntity {
        let e = engine();
        let p = e
            .advance_gate(permit, "ISS", &issuer(), Decision::Approved, None)
            .unwrap()
            .entity;
        let p = e
            .advance_gate(&p, "HOD", &hod(), Decision::Approved, None)
            .unwrap()
            .entity;
        e.advance_gate(&p, "QA", &qa(), Decision::Approved, Some("ok"))
            .unwrap()
            .entity
    }

    fn approved_job_permit() -> PermitEntity {
        let jp = engine().create_job_permit(draft(), &creator()).unwrap().entity;
        approve_all(&jp)
    }

    fn approved_permit_to_work() -> PermitEntity {
        let parent = approved_job_permit();
        let ptw = engine()
            .create_permit_to_work(draft(), &parent, &creator())
            .unwrap()
            .entity;
        approve_all(&ptw)
    }

    #[test]
    fn test_job_permit_full_approval() {
        let e = engine();
        let jp = e.create_job_permit(draft(), &creator()).unwrap().entity;
        assert_eq!(jp.status, PermitStatus::Pending);
        assert_eq!(jp.assigned_to, Some(AssignedTo::Iss));
        assert!(jp.completion.is_none());

        let jp = e
            .advance_gate(&jp, "ISS", &issuer(), Decision::Approved, None)
            .unwrap()
            .entity;
        assert_eq!(jp.assigned_to, Some(AssignedTo::Hod));
        assert_eq!(jp.status, PermitStatus::Pending);

        let jp = e
            .advance_gate(&jp, "HOD", &hod(), Decision::Approved, None)
            .unwrap()
            .entity;
        assert_eq!(jp.assigned_to, Some(AssignedTo::Qa));

        let t = e
            .advance_gate(&jp, "QA", &qa(), Decision::Approved, Some("all controls in place"))
            .unwrap();
        assert_eq!(t.entity.status, PermitStatus::Approved);
        assert_eq!(t.entity.assigned_to, Some(AssignedTo::Completed));
        assert_eq!(t.entity.gates.qa.approver_id, Some(qa().id));
        assert_eq!(t.entity.gates.qa.comments.as_deref(), Some("all controls in place"));
        assert!(matches!(
            t.event.kind,
            PermitEventKind::GateResolved {
                gate: GateName::Qa,
                decision: Decision::Approved,
                next: Some(AssignedTo::Completed),
                ..
            }
        ));
    }

    #[test]
    fn test_permit_to_work_final_approval_is_ongoing() {
        let ptw = approved_permit_to_work();
        assert_eq!(ptw.status, PermitStatus::Approved);
        assert_eq!(ptw.assigned_to, Some(AssignedTo::Ongoing));
        assert!(ptw.parent_id.is_some());
    }

    #[test]
    fn test_permit_to_work_requires_approved_parent() {
        let e = engine();
        let parent = e.create_job_permit(draft(), &creator()).unwrap().entity;
        let err = e
            .create_permit_to_work(draft(), &parent, &creator())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_permit_to_work_parent_must_be_job_permit() {
        let ptw = approved_permit_to_work();
        let err = engine()
            .create_permit_to_work(draft(), &ptw, &creator())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_wrong_role_is_permission_denied() {
        let jp = engine().create_job_permit(draft(), &creator()).unwrap().entity;
        let err = engine()
            .advance_gate(&jp, "ISS", &hod(), Decision::Approved, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_unknown_gate_is_invalid_argument() {
        let jp = engine().create_job_permit(draft(), &creator()).unwrap().entity;
        let err = engine()
            .advance_gate(&jp, "SUPERVISOR", &issuer(), Decision::Approved, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_gate_name_is_trimmed() {
        let jp = engine().create_job_permit(draft(), &creator()).unwrap().entity;
        let t = engine()
            .advance_gate(&jp, "  ISS ", &issuer(), Decision::Approved, None)
            .unwrap();
        assert_eq!(t.entity.assigned_to, Some(AssignedTo::Hod));
    }

    #[test]
    fn test_out_of_sequence_gate_is_invalid_state() {
        let jp = engine().create_job_permit(draft(), &creator()).unwrap().entity;
        let err = engine()
            .advance_gate(&jp, "HOD", &issuer(), Decision::Approved, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_rejection_is_terminal() {
        let e = engine();
        let jp = e.create_job_permit(draft(), &creator()).unwrap().entity;
        let jp = e
            .advance_gate(&jp, "ISS", &issuer(), Decision::Approved, None)
            .unwrap()
            .entity;
        let rejected = e
            .advance_gate(&jp, "HOD", &hod(), Decision::Rejected, Some("missing isolation plan"))
            .unwrap()
            .entity;
        assert_eq!(rejected.status, PermitStatus::Rejected);
        assert_eq!(rejected.assigned_to, Some(AssignedTo::Rejected));
        assert_eq!(rejected.gates.qa.status, GateStatus::Pending);

        for actor in [issuer(), hod(), qa()] {
            for gate in ["ISS", "HOD", "QA"] {
                let err = e
                    .advance_gate(&rejected, gate, &actor, Decision::Approved, None)
                    .unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidState);
            }
        }
        let err = e.initiate_revocation(&rejected, &qa(), "no").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_permit_to_work_rejection_uses_rejected_marker() {
        let parent = approved_job_permit();
        let ptw = engine()
            .create_permit_to_work(draft(), &parent, &creator())
            .unwrap()
            .entity;
        let rejected = engine()
            .advance_gate(&ptw, "ISS", &issuer(), Decision::Rejected, None)
            .unwrap()
            .entity;
        assert_eq!(rejected.assigned_to, Some(AssignedTo::Rejected));
        let err = engine()
            .complete_stage(&rejected, "ISS", &issuer(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_revocation_approved_is_terminal() {
        let e = engine();
        let jp = approved_job_permit();
        let pending = e
            .initiate_revocation(&jp, &issuer(), "unsafe conditions detected")
            .unwrap();
        assert_eq!(pending.entity.status, PermitStatus::RevocationPending);
        assert_eq!(pending.entity.assigned_to, jp.assigned_to);
        let revocation = pending.entity.revocation.as_ref().unwrap();
        assert!(revocation.is_pending);
        assert_eq!(revocation.prior_status, PermitStatus::Approved);

        let revoked = e
            .resolve_revocation(&pending.entity, &qa(), Decision::Approved, None)
            .unwrap()
            .entity;
        assert_eq!(revoked.status, PermitStatus::Revoked);
        assert!(!revoked.revocation.as_ref().unwrap().is_pending);

        let err = e
            .advance_gate(&revoked, "QA", &qa(), Decision::Approved, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_revocation_rejected_restores_prior_state() {
        let e = engine();
        for permit in [approved_job_permit(), approved_permit_to_work()] {
            let pending = e
                .initiate_revocation(&permit, &qa(), "spot check")
                .unwrap()
                .entity;
            let restored = e
                .resolve_revocation(&pending, &qa(), Decision::Rejected, Some("controls verified"))
                .unwrap()
                .entity;
            assert_eq!(restored.status, permit.status);
            assert_eq!(restored.assigned_to, permit.assigned_to);
            assert!(restored.revocation.is_none());
        }
    }

    #[test]
    fn test_revocation_requires_approved_permit() {
        let jp = engine().create_job_permit(draft(), &creator()).unwrap().entity;
        let err = engine()
            .initiate_revocation(&jp, &issuer(), "reason")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_revocation_requires_reason() {
        let err = engine()
            .initiate_revocation(&approved_job_permit(), &issuer(), "   ")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_second_revocation_is_invalid_state() {
        let e = engine();
        let pending = e
            .initiate_revocation(&approved_job_permit(), &issuer(), "first")
            .unwrap()
            .entity;
        let err = e.initiate_revocation(&pending, &qa(), "second").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_revocation_resolution_requires_qa() {
        let e = engine();
        let pending = e
            .initiate_revocation(&approved_job_permit(), &issuer(), "reason")
            .unwrap()
            .entity;
        let err = e
            .resolve_revocation(&pending, &issuer(), Decision::Approved, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_gate_decisions_blocked_during_revocation() {
        let e = engine();
        let pending = e
            .initiate_revocation(&approved_job_permit(), &issuer(), "reason")
            .unwrap()
            .entity;
        let err = e
            .advance_gate(&pending, "QA", &qa(), Decision::Approved, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_completion_sequence() {
        let e = engine();
        let ptw = approved_permit_to_work();

        let issued = e.complete_stage(&ptw, "ISS", &issuer(), None).unwrap();
        let completion = issued.entity.completion.as_ref().unwrap();
        assert_eq!(completion.issuer_completion, CompletionStatus::Completed);
        assert_eq!(issued.entity.status, PermitStatus::Approved);

        let err = e
            .complete_stage(&issued.entity, "QA", &qa(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let done = e
            .complete_stage(&issued.entity, "QA", &qa(), Some("ok"))
            .unwrap();
        assert_eq!(done.entity.status, PermitStatus::Completed);
        assert_eq!(
            done.entity.completion.as_ref().unwrap().qhsse_completion,
            CompletionStatus::Completed
        );
        assert!(matches!(
            done.event.kind,
            PermitEventKind::CompletionRecorded {
                stage: CompletionStage::Qhsse,
                ..
            }
        ));
    }

    #[test]
    fn test_qhsse_remarks_required_regardless_of_role() {
        let e = engine();
        let issued = e
            .complete_stage(&approved_permit_to_work(), "ISS", &issuer(), None)
            .unwrap()
            .entity;
        for actor in [issuer(), hod(), qa(), creator()] {
            let err = e.complete_stage(&issued, "QA", &actor, Some("  ")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_qhsse_completion_requires_issuer_completion() {
        let err = engine()
            .complete_stage(&approved_permit_to_work(), "QA", &qa(), Some("ok"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_issuer_completion_only_once() {
        let e = engine();
        let issued = e
            .complete_stage(&approved_permit_to_work(), "ISS", &issuer(), None)
            .unwrap()
            .entity;
        let err = e.complete_stage(&issued, "ISS", &issuer(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_completion_stage_validation() {
        let e = engine();
        let ptw = approved_permit_to_work();
        let err = e.complete_stage(&ptw, "HOD", &hod(), Some("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = e
            .complete_stage(&approved_job_permit(), "ISS", &issuer(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = e.complete_stage(&ptw, "ISS", &qa(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_completion_before_approval_is_invalid_state() {
        let parent = approved_job_permit();
        let ptw = engine()
            .create_permit_to_work(draft(), &parent, &creator())
            .unwrap()
            .entity;
        let err = engine()
            .complete_stage(&ptw, "ISS", &issuer(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_history_records_every_transition() {
        let ptw = approved_permit_to_work();
        let actions: Vec<_> = ptw.history.iter().map(|h| h.action.as_str()).collect();
        assert_eq!(
            actions,
            vec!["created", "gate_approved", "gate_approved", "gate_approved"]
        );
        assert_eq!(ptw.changed_by, Some(qa().id));
    }

    #[test]
    fn test_input_snapshot_is_untouched_on_error() {
        let jp = engine().create_job_permit(draft(), &creator()).unwrap().entity;
        let before = jp.clone();
        let _ = engine().advance_gate(&jp, "ISS", &qa(), Decision::Approved, None);
        assert_eq!(jp, before);
    }
}
