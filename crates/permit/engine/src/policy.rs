//! Variant policies: the few places Job Permit and Permit to Work differ
//!
//! Gate sequencing is one algorithm. The variant only decides the marker
//! written after the final QA approval, whether the close-out sub-machine
//! exists, and when a permit may be revoked.

use permit_types::{AssignedTo, PermitEntity, PermitKind, PermitStatus};

pub trait VariantPolicy: Send + Sync {
    fn kind(&self) -> PermitKind;

    /// Assignment after the QA gate approves
    fn approved_marker(&self) -> AssignedTo;

    /// Assignment after any gate rejects
    fn rejected_marker(&self) -> AssignedTo {
        AssignedTo::Rejected
    }

    /// Whether the two-step close-out applies
    fn supports_completion(&self) -> bool;

    /// Whether a revocation may be initiated from the current state
    fn is_revocable(&self, entity: &PermitEntity) -> bool;
}

/// Job Permit: final approval ends at `COMPLETED`
#[derive(Clone, Copy, Debug, Default)]
pub struct JobPermitPolicy;

impl VariantPolicy for JobPermitPolicy {
    fn kind(&self) -> PermitKind {
        PermitKind::JobPermit
    }

    fn approved_marker(&self) -> AssignedTo {
        AssignedTo::Completed
    }

    fn supports_completion(&self) -> bool {
        false
    }

    fn is_revocable(&self, entity: &PermitEntity) -> bool {
        entity.status == PermitStatus::Approved
    }
}

/// Permit to Work: final approval means work may proceed (`ONGOING`)
#[derive(Clone, Copy, Debug, Default)]
pub struct PermitToWorkPolicy;

impl VariantPolicy for PermitToWorkPolicy {
    fn kind(&self) -> PermitKind {
        PermitKind::PermitToWork
    }

    fn approved_marker(&self) -> AssignedTo {
        AssignedTo::Ongoing
    }

    fn supports_completion(&self) -> bool {
        true
    }

    fn is_revocable(&self, entity: &PermitEntity) -> bool {
        entity.status == PermitStatus::Approved && entity.assigned_to == Some(AssignedTo::Ongoing)
    }
}

static JOB_PERMIT: JobPermitPolicy = JobPermitPolicy;
static PERMIT_TO_WORK: PermitToWorkPolicy = PermitToWorkPolicy;

pub fn policy_for(kind: PermitKind) -> &'static dyn VariantPolicy {
    match kind {
        PermitKind::JobPermit => &JOB_PERMIT,
        PermitKind::PermitToWork => &PERMIT_TO_WORK,
    }
}
