//! Events emitted by committed workflow transitions
//!
//! The engine never notifies anyone itself. Each transition returns a
//! [`PermitEvent`] that the caller hands to the notification router once the
//! new snapshot has been persisted.

use crate::{Actor, AssignedTo, CompletionStage, Decision, GateName, PermitEntity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to the permit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PermitEventKind {
    /// A new permit entered the ISS queue
    Created,
    /// A gate was approved or rejected
    GateResolved {
        gate: GateName,
        decision: Decision,
        /// Assignment after the transition
        next: Option<AssignedTo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        comments: Option<String>,
    },
    RevocationInitiated {
        reason: String,
    },
    RevocationResolved {
        decision: Decision,
        #[serde(skip_serializing_if = "Option::is_none")]
        comments: Option<String>,
    },
    /// A Permit to Work close-out step was recorded
    CompletionRecorded {
        stage: CompletionStage,
        #[serde(skip_serializing_if = "Option::is_none")]
        remarks: Option<String>,
    },
}

impl PermitEventKind {
    /// Name handed to the dispatcher for template selection
    pub fn name(&self) -> &'static str {
        match self {
            PermitEventKind::Created => "permit_created",
            PermitEventKind::GateResolved {
                decision: Decision::Approved,
                ..
            } => "gate_approved",
            PermitEventKind::GateResolved {
                decision: Decision::Rejected,
                ..
            } => "gate_rejected",
            PermitEventKind::RevocationInitiated { .. } => "revocation_initiated",
            PermitEventKind::RevocationResolved {
                decision: Decision::Approved,
                ..
            } => "revocation_approved",
            PermitEventKind::RevocationResolved {
                decision: Decision::Rejected,
                ..
            } => "revocation_rejected",
            PermitEventKind::CompletionRecorded {
                stage: CompletionStage::Issuer,
                ..
            } => "issuer_completion",
            PermitEventKind::CompletionRecorded {
                stage: CompletionStage::Qhsse,
                ..
            } => "qhsse_completion",
        }
    }

    /// Free text attached to the event (comments, reason or remarks)
    pub fn note(&self) -> Option<&str> {
        match self {
            PermitEventKind::Created => None,
            PermitEventKind::GateResolved { comments, .. } => comments.as_deref(),
            PermitEventKind::RevocationInitiated { reason } => Some(reason.as_str()),
            PermitEventKind::RevocationResolved { comments, .. } => comments.as_deref(),
            PermitEventKind::CompletionRecorded { remarks, .. } => remarks.as_deref(),
        }
    }
}

/// A committed transition: the resulting snapshot, who acted, and what
/// happened
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitEvent {
    pub entity: PermitEntity,
    pub actor: Actor,
    pub kind: PermitEventKind,
    pub occurred_at: DateTime<Utc>,
}

impl PermitEvent {
    pub fn new(entity: PermitEntity, actor: Actor, kind: PermitEventKind) -> Self {
        Self {
            occurred_at: entity.changed_at,
            entity,
            actor,
            kind,
        }
    }
}
