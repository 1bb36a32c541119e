//! Permit snapshots: the unit the workflow engine operates on
//!
//! A [`PermitEntity`] is created `Pending` with `assigned_to = ISS` and is
//! only ever mutated through workflow engine transitions. Once `Rejected`,
//! `Revoked` or `Completed` it is immutable.

use crate::{
    AssignedTo, CompletionStatus, DepartmentCode, GateStatus, PermitId, PermitKind, PermitStatus,
    Role, UserId,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── Gate Records ─────────────────────────────────────────────────────

/// State of one approval gate
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRecord {
    pub status: GateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl GateRecord {
    pub fn is_pending(&self) -> bool {
        self.status == GateStatus::Pending
    }
}

/// The ordered gate triple `{ISS, HOD, QA}`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gates {
    #[serde(rename = "ISS")]
    pub iss: GateRecord,
    #[serde(rename = "HOD")]
    pub hod: GateRecord,
    #[serde(rename = "QA")]
    pub qa: GateRecord,
}

// ── Completion (Permit to Work) ──────────────────────────────────────

/// Two-step close-out of a Permit to Work
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub issuer_completion: CompletionStatus,
    pub qhsse_completion: CompletionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_completed_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qhsse_remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qhsse_completed_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qhsse_completed_at: Option<DateTime<Utc>>,
}

// ── Revocation ───────────────────────────────────────────────────────

/// A revocation request. Present from initiation until it is rejected;
/// an approved revocation stays on the record with `is_pending = false`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub reason: String,
    pub initiated_by: UserId,
    pub initiated_at: DateTime<Utc>,
    pub is_pending: bool,
    /// Status held immediately before the revocation was initiated
    pub prior_status: PermitStatus,
    /// Assignment held immediately before the revocation was initiated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_assigned_to: Option<AssignedTo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_comments: Option<String>,
}

// ── Date Window ──────────────────────────────────────────────────────

/// Validity window: start/end for a Job Permit, entry/exit for a Permit
/// to Work
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

// ── History ──────────────────────────────────────────────────────────

/// One audit-trail entry, appended on every transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub actor: UserId,
    pub role: Role,
    pub at: DateTime<Utc>,
    pub detail: String,
}

// ── Draft ────────────────────────────────────────────────────────────

/// Caller-supplied fields for a new permit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitDraft {
    pub title: String,
    pub department: DepartmentCode,
    pub window: DateWindow,
    /// Display name of the person receiving the permit (Permit to Work)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_email: Option<String>,
}

impl PermitDraft {
    pub fn new(title: impl Into<String>, department: impl Into<String>, window: DateWindow) -> Self {
        Self {
            title: title.into(),
            department: DepartmentCode::new(department),
            window,
            receiver_name: None,
            receiver_email: None,
        }
    }

    pub fn with_receiver(mut self, name: impl Into<String>) -> Self {
        self.receiver_name = Some(name.into());
        self
    }

    pub fn with_receiver_email(mut self, email: impl Into<String>) -> Self {
        self.receiver_email = Some(email.into());
        self
    }
}

// ── Permit Entity ────────────────────────────────────────────────────

/// Snapshot of a Job Permit or Permit to Work
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitEntity {
    pub id: PermitId,
    pub kind: PermitKind,
    /// The Job Permit this Permit to Work depends on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<PermitId>,
    pub title: String,
    pub department: DepartmentCode,
    pub status: PermitStatus,
    pub assigned_to: Option<AssignedTo>,
    pub gates: Gates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<Revocation>,
    pub window: DateWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_email: Option<String>,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl PermitEntity {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_permit_to_work(&self) -> bool {
        self.kind == PermitKind::PermitToWork
    }

    /// The gate expected to act next, if the permit is waiting on one
    pub fn pending_gate(&self) -> Option<crate::GateName> {
        self.assigned_to.and_then(|a| a.gate())
    }

    /// Record a change for provenance and append an audit entry
    pub fn record_change(
        &mut self,
        action: impl Into<String>,
        actor: &UserId,
        role: Role,
        at: DateTime<Utc>,
        detail: impl Into<String>,
    ) {
        self.changed_at = at;
        self.changed_by = Some(actor.clone());
        self.history.push(HistoryEntry {
            action: action.into(),
            actor: actor.clone(),
            role,
            at,
            detail: detail.into(),
        });
    }
}
