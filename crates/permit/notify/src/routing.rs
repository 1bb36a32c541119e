//! Routing table: which stakeholders each workflow stage notifies
//!
//! The table is data. The router walks the rules for a stage in order and
//! resolves each source against the directory; the order matters because
//! the first relationship assigned to an identity is the one kept.
//!
//! Every stage ends with the creator so the person who raised the permit
//! is never dropped, even when no role filter would match them.

use permit_types::{CompletionStage, GateName, PermitEventKind, PermitKind, Role};
use serde::{Deserialize, Serialize};

use crate::recipients::Relationship;

/// Notification stage derived from an emitted event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStage {
    Creation,
    IssGateResolved,
    HodGateResolved,
    QaGateResolved,
    IssuerCompletion,
    QhsseCompletion,
    RevocationInitiated,
    RevocationResolved,
}

impl NotificationStage {
    pub fn for_event(kind: &PermitEventKind) -> Self {
        match kind {
            PermitEventKind::Created => NotificationStage::Creation,
            PermitEventKind::GateResolved { gate, .. } => match gate {
                GateName::Iss => NotificationStage::IssGateResolved,
                GateName::Hod => NotificationStage::HodGateResolved,
                GateName::Qa => NotificationStage::QaGateResolved,
            },
            PermitEventKind::CompletionRecorded { stage, .. } => match stage {
                CompletionStage::Issuer => NotificationStage::IssuerCompletion,
                CompletionStage::Qhsse => NotificationStage::QhsseCompletion,
            },
            PermitEventKind::RevocationInitiated { .. } => NotificationStage::RevocationInitiated,
            PermitEventKind::RevocationResolved { .. } => NotificationStage::RevocationResolved,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStage::Creation => "creation",
            NotificationStage::IssGateResolved => "iss_gate_resolved",
            NotificationStage::HodGateResolved => "hod_gate_resolved",
            NotificationStage::QaGateResolved => "qa_gate_resolved",
            NotificationStage::IssuerCompletion => "issuer_completion",
            NotificationStage::QhsseCompletion => "qhsse_completion",
            NotificationStage::RevocationInitiated => "revocation_initiated",
            NotificationStage::RevocationResolved => "revocation_resolved",
        }
    }
}

impl std::fmt::Display for NotificationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a group of recipients comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipientSource {
    /// Holders of a role within the permit's department
    DepartmentRole(Role, Relationship),
    /// Holders of a role across all departments
    AllRole(Role, Relationship),
    /// The person who approved a gate on this specific permit
    GateApprover(GateName, Relationship),
    /// The party performing the transition
    Actor(Relationship),
    /// The named permit receiver
    Receiver,
    /// The permit creator
    Creator,
}

/// One routing rule, optionally restricted to a permit variant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteRule {
    pub source: RecipientSource,
    pub only_for: Option<PermitKind>,
}

impl RouteRule {
    const fn all(source: RecipientSource) -> Self {
        Self {
            source,
            only_for: None,
        }
    }

    const fn only(kind: PermitKind, source: RecipientSource) -> Self {
        Self {
            source,
            only_for: Some(kind),
        }
    }

    pub fn applies_to(&self, kind: PermitKind) -> bool {
        self.only_for.map_or(true, |only| only == kind)
    }
}

use RecipientSource::*;

const CREATION: &[RouteRule] = &[
    RouteRule::all(DepartmentRole(Role::Iss, Relationship::Issuer)),
    RouteRule::all(Creator),
];

const ISS_GATE: &[RouteRule] = &[
    RouteRule::all(DepartmentRole(Role::Hod, Relationship::Hod)),
    RouteRule::all(DepartmentRole(Role::Iss, Relationship::Issuer)),
    RouteRule::all(Creator),
];

const HOD_GATE: &[RouteRule] = &[
    RouteRule::all(AllRole(Role::Qa, Relationship::Approver)),
    RouteRule::all(DepartmentRole(Role::Hod, Relationship::Hod)),
    RouteRule::all(DepartmentRole(Role::Iss, Relationship::Issuer)),
    RouteRule::all(Creator),
];

const QA_GATE: &[RouteRule] = &[
    RouteRule::all(AllRole(Role::Qa, Relationship::Approver)),
    RouteRule::all(DepartmentRole(Role::Hod, Relationship::Hod)),
    RouteRule::only(
        PermitKind::PermitToWork,
        GateApprover(GateName::Iss, Relationship::Issuer),
    ),
    RouteRule::all(Creator),
];

const ISSUER_COMPLETION: &[RouteRule] = &[
    RouteRule::all(AllRole(Role::Qa, Relationship::Approver)),
    RouteRule::all(DepartmentRole(Role::Hod, Relationship::Hod)),
    RouteRule::all(Actor(Relationship::Submitter)),
    RouteRule::all(Creator),
];

const QHSSE_COMPLETION: &[RouteRule] = &[
    RouteRule::all(GateApprover(GateName::Iss, Relationship::Issuer)),
    RouteRule::all(GateApprover(GateName::Hod, Relationship::Hod)),
    RouteRule::all(Receiver),
    RouteRule::all(Creator),
];

const REVOCATION_INITIATED: &[RouteRule] = &[
    RouteRule::all(AllRole(Role::Qa, Relationship::Approver)),
    RouteRule::all(DepartmentRole(Role::Hod, Relationship::Hod)),
    RouteRule::all(Actor(Relationship::Submitter)),
    RouteRule::all(Creator),
];

const REVOCATION_RESOLVED: &[RouteRule] = &[
    RouteRule::all(GateApprover(GateName::Iss, Relationship::Issuer)),
    RouteRule::all(GateApprover(GateName::Hod, Relationship::Hod)),
    RouteRule::all(Receiver),
    RouteRule::all(Creator),
];

/// Rules for a stage, in resolution order
pub fn rules_for(stage: NotificationStage) -> &'static [RouteRule] {
    match stage {
        NotificationStage::Creation => CREATION,
        NotificationStage::IssGateResolved => ISS_GATE,
        NotificationStage::HodGateResolved => HOD_GATE,
        NotificationStage::QaGateResolved => QA_GATE,
        NotificationStage::IssuerCompletion => ISSUER_COMPLETION,
        NotificationStage::QhsseCompletion => QHSSE_COMPLETION,
        NotificationStage::RevocationInitiated => REVOCATION_INITIATED,
        NotificationStage::RevocationResolved => REVOCATION_RESOLVED,
    }
}
