//! Status vocabulary shared by the engine, storage and notifications
//!
//! The string forms here are the persisted wire contract. They are matched
//! exactly after trimming surrounding whitespace.

use crate::PermitError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum from a
/// single variant/string table.
macro_rules! wire_strings {
    ($ty:ident, $what:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Persisted wire form
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = PermitError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($s => Ok($ty::$variant),)+
                    other => Err(PermitError::InvalidArgument(format!(
                        "unknown {}: '{}'",
                        $what, other
                    ))),
                }
            }
        }
    };
}

// ── Permit Variant ───────────────────────────────────────────────────

/// Which permit record a snapshot describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermitKind {
    JobPermit,
    PermitToWork,
}

wire_strings!(PermitKind, "permit kind", {
    JobPermit => "JobPermit",
    PermitToWork => "PermitToWork",
});

impl PermitKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            PermitKind::JobPermit => "Job Permit",
            PermitKind::PermitToWork => "Permit to Work",
        }
    }
}

// ── Overall Status ───────────────────────────────────────────────────

/// Overall lifecycle status of a permit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermitStatus {
    Pending,
    Approved,
    Rejected,
    RevocationPending,
    Revoked,
    Completed,
}

wire_strings!(PermitStatus, "permit status", {
    Pending => "Pending",
    Approved => "Approved",
    Rejected => "Rejected",
    RevocationPending => "RevocationPending",
    Revoked => "Revoked",
    Completed => "Completed",
});

impl PermitStatus {
    /// Terminal statuses accept no further gate, completion or revocation
    /// actions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PermitStatus::Rejected | PermitStatus::Revoked | PermitStatus::Completed
        )
    }
}

// ── Gates ────────────────────────────────────────────────────────────

/// One of the three sequential approval checkpoints
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GateName {
    #[serde(rename = "ISS")]
    Iss,
    #[serde(rename = "HOD")]
    Hod,
    #[serde(rename = "QA")]
    Qa,
}

wire_strings!(GateName, "gate", {
    Iss => "ISS",
    Hod => "HOD",
    Qa => "QA",
});

impl GateName {
    /// Fixed, total gate order
    pub const ORDER: [GateName; 3] = [GateName::Iss, GateName::Hod, GateName::Qa];

    /// The gate after this one, if any
    pub fn next(&self) -> Option<GateName> {
        match self {
            GateName::Iss => Some(GateName::Hod),
            GateName::Hod => Some(GateName::Qa),
            GateName::Qa => None,
        }
    }

    /// Position in [`GateName::ORDER`]
    pub fn index(&self) -> usize {
        match self {
            GateName::Iss => 0,
            GateName::Hod => 1,
            GateName::Qa => 2,
        }
    }

    /// Label used in notifications (`QA` is presented as `QHSSE`)
    pub fn label(&self) -> &'static str {
        match self {
            GateName::Iss => "ISS",
            GateName::Hod => "HOD",
            GateName::Qa => "QHSSE",
        }
    }
}

/// Status of a single gate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

wire_strings!(GateStatus, "gate status", {
    Pending => "Pending",
    Approved => "Approved",
    Rejected => "Rejected",
});

/// An approver's decision at a gate or on a revocation request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
}

wire_strings!(Decision, "decision", {
    Approved => "Approved",
    Rejected => "Rejected",
});

impl From<Decision> for GateStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => GateStatus::Approved,
            Decision::Rejected => GateStatus::Rejected,
        }
    }
}

// ── Assignment ───────────────────────────────────────────────────────

/// The `assignedTo` field: the pending gate, or a terminal marker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignedTo {
    #[serde(rename = "ISS")]
    Iss,
    #[serde(rename = "HOD")]
    Hod,
    #[serde(rename = "QA")]
    Qa,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "ONGOING")]
    Ongoing,
    #[serde(rename = "REJECTED")]
    Rejected,
}

wire_strings!(AssignedTo, "assignment", {
    Iss => "ISS",
    Hod => "HOD",
    Qa => "QA",
    Completed => "COMPLETED",
    Ongoing => "ONGOING",
    Rejected => "REJECTED",
});

impl AssignedTo {
    /// The gate this assignment names, if it names one
    pub fn gate(&self) -> Option<GateName> {
        match self {
            AssignedTo::Iss => Some(GateName::Iss),
            AssignedTo::Hod => Some(GateName::Hod),
            AssignedTo::Qa => Some(GateName::Qa),
            AssignedTo::Completed | AssignedTo::Ongoing | AssignedTo::Rejected => None,
        }
    }
}

impl From<GateName> for AssignedTo {
    fn from(gate: GateName) -> Self {
        match gate {
            GateName::Iss => AssignedTo::Iss,
            GateName::Hod => AssignedTo::Hod,
            GateName::Qa => AssignedTo::Qa,
        }
    }
}

// ── Completion ───────────────────────────────────────────────────────

/// Status of one close-out step of a Permit to Work
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStatus {
    #[default]
    Pending,
    Completed,
}

wire_strings!(CompletionStatus, "completion status", {
    Pending => "Pending",
    Completed => "Completed",
});

/// Which close-out step is being recorded. Only the issuer and QHSSE
/// steps exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStage {
    #[serde(rename = "ISS")]
    Issuer,
    #[serde(rename = "QA")]
    Qhsse,
}

wire_strings!(CompletionStage, "completion stage", {
    Issuer => "ISS",
    Qhsse => "QA",
});

// ── Roles ────────────────────────────────────────────────────────────

/// Organizational role held by a directory identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ISS")]
    Iss,
    #[serde(rename = "HOD")]
    Hod,
    #[serde(rename = "QA")]
    Qa,
    /// Requesters and permit receivers without an approval role
    #[serde(rename = "USER")]
    User,
}

wire_strings!(Role, "role", {
    Iss => "ISS",
    Hod => "HOD",
    Qa => "QA",
    User => "USER",
});

impl Role {
    /// Roles allowed to initiate a revocation
    pub fn may_initiate_revocation(&self) -> bool {
        matches!(self, Role::Iss | Role::Qa)
    }
}

impl From<GateName> for Role {
    fn from(gate: GateName) -> Self {
        match gate {
            GateName::Iss => Role::Iss,
            GateName::Hod => Role::Hod,
            GateName::Qa => Role::Qa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings_parse_after_trimming() {
        assert_eq!(" ISS ".parse::<GateName>().unwrap(), GateName::Iss);
        assert_eq!("ONGOING".parse::<AssignedTo>().unwrap(), AssignedTo::Ongoing);
        assert_eq!(
            "RevocationPending".parse::<PermitStatus>().unwrap(),
            PermitStatus::RevocationPending
        );
    }

    #[test]
    fn test_unknown_gate_is_invalid_argument() {
        let err = "MANAGER".parse::<GateName>().unwrap_err();
        assert!(matches!(err, PermitError::InvalidArgument(_)));
        // matching is exact, not case-insensitive
        assert!("iss".parse::<GateName>().is_err());
    }

    #[test]
    fn test_serde_matches_wire_strings() {
        for assigned in [
            AssignedTo::Iss,
            AssignedTo::Hod,
            AssignedTo::Qa,
            AssignedTo::Completed,
            AssignedTo::Ongoing,
            AssignedTo::Rejected,
        ] {
            let json = serde_json::to_string(&assigned).unwrap();
            assert_eq!(json, format!("\"{}\"", assigned.as_str()));
        }
        let json = serde_json::to_string(&PermitStatus::RevocationPending).unwrap();
        assert_eq!(json, "\"RevocationPending\"");
    }

    #[test]
    fn test_gate_order() {
        assert_eq!(GateName::Iss.next(), Some(GateName::Hod));
        assert_eq!(GateName::Hod.next(), Some(GateName::Qa));
        assert_eq!(GateName::Qa.next(), None);
        assert!(GateName::Iss < GateName::Qa);
        assert_eq!(GateName::Qa.label(), "QHSSE");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(PermitStatus::Rejected.is_terminal());
        assert!(PermitStatus::Revoked.is_terminal());
        assert!(PermitStatus::Completed.is_terminal());
        assert!(!PermitStatus::Approved.is_terminal());
        assert!(!PermitStatus::RevocationPending.is_terminal());
    }

    #[test]
    fn test_revocation_privilege() {
        assert!(Role::Iss.may_initiate_revocation());
        assert!(Role::Qa.may_initiate_revocation());
        assert!(!Role::Hod.may_initiate_revocation());
        assert!(!Role::User.may_initiate_revocation());
    }
}
