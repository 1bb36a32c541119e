//! Lifecycle invariants every reachable permit snapshot satisfies
//!
//! The engine runs [`check_invariants`] on each snapshot it produces and
//! refuses to return one that fails. A failure here is a bug in the engine
//! or corrupted stored data, never a user error.

use crate::gate_table::{first_pending, GATE_FIELDS};
use crate::policy::policy_for;
use permit_types::{
    AssignedTo, CompletionStatus, GateStatus, PermitEntity, PermitError, PermitKind, PermitResult,
    PermitStatus,
};

pub fn check_invariants(entity: &PermitEntity) -> PermitResult<()> {
    check_gate_monotonicity(entity)?;
    check_assignment(entity)?;
    check_revocation(entity)?;
    check_completion(entity)?;
    Ok(())
}

fn violation(entity: &PermitEntity, message: impl std::fmt::Display) -> PermitError {
    PermitError::InvariantViolation(format!("permit {}: {}", entity.id, message))
}

/// A gate may only be decided once every earlier gate is approved.
fn check_gate_monotonicity(entity: &PermitEntity) -> PermitResult<()> {
    let mut blocked_by = None;
    for field in GATE_FIELDS.iter() {
        let status = (field.get)(&entity.gates).status;
        if let Some(earlier) = blocked_by {
            if status != GateStatus::Pending {
                return Err(violation(
                    entity,
                    format!("gate {} decided while gate {} is not approved", field.gate, earlier),
                ));
            }
        } else if status != GateStatus::Approved {
            blocked_by = Some(field.gate);
        }
    }
    Ok(())
}

fn check_assignment(entity: &PermitEntity) -> PermitResult<()> {
    let rejected = GATE_FIELDS
        .iter()
        .find(|field| (field.get)(&entity.gates).status == GateStatus::Rejected);

    if let Some(field) = rejected {
        if entity.status != PermitStatus::Rejected {
            return Err(violation(
                entity,
                format!("gate {} rejected but status is {}", field.gate, entity.status),
            ));
        }
        if !matches!(entity.assigned_to, None | Some(AssignedTo::Rejected)) {
            return Err(violation(entity, "rejected permit still assigned to a gate"));
        }
        return Ok(());
    }

    if entity.status == PermitStatus::Rejected {
        return Err(violation(entity, "status Rejected without a rejected gate"));
    }

    match first_pending(&entity.gates) {
        Some(gate) => {
            if entity.status != PermitStatus::Pending {
                return Err(violation(
                    entity,
                    format!("gate {} pending but status is {}", gate, entity.status),
                ));
            }
            if entity.assigned_to != Some(AssignedTo::from(gate)) {
                return Err(violation(
                    entity,
                    format!(
                        "assigned to {:?} while gate {} is the first pending gate",
                        entity.assigned_to.map(|a| a.as_str()),
                        gate
                    ),
                ));
            }
        }
        None => {
            if entity.status == PermitStatus::Pending {
                return Err(violation(entity, "all gates approved but status is Pending"));
            }
            let expected = match (entity.kind, entity.status) {
                (PermitKind::PermitToWork, PermitStatus::Completed) => AssignedTo::Completed,
                (kind, _) => policy_for(kind).approved_marker(),
            };
            if entity.assigned_to != Some(expected) {
                return Err(violation(
                    entity,
                    format!(
                        "fully approved permit assigned to {:?}, expected {}",
                        entity.assigned_to.map(|a| a.as_str()),
                        expected
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_revocation(entity: &PermitEntity) -> PermitResult<()> {
    match (entity.status, &entity.revocation) {
        (PermitStatus::RevocationPending, Some(revocation)) if revocation.is_pending => Ok(()),
        (PermitStatus::RevocationPending, _) => {
            Err(violation(entity, "RevocationPending without a pending revocation"))
        }
        (PermitStatus::Revoked, Some(revocation)) if !revocation.is_pending => Ok(()),
        (PermitStatus::Revoked, _) => Err(violation(entity, "Revoked without a resolved revocation")),
        (_, Some(_)) => Err(violation(
            entity,
            format!("revocation present while status is {}", entity.status),
        )),
        (_, None) => Ok(()),
    }
}

fn check_completion(entity: &PermitEntity) -> PermitResult<()> {
    let supports = policy_for(entity.kind).supports_completion();
    let completion = match (&entity.completion, supports) {
        (None, false) => {
            if entity.status == PermitStatus::Completed {
                return Err(violation(entity, "job permit cannot reach Completed"));
            }
            return Ok(());
        }
        (Some(_), false) => return Err(violation(entity, "job permit carries a completion record")),
        (None, true) => return Err(violation(entity, "permit to work without a completion record")),
        (Some(completion), true) => completion,
    };

    let issuer_done = completion.issuer_completion == CompletionStatus::Completed;
    let qhsse_done = completion.qhsse_completion == CompletionStatus::Completed;

    if qhsse_done && !issuer_done {
        return Err(violation(entity, "QHSSE completion recorded before issuer completion"));
    }
    if qhsse_done != (entity.status == PermitStatus::Completed) {
        return Err(violation(
            entity,
            format!("QHSSE completion {} with status {}", completion.qhsse_completion, entity.status),
        ));
    }
    let fully_approved = GATE_FIELDS
        .iter()
        .all(|field| (field.get)(&entity.gates).status == GateStatus::Approved);
    if issuer_done && !fully_approved {
        return Err(violation(entity, "issuer completion recorded before final approval"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkflowEngine;
    use chrono::{Duration, Utc};
    use permit_types::{Actor, DateWindow, Decision, PermitDraft, Role};

    fn created() -> PermitEntity {
        let now = Utc::now();
        let draft = PermitDraft::new("Scaffold", "CIVIL", DateWindow::new(now, now + Duration::days(1)));
        WorkflowEngine::new()
            .create_job_permit(draft, &Actor::new("c", "Creator", Role::User))
            .unwrap()
            .entity
    }

    #[test]
    fn test_fresh_permit_is_valid() {
        assert!(check_invariants(&created()).is_ok());
    }

    #[test]
    fn test_hod_decided_before_iss_is_rejected() {
        let mut permit = created();
        permit.gates.hod.status = GateStatus::Approved;
        let err = check_invariants(&permit).unwrap_err();
        assert!(matches!(err, PermitError::InvariantViolation(_)));
    }

    #[test]
    fn test_assignment_must_track_first_pending_gate() {
        let mut permit = created();
        permit.assigned_to = Some(AssignedTo::Hod);
        assert!(check_invariants(&permit).is_err());
    }

    #[test]
    fn test_rejected_gate_forces_rejected_status() {
        let engine = WorkflowEngine::new();
        let permit = created();
        let rejected = engine
            .advance_gate(
                &permit,
                "ISS",
                &Actor::new("i", "Issuer", Role::Iss),
                Decision::Rejected,
                Some("incomplete JSA"),
            )
            .unwrap()
            .entity;
        assert!(check_invariants(&rejected).is_ok());

        let mut broken = rejected;
        broken.status = PermitStatus::Pending;
        assert!(check_invariants(&broken).is_err());
    }

    #[test]
    fn test_job_permit_has_no_completion() {
        let mut permit = created();
        permit.completion = Some(Default::default());
        assert!(check_invariants(&permit).is_err());
    }
}
