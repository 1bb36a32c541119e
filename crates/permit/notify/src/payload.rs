//! Semantic event payload handed to the dispatcher
//!
//! The payload describes what happened. Rendering it into a message is the
//! dispatcher's concern.

use chrono::{DateTime, Utc};
use permit_types::{
    CompletionStage, CompletionStatus, Decision, GateName, PermitEntity, PermitEvent,
    PermitEventKind, PermitStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event_kind: String,
    pub permit_id: String,
    pub permit_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub title: String,
    /// Verbatim wire status
    pub status: String,
    pub status_label: String,
    pub actor_name: String,
    pub actor_role: String,
    pub department: String,
    pub department_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub next_stage_label: String,
    pub occurred_at: DateTime<Utc>,
}

impl EventPayload {
    /// Build the payload for an event. `department_name` is whatever the
    /// router resolved, possibly the raw code.
    pub fn build(event: &PermitEvent, department_name: impl Into<String>) -> Self {
        let entity = &event.entity;
        Self {
            event_kind: event.kind.name().to_string(),
            permit_id: entity.id.to_string(),
            permit_kind: entity.kind.display_name().to_string(),
            parent_id: entity.parent_id.as_ref().map(|p| p.to_string()),
            title: entity.title.clone(),
            status: entity.status.as_str().to_string(),
            status_label: status_label(entity),
            actor_name: event.actor.display_name.clone(),
            actor_role: event.actor.role.as_str().to_string(),
            department: entity.department.as_str().to_string(),
            department_name: department_name.into(),
            comments: event.kind.note().map(str::to_string),
            next_stage_label: next_stage_label(entity, &event.kind).to_string(),
            occurred_at: event.occurred_at,
        }
    }

    /// Flatten into the string map the dispatcher consumes
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("event_kind".into(), self.event_kind.clone());
        map.insert("permit_id".into(), self.permit_id.clone());
        map.insert("permit_kind".into(), self.permit_kind.clone());
        if let Some(parent) = &self.parent_id {
            map.insert("parent_id".into(), parent.clone());
        }
        map.insert("title".into(), self.title.clone());
        map.insert("status".into(), self.status.clone());
        map.insert("status_label".into(), self.status_label.clone());
        map.insert("actor_name".into(), self.actor_name.clone());
        map.insert("actor_role".into(), self.actor_role.clone());
        map.insert("department".into(), self.department.clone());
        map.insert("department_name".into(), self.department_name.clone());
        if let Some(comments) = &self.comments {
            map.insert("comments".into(), comments.clone());
        }
        map.insert("next_stage_label".into(), self.next_stage_label.clone());
        map.insert("occurred_at".into(), self.occurred_at.to_rfc3339());
        map
    }
}

/// Label of the stage that follows this event. `entity` is the snapshot the
/// event produced.
pub fn next_stage_label(entity: &PermitEntity, kind: &PermitEventKind) -> &'static str {
    match kind {
        PermitEventKind::Created => GateName::Iss.label(),
        PermitEventKind::GateResolved {
            decision: Decision::Rejected,
            ..
        } => "Rejected",
        PermitEventKind::GateResolved { gate, .. } => {
            gate.next().map_or("Complete", |next| next.label())
        }
        PermitEventKind::CompletionRecorded { stage, .. } => match stage {
            CompletionStage::Issuer => GateName::Qa.label(),
            CompletionStage::Qhsse => "Complete",
        },
        PermitEventKind::RevocationInitiated { .. } => GateName::Qa.label(),
        PermitEventKind::RevocationResolved {
            decision: Decision::Approved,
            ..
        } => "Revoked",
        PermitEventKind::RevocationResolved { .. } => resumed_stage_label(entity),
    }
}

/// Where a permit restored by a rejected revocation picks up again
fn resumed_stage_label(entity: &PermitEntity) -> &'static str {
    match entity.status {
        PermitStatus::Pending => entity.pending_gate().map_or("Complete", |gate| gate.label()),
        PermitStatus::Approved => match &entity.completion {
            Some(c) if c.issuer_completion != CompletionStatus::Completed => GateName::Iss.label(),
            Some(c) if c.qhsse_completion != CompletionStatus::Completed => GateName::Qa.label(),
            _ => "Complete",
        },
        _ => "Complete",
    }
}

/// Human-readable status of a permit snapshot
pub fn status_label(entity: &PermitEntity) -> String {
    match entity.status {
        PermitStatus::Pending => match entity.pending_gate() {
            Some(gate) => format!("Pending {} Approval", gate.label()),
            None => "Pending".to_string(),
        },
        PermitStatus::Approved => match &entity.completion {
            Some(c) if c.issuer_completion == CompletionStatus::Completed => {
                "Pending QHSSE Completion".to_string()
            }
            Some(_) => "Work Ongoing".to_string(),
            None => "Approved".to_string(),
        },
        PermitStatus::Rejected => "Rejected".to_string(),
        PermitStatus::RevocationPending => "Revocation Pending".to_string(),
        PermitStatus::Revoked => "Revoked".to_string(),
        PermitStatus::Completed => "Completed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use permit_engine::WorkflowEngine;
    use permit_types::{Actor, DateWindow, PermitDraft, Role};

    fn gate_event(gate: GateName, decision: Decision) -> PermitEventKind {
        PermitEventKind::GateResolved {
            gate,
            decision,
            next: None,
            comments: None,
        }
    }

    fn draft() -> PermitDraft {
        let now = Utc::now();
        PermitDraft::new("Hot work on tank 4", "MAINT", DateWindow::new(now, now + Duration::days(2)))
    }

    fn approve_all(engine: &WorkflowEngine, mut permit: PermitEntity) -> PermitEntity {
        for (gate, role) in [("ISS", Role::Iss), ("HOD", Role::Hod), ("QA", Role::Qa)] {
            permit = engine
                .advance_gate(&permit, gate, &Actor::new("a1", "Approver", role), Decision::Approved, None)
                .unwrap()
                .entity;
        }
        permit
    }

    /// Revoke and then keep the permit, returning the resolution event
    fn revoke_and_keep(engine: &WorkflowEngine, permit: &PermitEntity) -> PermitEvent {
        let qa = Actor::new("q1", "Quinn QA", Role::Qa);
        let pending = engine
            .initiate_revocation(permit, &qa, "gas reading high")
            .unwrap()
            .entity;
        engine
            .resolve_revocation(&pending, &qa, Decision::Rejected, Some("reading was faulty"))
            .unwrap()
            .event
    }

    #[test]
    fn test_next_stage_labels_follow_gate_order() {
        let created = WorkflowEngine::new()
            .create_job_permit(draft(), &Actor::new("u1", "Uma User", Role::User))
            .unwrap()
            .entity;
        let label = |kind: PermitEventKind| next_stage_label(&created, &kind);

        assert_eq!(label(PermitEventKind::Created), "ISS");
        assert_eq!(label(gate_event(GateName::Iss, Decision::Approved)), "HOD");
        assert_eq!(label(gate_event(GateName::Hod, Decision::Approved)), "QHSSE");
        assert_eq!(label(gate_event(GateName::Qa, Decision::Approved)), "Complete");
        assert_eq!(label(gate_event(GateName::Hod, Decision::Rejected)), "Rejected");
    }

    #[test]
    fn test_approved_revocation_label() {
        let engine = WorkflowEngine::new();
        let creator = Actor::new("u1", "Uma User", Role::User);
        let jp = approve_all(&engine, engine.create_job_permit(draft(), &creator).unwrap().entity);
        let approved = PermitEventKind::RevocationResolved {
            decision: Decision::Approved,
            comments: None,
        };
        assert_eq!(next_stage_label(&jp, &approved), "Revoked");
    }

    #[test]
    fn test_rejected_revocation_resumes_where_the_permit_left_off() {
        let engine = WorkflowEngine::new();
        let creator = Actor::new("u1", "Uma User", Role::User);
        let jp = approve_all(&engine, engine.create_job_permit(draft(), &creator).unwrap().entity);

        let event = revoke_and_keep(&engine, &jp);
        assert_eq!(EventPayload::build(&event, "Maintenance").next_stage_label, "Complete");

        let ptw = engine.create_permit_to_work(draft(), &jp, &creator).unwrap().entity;
        let ptw = approve_all(&engine, ptw);
        let event = revoke_and_keep(&engine, &ptw);
        assert_eq!(event.entity.status, PermitStatus::Approved);
        assert_eq!(EventPayload::build(&event, "Maintenance").next_stage_label, "ISS");

        let issuer_done = engine
            .complete_stage(&ptw, "ISS", &Actor::new("i1", "Ivy Issuer", Role::Iss), None)
            .unwrap()
            .entity;
        let event = revoke_and_keep(&engine, &issuer_done);
        assert_eq!(EventPayload::build(&event, "Maintenance").next_stage_label, "QHSSE");
    }

    #[test]
    fn test_payload_from_created_event() {
        let transition = WorkflowEngine::new()
            .create_job_permit(draft(), &Actor::new("u1", "Uma User", Role::User))
            .unwrap();

        let payload = EventPayload::build(&transition.event, "Maintenance");
        assert_eq!(payload.event_kind, "permit_created");
        assert_eq!(payload.status, "Pending");
        assert_eq!(payload.status_label, "Pending ISS Approval");
        assert_eq!(payload.next_stage_label, "ISS");
        assert_eq!(payload.actor_name, "Uma User");
        assert!(payload.comments.is_none());

        let map = payload.to_map();
        assert_eq!(map["department_name"], "Maintenance");
        assert!(!map.contains_key("parent_id"));
        assert!(!map.contains_key("comments"));
    }
}
