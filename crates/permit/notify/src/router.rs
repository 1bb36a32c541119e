//! Notification router: resolves the routing table for one event

use std::sync::Arc;

use permit_engine::gate_table::gate_record;
use permit_types::{Identity, PermitEntity, PermitEvent, Role};
use serde::{Deserialize, Serialize};

use crate::directory::{DirectoryError, OrgDirectory};
use crate::payload::EventPayload;
use crate::recipients::{Recipient, RecipientSet, Relationship};
use crate::routing::{rules_for, NotificationStage, RecipientSource};

/// Who to notify about one event, and with what
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub stage: NotificationStage,
    pub event_kind: String,
    pub recipients: Vec<Recipient>,
    pub payload: EventPayload,
    /// Sources that could not be resolved, for diagnostics
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
}

impl Notification {
    pub fn identities(&self) -> Vec<Identity> {
        self.recipients.iter().map(|r| r.identity.clone()).collect()
    }

    pub fn emails(&self) -> Vec<String> {
        self.recipients
            .iter()
            .map(|r| r.identity.email.clone())
            .collect()
    }
}

/// Computes recipients and payloads from committed events.
///
/// Routing is infallible: every directory failure is logged and the
/// affected source is skipped.
#[derive(Clone)]
pub struct NotificationRouter {
    directory: Arc<dyn OrgDirectory>,
}

impl NotificationRouter {
    pub fn new(directory: Arc<dyn OrgDirectory>) -> Self {
        Self { directory }
    }

    pub fn route(&self, event: &PermitEvent) -> Notification {
        let entity = &event.entity;
        let stage = NotificationStage::for_event(&event.kind);
        let mut recipients = RecipientSet::new();
        let mut unresolved = Vec::new();

        for rule in rules_for(stage) {
            if !rule.applies_to(entity.kind) {
                continue;
            }
            match self.resolve(rule.source, event) {
                Ok(found) => {
                    let (identities, relationship) = found;
                    recipients.extend(identities, relationship);
                }
                Err(err) => {
                    tracing::warn!(
                        permit_id = %entity.id,
                        stage = %stage,
                        source = ?rule.source,
                        error = %err,
                        "Recipient source could not be resolved"
                    );
                    unresolved.push(format!("{:?}: {}", rule.source, err));
                }
            }
        }

        let department_name = self.department_name(entity);
        let payload = EventPayload::build(event, department_name);
        let recipients = recipients.into_vec();

        tracing::debug!(
            permit_id = %entity.id,
            stage = %stage,
            recipients = recipients.len(),
            unresolved = unresolved.len(),
            "Notification routed"
        );

        Notification {
            stage,
            event_kind: event.kind.name().to_string(),
            recipients,
            payload,
            unresolved,
        }
    }

    fn resolve(
        &self,
        source: RecipientSource,
        event: &PermitEvent,
    ) -> Result<(Vec<Identity>, Relationship), DirectoryError> {
        let entity = &event.entity;
        match source {
            RecipientSource::DepartmentRole(role, relationship) => Ok((
                self.directory
                    .role_holders_in_department(role, &entity.department)?,
                relationship,
            )),
            RecipientSource::AllRole(role, relationship) => {
                Ok((self.directory.role_holders(role)?, relationship))
            }
            RecipientSource::GateApprover(gate, relationship) => {
                let approver = gate_record(&entity.gates, gate)
                    .approver_id
                    .as_ref()
                    .ok_or_else(|| {
                        DirectoryError::NotFound(format!("no recorded {} approver", gate))
                    })?;
                Ok((vec![self.directory.identity_by_id(approver)?], relationship))
            }
            RecipientSource::Actor(relationship) => Ok((
                vec![self.directory.identity_by_id(&event.actor.id)?],
                relationship,
            )),
            RecipientSource::Receiver => {
                Ok((self.receiver(entity)?, Relationship::Receiver))
            }
            RecipientSource::Creator => Ok((
                vec![self.directory.identity_by_id(&entity.creator_id)?],
                Relationship::Creator,
            )),
        }
    }

    /// The named receiver: direct email when on file, otherwise a display
    /// name lookup. A permit without a receiver yields nobody.
    fn receiver(&self, entity: &PermitEntity) -> Result<Vec<Identity>, DirectoryError> {
        let name = entity
            .receiver_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let email = entity
            .receiver_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());

        match (email, name) {
            (Some(email), name) => Ok(vec![Identity::new(
                format!("receiver:{}", email.to_ascii_lowercase()),
                name.unwrap_or(email),
                email,
                Role::User,
            )]),
            (None, Some(name)) => Ok(vec![self.directory.identity_by_display_name(name)?]),
            (None, None) => Ok(Vec::new()),
        }
    }

    fn department_name(&self, entity: &PermitEntity) -> String {
        match self.directory.department_display_name(&entity.department) {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => {
                tracing::warn!(
                    permit_id = %entity.id,
                    department = %entity.department,
                    "Department has a blank display name, using its code"
                );
                entity.department.to_string()
            }
            Err(err) => {
                tracing::warn!(
                    permit_id = %entity.id,
                    department = %entity.department,
                    error = %err,
                    "Department name lookup failed, using its code"
                );
                entity.department.to_string()
            }
        }
    }
}

impl std::fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRouter").finish_non_exhaustive()
    }
}
