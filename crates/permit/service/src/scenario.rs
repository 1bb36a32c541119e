//! Scripted replay of workflow actions
//!
//! A scenario is a JSON list of steps. Each step names the acting person by
//! directory id and refers to permits by script-local names, so a script
//! never needs to know generated permit ids.
//!
//! ```json
//! { "steps": [
//!   { "op": "create_job_permit", "as": "c1", "name": "jp", "title": "Pump overhaul", "department": "MAINT" },
//!   { "op": "advance_gate", "as": "i1", "permit": "jp", "gate": "ISS", "decision": "Approved" }
//! ] }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use permit_notify::OrgDirectory;
use permit_types::{
    Actor, DateWindow, Decision, PermitDraft, PermitError, PermitId, PermitResult, UserId,
};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::service::PermitService;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Fields shared by both creation steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSpec {
    /// Script-local name for the new permit
    pub name: String,
    pub title: String,
    pub department: String,
    /// Defaults to the time of replay
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default = "default_hours")]
    pub hours: i64,
    #[serde(default)]
    pub receiver_name: Option<String>,
    #[serde(default)]
    pub receiver_email: Option<String>,
}

fn default_hours() -> i64 {
    24
}

impl DraftSpec {
    fn to_draft(&self, now: DateTime<Utc>) -> PermitResult<PermitDraft> {
        let start = self.start.unwrap_or(now);
        let end = TimeDelta::try_hours(self.hours)
            .and_then(|span| start.checked_add_signed(span))
            .ok_or_else(|| {
                PermitError::InvalidArgument(format!("hours out of range: {}", self.hours))
            })?;
        let mut draft = PermitDraft::new(
            self.title.clone(),
            self.department.clone(),
            DateWindow::new(start, end),
        );
        draft.receiver_name = self.receiver_name.clone();
        draft.receiver_email = self.receiver_email.clone();
        Ok(draft)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateJobPermit {
        #[serde(rename = "as")]
        actor: String,
        #[serde(flatten)]
        draft: DraftSpec,
    },
    CreatePermitToWork {
        #[serde(rename = "as")]
        actor: String,
        parent: String,
        #[serde(flatten)]
        draft: DraftSpec,
    },
    AdvanceGate {
        #[serde(rename = "as")]
        actor: String,
        permit: String,
        gate: String,
        decision: Decision,
        #[serde(default)]
        comments: Option<String>,
    },
    InitiateRevocation {
        #[serde(rename = "as")]
        actor: String,
        permit: String,
        reason: String,
    },
    ResolveRevocation {
        #[serde(rename = "as")]
        actor: String,
        permits: Vec<String>,
        decision: Decision,
        #[serde(default)]
        comments: Option<String>,
    },
    CompleteStage {
        #[serde(rename = "as")]
        actor: String,
        permit: String,
        stage: String,
        #[serde(default)]
        remarks: Option<String>,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::CreateJobPermit { .. } => "create_job_permit",
            Step::CreatePermitToWork { .. } => "create_permit_to_work",
            Step::AdvanceGate { .. } => "advance_gate",
            Step::InitiateRevocation { .. } => "initiate_revocation",
            Step::ResolveRevocation { .. } => "resolve_revocation",
            Step::CompleteStage { .. } => "complete_stage",
        }
    }

    fn actor_id(&self) -> &str {
        match self {
            Step::CreateJobPermit { actor, .. }
            | Step::CreatePermitToWork { actor, .. }
            | Step::AdvanceGate { actor, .. }
            | Step::InitiateRevocation { actor, .. }
            | Step::ResolveRevocation { actor, .. }
            | Step::CompleteStage { actor, .. } => actor,
        }
    }
}

/// Result of one replayed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: String,
    /// Permit ids touched by the step, with their resulting status
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permits: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Replays scenarios against a service. Failing steps are reported and the
/// replay moves on.
pub struct ScenarioRunner {
    service: Arc<PermitService>,
    directory: Arc<dyn OrgDirectory>,
    names: HashMap<String, PermitId>,
}

impl ScenarioRunner {
    pub fn new(service: Arc<PermitService>, directory: Arc<dyn OrgDirectory>) -> Self {
        Self {
            service,
            directory,
            names: HashMap::new(),
        }
    }

    /// Permit id bound to a script name
    pub fn permit_id(&self, name: &str) -> Option<&PermitId> {
        self.names.get(name)
    }

    pub async fn run(&mut self, scenario: &Scenario) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let outcome = match self.run_step(step).await {
                Ok(permits) => StepOutcome {
                    index,
                    op: step.op().to_string(),
                    permits,
                    error: None,
                },
                Err(err) => {
                    tracing::warn!(step = index, op = step.op(), error = %err, "Scenario step failed");
                    StepOutcome {
                        index,
                        op: step.op().to_string(),
                        permits: Vec::new(),
                        error: Some(format!("{:?}: {}", err.kind(), err)),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_step(&mut self, step: &Step) -> ServiceResult<Vec<(String, String)>> {
        let actor = self.actor(step.actor_id())?;
        let stored = match step {
            Step::CreateJobPermit { draft, .. } => {
                let stored = self
                    .service
                    .create_job_permit(draft.to_draft(Utc::now())?, &actor)
                    .await?;
                self.names.insert(draft.name.clone(), stored.entity.id.clone());
                vec![stored]
            }
            Step::CreatePermitToWork { parent, draft, .. } => {
                let parent_id = self.lookup(parent)?;
                let stored = self
                    .service
                    .create_permit_to_work(&parent_id, draft.to_draft(Utc::now())?, &actor)
                    .await?;
                self.names.insert(draft.name.clone(), stored.entity.id.clone());
                vec![stored]
            }
            Step::AdvanceGate {
                permit,
                gate,
                decision,
                comments,
                ..
            } => {
                let id = self.lookup(permit)?;
                vec![
                    self.service
                        .advance_gate(&id, gate, &actor, *decision, comments.as_deref())
                        .await?,
                ]
            }
            Step::InitiateRevocation { permit, reason, .. } => {
                let id = self.lookup(permit)?;
                vec![self.service.initiate_revocation(&id, &actor, reason).await?]
            }
            Step::ResolveRevocation {
                permits,
                decision,
                comments,
                ..
            } => {
                let ids = permits
                    .iter()
                    .map(|p| self.lookup(p))
                    .collect::<ServiceResult<Vec<_>>>()?;
                self.service
                    .resolve_revocation_batch(&ids, &actor, *decision, comments.as_deref())
                    .await?
            }
            Step::CompleteStage {
                permit,
                stage,
                remarks,
                ..
            } => {
                let id = self.lookup(permit)?;
                vec![
                    self.service
                        .complete_stage(&id, stage, &actor, remarks.as_deref())
                        .await?,
                ]
            }
        };

        Ok(stored
            .into_iter()
            .map(|s| (s.entity.id.to_string(), s.entity.status.to_string()))
            .collect())
    }

    fn actor(&self, id: &str) -> ServiceResult<Actor> {
        self.directory
            .identity_by_id(&UserId::new(id))
            .map(|identity| Actor::from(&identity))
            .map_err(|e| ServiceError::Permit(PermitError::NotFound(e.to_string())))
    }

    fn lookup(&self, name: &str) -> ServiceResult<PermitId> {
        self.names.get(name).cloned().ok_or_else(|| {
            ServiceError::Permit(PermitError::NotFound(format!(
                "no permit named '{}' in this scenario",
                name
            )))
        })
    }
}
