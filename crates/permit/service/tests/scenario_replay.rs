//! Scenario scripts replayed through the service

use std::sync::Arc;

use permit_notify::{DispatchQueue, InMemoryDirectory};
use permit_service::{PermitService, Scenario, ScenarioRunner};
use permit_storage::InMemoryPermitRepository;

const DIRECTORY: &str = r#"{
    "departments": [{"code": "PROC", "name": "Process"}],
    "people": [
        {"id": "c1", "display_name": "Cara Creator", "email": "cara@plant.example", "role": "USER", "department": "PROC"},
        {"id": "i1", "display_name": "Ivy Issuer", "email": "ivy@plant.example", "role": "ISS", "department": "PROC"},
        {"id": "h1", "display_name": "Hana Head", "email": "hana@plant.example", "role": "HOD", "department": "PROC"},
        {"id": "q1", "display_name": "Quinn QA", "email": "quinn@plant.example", "role": "QA", "department": "QHSSE"}
    ]
}"#;

const SCRIPT: &str = r#"{
    "steps": [
        {"op": "create_job_permit", "as": "c1", "name": "jp", "title": "Line break", "department": "PROC"},
        {"op": "advance_gate", "as": "i1", "permit": "jp", "gate": "ISS", "decision": "Approved"},
        {"op": "advance_gate", "as": "i1", "permit": "jp", "gate": "HOD", "decision": "Approved"},
        {"op": "advance_gate", "as": "h1", "permit": "jp", "gate": "HOD", "decision": "Approved"},
        {"op": "advance_gate", "as": "q1", "permit": "jp", "gate": "QA", "decision": "Approved"},
        {"op": "create_permit_to_work", "as": "c1", "parent": "jp", "name": "ptw", "title": "Line entry",
         "department": "PROC", "hours": 200},
        {"op": "create_permit_to_work", "as": "c1", "parent": "jp", "name": "ptw", "title": "Line entry",
         "department": "PROC", "hours": 8, "receiver_email": "contractor@vendor.example"},
        {"op": "initiate_revocation", "as": "i1", "permit": "ptw", "reason": "not yet approved"},
        {"op": "advance_gate", "as": "q1", "permit": "missing", "gate": "QA", "decision": "Approved"}
    ]
}"#;

#[tokio::test]
async fn test_replay_reports_each_step() {
    let directory = Arc::new(InMemoryDirectory::from_json(DIRECTORY).unwrap());
    let service = Arc::new(PermitService::new(
        Arc::new(InMemoryPermitRepository::new()),
        directory.clone(),
        DispatchQueue::disabled(),
    ));
    let mut runner = ScenarioRunner::new(service.clone(), directory);

    let outcomes = runner.run(&Scenario::from_json(SCRIPT).unwrap()).await;
    let failed: Vec<usize> = outcomes
        .iter()
        .filter(|o| o.error.is_some())
        .map(|o| o.index)
        .collect();

    // ISS acting at HOD, a 200h permit to work, revoking a pending permit,
    // an unknown script name
    assert_eq!(failed, vec![2, 5, 7, 8]);
    assert!(outcomes[2].error.as_deref().unwrap().starts_with("PermissionDenied"));
    assert!(outcomes[5].error.as_deref().unwrap().starts_with("InvalidArgument"));
    assert!(outcomes[8].error.as_deref().unwrap().starts_with("NotFound"));
    assert_eq!(outcomes[4].permits[0].1, "Approved");

    let ptw = runner.permit_id("ptw").cloned().unwrap();
    let stored = service.get(&ptw).await.unwrap();
    assert_eq!(stored.entity.receiver_email.as_deref(), Some("contractor@vendor.example"));
}

#[tokio::test]
async fn test_out_of_range_hours_fail_the_step_and_replay_continues() {
    let script = r#"{
        "steps": [
            {"op": "create_job_permit", "as": "c1", "name": "huge", "title": "Line break",
             "department": "PROC", "hours": 9223372036854775807},
            {"op": "create_job_permit", "as": "c1", "name": "jp", "title": "Line break",
             "department": "PROC", "hours": 8}
        ]
    }"#;
    let directory = Arc::new(InMemoryDirectory::from_json(DIRECTORY).unwrap());
    let service = Arc::new(PermitService::new(
        Arc::new(InMemoryPermitRepository::new()),
        directory.clone(),
        DispatchQueue::disabled(),
    ));
    let mut runner = ScenarioRunner::new(service, directory);

    let outcomes = runner.run(&Scenario::from_json(script).unwrap()).await;

    assert_eq!(outcomes.len(), 2);
    let error = outcomes[0].error.as_deref().unwrap();
    assert!(error.starts_with("InvalidArgument"));
    assert!(error.contains("hours out of range"));
    assert!(runner.permit_id("huge").is_none());
    assert!(outcomes[1].error.is_none());
    assert_eq!(outcomes[1].permits[0].1, "Pending");
}
