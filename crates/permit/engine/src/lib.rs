//! Permit Workflow Engine
//!
//! The engine encodes the finite-state machine shared by Job Permits and
//! Permits to Work: sequential gate approval (ISS → HOD → QA), rejection,
//! revocation with a QA decision, and the Permit to Work close-out.
//!
//! # Key Principle
//!
//! **The engine decides, it never stores or notifies.**
//!
//! Every operation takes a snapshot plus an action and returns either the
//! next snapshot with the event it emits, or an error. Loading, persisting
//! and dispatching notifications belong to the caller.
//!
//! # Architecture
//!
//! - [`WorkflowEngine`]: the transition operations
//! - [`gate_table`]: typed map from gate name to the gate record it updates
//! - [`VariantPolicy`]: what differs between Job Permit and Permit to Work
//! - [`check_invariants`]: lifecycle invariants, verified on every snapshot
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use permit_engine::WorkflowEngine;
//! use permit_types::*;
//!
//! let engine = WorkflowEngine::new();
//! let creator = Actor::new("u-1", "Requester", Role::User);
//! let now = Utc::now();
//! let draft = PermitDraft::new(
//!     "Hot work on line 3",
//!     "MAINT",
//!     DateWindow::new(now, now + Duration::days(3)),
//! );
//!
//! let created = engine.create_job_permit(draft, &creator).unwrap();
//! assert_eq!(created.entity.assigned_to, Some(AssignedTo::Iss));
//!
//! let issuer = Actor::new("u-2", "Issuer", Role::Iss);
//! let next = engine
//!     .advance_gate(&created.entity, "ISS", &issuer, Decision::Approved, None)
//!     .unwrap();
//! assert_eq!(next.entity.assigned_to, Some(AssignedTo::Hod));
//! ```

#![deny(unsafe_code)]

pub mod engine;
pub mod gate_table;
pub mod invariants;
pub mod policy;

pub use engine::{Transition, WorkflowEngine};
pub use gate_table::{gate_field, GateField, GATE_FIELDS};
pub use invariants::check_invariants;
pub use policy::{policy_for, JobPermitPolicy, PermitToWorkPolicy, VariantPolicy};
