//! Permit Domain Types
//!
//! Industrial work authorization runs through two linked records:
//!
//! - **Job Permit**: the initial safety documentation for a job.
//! - **Permit to Work**: site-entry authorization, created only against an
//!   approved Job Permit.
//!
//! Both pass the same three sequential approval gates (ISS → HOD → QA),
//! can be revoked subject to a QA decision, and the Permit to Work adds a
//! two-step close-out (issuer completion, then QHSSE completion).
//!
//! # Key Concepts
//!
//! - [`PermitEntity`]: the snapshot the workflow engine operates on.
//! - [`GateName`] / [`GateRecord`]: the three approval checkpoints.
//! - [`AssignedTo`]: the next gate expected to act, or a terminal marker.
//! - [`PermitEvent`]: what a committed transition emits for notification.
//! - [`PermitError`]: the error taxonomy shared by every permit crate.
//!
//! Every enum persisted with a permit keeps its wire string verbatim
//! (`"ISS"`, `"RevocationPending"`, `"ONGOING"`, ...). Existing stored data
//! depends on those strings.

#![deny(unsafe_code)]

mod entity;
mod errors;
mod event;
mod identity;
mod ids;
mod status;

pub use entity::*;
pub use errors::*;
pub use event::*;
pub use identity::*;
pub use ids::*;
pub use status::*;
