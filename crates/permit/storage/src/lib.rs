//! Permit snapshot storage.
//!
//! The repository is the transactional source of truth for permit state.
//! Every write is versioned: concurrent transitions of the same permit
//! never overwrite one another, the later writer gets a retryable
//! [`StorageError::Conflict`] instead.
//!
//! Adapters:
//! - [`memory::InMemoryPermitRepository`] for tests and local runs
//! - `postgres::PostgresPermitRepository` behind the `postgres` feature

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryPermitRepository;
pub use model::{PermitFilter, PermitUpdate, QueryWindow, StoredPermit};
pub use traits::PermitRepository;
