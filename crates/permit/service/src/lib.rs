//! Permit Service
//!
//! The caller around the workflow engine. For every action it loads the
//! current permit snapshot, applies the engine transition, persists the
//! result under optimistic versioning and then routes the emitted event to
//! the notification queue. Notification is best-effort; the committed
//! permit state is authoritative.

#![deny(unsafe_code)]

pub mod config;
mod error;
pub mod scenario;
mod service;
pub mod validation;

use std::sync::Arc;

use permit_notify::{
    DispatchQueue, DispatchStats, InMemoryDirectory, NotificationDispatcher,
};
use permit_storage::{InMemoryPermitRepository, PermitRepository};
use tokio::task::JoinHandle;

pub use config::{DispatchConfig, DirectoryConfig, LoggingConfig, ServiceConfig, StorageConfig};
pub use error::{ServiceError, ServiceResult};
pub use scenario::{Scenario, ScenarioRunner, Step, StepOutcome};
pub use service::PermitService;
pub use validation::{validate_draft, MAX_PERMIT_TO_WORK_DAYS};

/// Open the configured repository
pub async fn build_repository(config: &StorageConfig) -> ServiceResult<Arc<dyn PermitRepository>> {
    match config {
        StorageConfig::Memory => {
            tracing::info!("Using in-memory permit storage");
            Ok(Arc::new(InMemoryPermitRepository::new()))
        }
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            tracing::info!(max_connections, "Connecting to PostgreSQL permit storage");
            let repo = permit_storage::postgres::PostgresPermitRepository::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            Ok(Arc::new(repo))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(ServiceError::Config(
            "postgres storage requires the `postgres` feature".to_string(),
        )),
    }
}

/// Load the directory seed file, or an empty directory when none is set
pub fn load_directory(config: &DirectoryConfig) -> ServiceResult<InMemoryDirectory> {
    let Some(path) = config.seed_file.as_deref() else {
        tracing::warn!("No directory seed file configured, notifications will have no recipients");
        return Ok(InMemoryDirectory::new());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| ServiceError::Config(format!("cannot read directory seed {}: {}", path, e)))?;
    let directory = InMemoryDirectory::from_json(&json)
        .map_err(|e| ServiceError::Config(format!("invalid directory seed {}: {}", path, e)))?;
    tracing::info!(path, people = directory.len(), "Directory loaded");
    Ok(directory)
}

/// Start the dispatch worker, or a disabled queue when delivery is off.
/// The handle is `None` for a disabled queue.
pub fn start_dispatch(
    config: &DispatchConfig,
    dispatcher: Arc<dyn NotificationDispatcher>,
) -> (DispatchQueue, Option<JoinHandle<DispatchStats>>) {
    if !config.enabled {
        tracing::info!("Notification dispatch disabled");
        return (DispatchQueue::disabled(), None);
    }
    let (queue, handle) = DispatchQueue::spawn(dispatcher, config.queue_capacity);
    (queue, Some(handle))
}
