//! Fire-and-forget notification delivery
//!
//! Transitions enqueue routed notifications without waiting. A background
//! worker drains the queue into a [`NotificationDispatcher`]; delivery
//! failures are logged with the permit id, stage and attempted recipients
//! and go no further.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use permit_types::Identity;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::router::Notification;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("dispatcher unavailable: {0}")]
    Unavailable(String),
}

/// Acknowledgement from a dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub accepted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Renders and transmits a notification (email, chat, ...)
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(
        &self,
        recipients: &[Identity],
        event_kind: &str,
        payload: &BTreeMap<String, String>,
    ) -> Result<DeliveryReceipt, DispatchError>;
}

// ── Queue ────────────────────────────────────────────────────────────

/// Counters reported by the worker when the queue shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
    /// Notifications with no recipients
    pub skipped: u64,
}

/// Sending half of the dispatch queue. Cloneable; the worker exits once
/// every clone has been dropped.
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    tx: Option<mpsc::Sender<Notification>>,
}

impl DispatchQueue {
    /// Start the background worker on the current tokio runtime
    pub fn spawn(
        dispatcher: Arc<dyn NotificationDispatcher>,
        capacity: usize,
    ) -> (Self, JoinHandle<DispatchStats>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(dispatcher, rx));
        (Self { tx: Some(tx) }, handle)
    }

    /// A queue that drops everything, for deployments with delivery turned
    /// off
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a notification without waiting. Returns whether it was
    /// accepted; a full or closed queue is logged and the notification is
    /// dropped.
    pub fn enqueue(&self, notification: Notification) -> bool {
        let Some(tx) = &self.tx else {
            tracing::debug!(
                permit_id = %notification.payload.permit_id,
                stage = %notification.stage,
                "Dispatch disabled, notification dropped"
            );
            return false;
        };

        match tx.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    permit_id = %n.payload.permit_id,
                    stage = %n.stage,
                    recipients = ?n.emails(),
                    "Dispatch queue full, notification dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                tracing::warn!(
                    permit_id = %n.payload.permit_id,
                    stage = %n.stage,
                    recipients = ?n.emails(),
                    "Dispatch queue closed, notification dropped"
                );
                false
            }
        }
    }
}

async fn run_worker(
    dispatcher: Arc<dyn NotificationDispatcher>,
    mut rx: mpsc::Receiver<Notification>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();

    while let Some(notification) = rx.recv().await {
        if notification.recipients.is_empty() {
            tracing::warn!(
                permit_id = %notification.payload.permit_id,
                stage = %notification.stage,
                "Notification has no recipients"
            );
            stats.skipped += 1;
            continue;
        }

        let identities = notification.identities();
        let payload = notification.payload.to_map();
        match dispatcher
            .send(&identities, &notification.event_kind, &payload)
            .await
        {
            Ok(receipt) => {
                stats.delivered += 1;
                tracing::debug!(
                    permit_id = %notification.payload.permit_id,
                    stage = %notification.stage,
                    accepted = receipt.accepted,
                    "Notification delivered"
                );
            }
            Err(err) => {
                stats.failed += 1;
                tracing::warn!(
                    permit_id = %notification.payload.permit_id,
                    stage = %notification.stage,
                    recipients = ?notification.emails(),
                    error = %err,
                    "Notification delivery failed"
                );
            }
        }
    }

    tracing::debug!(
        delivered = stats.delivered,
        failed = stats.failed,
        skipped = stats.skipped,
        "Dispatch worker stopped"
    );
    stats
}

// ── Dispatchers ──────────────────────────────────────────────────────

/// Writes each notification to the log instead of sending it
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn send(
        &self,
        recipients: &[Identity],
        event_kind: &str,
        payload: &BTreeMap<String, String>,
    ) -> Result<DeliveryReceipt, DispatchError> {
        let to: Vec<&str> = recipients.iter().map(|r| r.email.as_str()).collect();
        tracing::info!(
            event_kind,
            permit_id = payload.get("permit_id").map(String::as_str).unwrap_or_default(),
            status = payload.get("status_label").map(String::as_str).unwrap_or_default(),
            recipients = ?to,
            "Notification"
        );
        Ok(DeliveryReceipt {
            accepted: recipients.len(),
            message_id: None,
        })
    }
}

/// One call captured by [`RecordingDispatcher`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentNotification {
    pub recipients: Vec<Identity>,
    pub event_kind: String,
    pub payload: BTreeMap<String, String>,
}

impl SentNotification {
    pub fn emails(&self) -> Vec<&str> {
        self.recipients.iter().map(|r| r.email.as_str()).collect()
    }
}

/// Keeps every send in memory. Optionally fails every delivery after
/// recording it.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentNotification>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(
        &self,
        recipients: &[Identity],
        event_kind: &str,
        payload: &BTreeMap<String, String>,
    ) -> Result<DeliveryReceipt, DispatchError> {
        self.sent
            .lock()
            .map_err(|_| DispatchError::Unavailable("recording lock poisoned".into()))?
            .push(SentNotification {
                recipients: recipients.to_vec(),
                event_kind: event_kind.to_string(),
                payload: payload.clone(),
            });

        if self.fail {
            return Err(DispatchError::Unavailable("smtp relay refused connection".into()));
        }
        Ok(DeliveryReceipt {
            accepted: recipients.len(),
            message_id: Some(format!("rec-{}", event_kind)),
        })
    }
}
