//! Permit Notification Routing
//!
//! Every committed permit transition notifies a computed set of
//! stakeholders. This crate decides *who* and *what*, and hands the result
//! to a dispatcher without waiting for delivery.
//!
//! # Architecture
//!
//! - [`routing`]: the declarative stage to recipient-source table
//! - [`NotificationRouter`]: resolves the table against an [`OrgDirectory`]
//!   and builds the [`EventPayload`]
//! - [`RecipientSet`]: identity-deduplicated recipients, first tag wins
//! - [`DispatchQueue`]: background delivery through a
//!   [`NotificationDispatcher`]; failures are logged, never propagated
//!
//! Routing never fails. Directory lookups that error are logged and
//! skipped, and the raw department code stands in for a missing display
//! name. The permit transition that triggered the notification has already
//! committed and stays authoritative.

#![deny(unsafe_code)]

pub mod directory;
pub mod dispatch;
pub mod payload;
pub mod recipients;
pub mod router;
pub mod routing;

pub use directory::{DirectoryError, DirectoryResult, DirectorySeed, InMemoryDirectory, OrgDirectory};
pub use dispatch::{
    DeliveryReceipt, DispatchError, DispatchQueue, DispatchStats, NotificationDispatcher,
    RecordingDispatcher, SentNotification, TracingDispatcher,
};
pub use payload::{next_stage_label, status_label, EventPayload};
pub use recipients::{Recipient, RecipientSet, Relationship};
pub use router::{Notification, NotificationRouter};
pub use routing::{NotificationStage, RecipientSource, RouteRule};
