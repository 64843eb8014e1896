//! Quarantine Core: automated containment for compute-instance security findings.
//!
//! Given one finding event, the responder decides whether to isolate the
//! referenced instance, snapshots its volumes for forensics, and notifies
//! operators:
//!
//! - **Extraction:** typed, lenient parsing of the raw event into a [`Finding`]
//! - **Decision:** severity threshold and target checks ([`DecisionGate`])
//! - **Containment:** isolation and snapshots with partial-failure reporting
//!   ([`ContainmentExecutor`])
//! - **Notification:** best-effort outcome summaries ([`Notifier`])
//! - **Aggregation:** the in-band [`InvocationResult`]
//!
//! Cloud and notification access go through the [`ComputeApi`] and
//! [`NotificationPublisher`] traits.

pub mod capability;
pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod finding;
pub mod notifier;
pub mod publisher;
pub mod responder;
pub mod result;
pub mod simulated;

// Re-exports for convenience
pub use capability::{ComputeApi, NotificationPublisher, SnapshotRequest, Tag};
pub use config::ResponsePolicy;
pub use decision::{Decision, DecisionGate};
pub use error::{CapabilityError, ConfigError, ContainmentError};
pub use executor::{ContainmentExecutor, ContainmentOutcome, SnapshotRecord};
pub use finding::Finding;
pub use notifier::{Notification, NotificationStatus, Notifier};
pub use publisher::{LogPublisher, RealWebhookHttp, WebhookHttpClient, WebhookPublisher, WebhookReply};
pub use responder::Responder;
pub use result::{ErrorRecord, Invocation, InvocationResponse, InvocationResult, QuarantinedEntry};
pub use simulated::{RecordingPublisher, SimulatedCompute};
