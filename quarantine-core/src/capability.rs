//! Capabilities the responder consumes from the outside world.
//!
//! Cloud access and notification delivery sit behind these traits so the
//! pipeline can be driven by a real SDK, the simulated backend, or a test double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// Tag key marking snapshots taken by the responder.
pub const FORENSIC_TAG_KEY: &str = "GuardDutyQuarantine";
/// Tag key naming the instance a snapshot was taken from.
pub const SOURCE_INSTANCE_TAG_KEY: &str = "SourceInstance";

/// A key/value resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Parameters for a single forensic snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub volume_id: String,
    pub description: String,
    /// Resource type the tags apply to (always `snapshot`).
    pub tag_resource_type: String,
    pub tags: Vec<Tag>,
}

impl SnapshotRequest {
    /// Build the forensic snapshot request for `volume_id` of `instance_id`.
    pub fn forensic(volume_id: impl Into<String>, instance_id: &str) -> Self {
        Self {
            volume_id: volume_id.into(),
            description: format!("GuardDuty quarantine forensics - instance {instance_id}"),
            tag_resource_type: "snapshot".to_string(),
            tags: vec![
                Tag::new(FORENSIC_TAG_KEY, "true"),
                Tag::new(SOURCE_INSTANCE_TAG_KEY, instance_id),
            ],
        }
    }
}

/// Compute-side operations used during containment.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Replace every security group of `instance_id` with `group_ids`.
    ///
    /// Reapplying the same list is a no-op at the instance level.
    async fn replace_security_groups(
        &self,
        instance_id: &str,
        group_ids: &[String],
        dry_run: bool,
    ) -> Result<(), CapabilityError>;

    /// List the block-storage volumes attached to `instance_id`, in attachment order.
    ///
    /// Returns `Ok(None)` when the instance does not exist.
    async fn describe_instance_volumes(
        &self,
        instance_id: &str,
    ) -> Result<Option<Vec<String>>, CapabilityError>;

    /// Start a snapshot and return its identifier, if the API reported one.
    async fn create_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> Result<Option<String>, CapabilityError>;
}

/// Delivery of operator notifications.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, target: &str, subject: &str, body: &str)
    -> Result<(), CapabilityError>;
}
