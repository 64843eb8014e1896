//! Containment executor: network isolation followed by forensic snapshots.
//!
//! Both steps share one failure scope: the first capability failure ends the
//! attempt, its message lands in [`ContainmentOutcome::error_message`], and
//! whatever was already achieved stays in the outcome. There is no retry.
//!
//! Snapshotting is all-or-nothing per attempt. When a volume fails, the loop
//! stops and that volume plus every volume after it are listed in
//! [`ContainmentOutcome::unsnapshotted_volumes`], so operators can see exactly
//! which disks still need a manual snapshot.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::capability::{ComputeApi, SnapshotRequest};
use crate::config::ResponsePolicy;
use crate::error::ContainmentError;

/// Recorded when the snapshot API starts a snapshot without reporting its id.
pub const PENDING_SNAPSHOT_ID: &str = "pending";

/// A forensic snapshot taken from one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(rename = "VolumeId")]
    pub volume_id: String,
    #[serde(rename = "SnapshotId")]
    pub snapshot_id: String,
}

/// What a containment attempt achieved.
///
/// In dry-run mode `isolation_applied` means "would isolate"; read it together
/// with the policy's `dry_run` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainmentOutcome {
    pub resource_id: String,
    pub isolation_applied: bool,
    pub snapshots: Vec<SnapshotRecord>,
    pub error_message: Option<String>,
    /// Volumes left without a snapshot because the snapshot loop aborted.
    pub unsnapshotted_volumes: Vec<String>,
}

impl ContainmentOutcome {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            isolation_applied: false,
            snapshots: Vec::new(),
            error_message: None,
            unsnapshotted_volumes: Vec::new(),
        }
    }

    pub fn snapshot_ids(&self) -> Vec<String> {
        self.snapshots.iter().map(|s| s.snapshot_id.clone()).collect()
    }

    pub fn succeeded(&self) -> bool {
        self.error_message.is_none()
    }
}

/// Runs isolation and snapshotting against the compute API.
pub struct ContainmentExecutor {
    compute: Arc<dyn ComputeApi>,
    quarantine_group_id: Option<String>,
    dry_run: bool,
}

impl ContainmentExecutor {
    pub fn new(compute: Arc<dyn ComputeApi>, policy: &ResponsePolicy) -> Self {
        Self {
            compute,
            quarantine_group_id: policy.quarantine_group_id.clone(),
            dry_run: policy.dry_run,
        }
    }

    /// Contain `resource_id`. Never fails; failures are reported in the outcome.
    pub async fn contain(&self, resource_id: &str) -> ContainmentOutcome {
        let mut outcome = ContainmentOutcome::new(resource_id);
        if let Err(e) = self.run(resource_id, &mut outcome).await {
            tracing::warn!("Containment of {} failed: {}", resource_id, e);
            outcome.error_message = Some(e.to_string());
        }
        outcome
    }

    async fn run(
        &self,
        resource_id: &str,
        outcome: &mut ContainmentOutcome,
    ) -> Result<(), ContainmentError> {
        outcome.isolation_applied = self.isolate(resource_id).await?;
        self.snapshot_volumes(resource_id, outcome).await
    }

    async fn isolate(&self, resource_id: &str) -> Result<bool, ContainmentError> {
        let Some(group_id) = &self.quarantine_group_id else {
            tracing::warn!(
                "No quarantine group configured, leaving {} reachable",
                resource_id
            );
            return Ok(false);
        };
        if self.dry_run {
            tracing::info!("[DRY RUN] Would isolate {} into {}", resource_id, group_id);
            return Ok(true);
        }

        self.compute
            .replace_security_groups(resource_id, std::slice::from_ref(group_id), false)
            .await
            .map_err(|source| ContainmentError::Isolation {
                instance_id: resource_id.to_string(),
                source,
            })?;
        tracing::info!("Isolated {} into {}", resource_id, group_id);
        Ok(true)
    }

    async fn snapshot_volumes(
        &self,
        resource_id: &str,
        outcome: &mut ContainmentOutcome,
    ) -> Result<(), ContainmentError> {
        if self.dry_run {
            tracing::info!("[DRY RUN] Skipping forensic snapshots of {}", resource_id);
            return Ok(());
        }

        let volumes = self
            .compute
            .describe_instance_volumes(resource_id)
            .await
            .map_err(|source| ContainmentError::Describe {
                instance_id: resource_id.to_string(),
                source,
            })?;
        let volumes = match volumes {
            Some(volumes) if !volumes.is_empty() => volumes,
            Some(_) => {
                tracing::info!("{} has no attached volumes to snapshot", resource_id);
                return Ok(());
            }
            None => {
                tracing::warn!("{} not found, no snapshots taken", resource_id);
                return Ok(());
            }
        };

        for (index, volume_id) in volumes.iter().enumerate() {
            let request = SnapshotRequest::forensic(volume_id, resource_id);
            match self.compute.create_snapshot(&request).await {
                Ok(snapshot_id) => {
                    let snapshot_id =
                        snapshot_id.unwrap_or_else(|| PENDING_SNAPSHOT_ID.to_string());
                    tracing::info!("Snapshot {} started for {}", snapshot_id, volume_id);
                    outcome.snapshots.push(SnapshotRecord {
                        volume_id: volume_id.clone(),
                        snapshot_id,
                    });
                }
                Err(source) => {
                    outcome.unsnapshotted_volumes = volumes[index..].to_vec();
                    return Err(ContainmentError::Snapshot {
                        volume_id: volume_id.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}
