//! In-memory backends for rehearsal runs and tests.
//!
//! [`SimulatedCompute`] keeps an instance → volumes inventory, records every
//! call it receives, and can be told to fail specific operations.
//! [`RecordingPublisher`] keeps every notification it is asked to publish.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::capability::{ComputeApi, NotificationPublisher, SnapshotRequest};
use crate::error::{CapabilityError, ConfigError};

/// A call received by [`SimulatedCompute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ComputeCall {
    ReplaceSecurityGroups {
        instance_id: String,
        group_ids: Vec<String>,
        dry_run: bool,
    },
    DescribeInstanceVolumes {
        instance_id: String,
    },
    CreateSnapshot {
        request: SnapshotRequest,
        snapshot_id: Option<String>,
    },
}

impl ComputeCall {
    /// Whether the call changed (or tried to change) cloud state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, ComputeCall::DescribeInstanceVolumes { .. })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated compute API backed by an in-memory inventory.
#[derive(Default)]
pub struct SimulatedCompute {
    inventory: HashMap<String, Vec<String>>,
    groups: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<ComputeCall>>,
    isolation_failure: Option<String>,
    describe_failure: Option<String>,
    snapshot_failures: HashMap<String, String>,
    omit_snapshot_ids: bool,
}

impl SimulatedCompute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance with the given attached volumes.
    pub fn with_instance<I, S>(mut self, instance_id: impl Into<String>, volumes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inventory.insert(
            instance_id.into(),
            volumes.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Load an inventory from a JSON object mapping instance ids to volume id lists.
    pub fn from_inventory_file(path: &Path) -> Result<Self, ConfigError> {
        let inventory_error = |message: String| ConfigError::Inventory {
            path: path.display().to_string(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| inventory_error(e.to_string()))?;
        let inventory: HashMap<String, Vec<String>> =
            serde_json::from_str(&content).map_err(|e| inventory_error(e.to_string()))?;
        Ok(Self {
            inventory,
            ..Self::default()
        })
    }

    /// Make every isolation request fail with `message`.
    pub fn fail_isolation(mut self, message: impl Into<String>) -> Self {
        self.isolation_failure = Some(message.into());
        self
    }

    /// Make every volume lookup fail with `message`.
    pub fn fail_describe(mut self, message: impl Into<String>) -> Self {
        self.describe_failure = Some(message.into());
        self
    }

    /// Make snapshots of `volume_id` fail with `message`.
    pub fn fail_snapshot(mut self, volume_id: impl Into<String>, message: impl Into<String>) -> Self {
        self.snapshot_failures
            .insert(volume_id.into(), message.into());
        self
    }

    /// Report snapshots as started without an identifier.
    pub fn without_snapshot_ids(mut self) -> Self {
        self.omit_snapshot_ids = true;
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<ComputeCall> {
        lock(&self.calls).clone()
    }

    /// Calls that changed or tried to change cloud state.
    pub fn mutating_calls(&self) -> Vec<ComputeCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.is_mutating())
            .cloned()
            .collect()
    }

    /// Current security groups of `instance_id`, if they were ever replaced.
    pub fn security_groups(&self, instance_id: &str) -> Option<Vec<String>> {
        lock(&self.groups).get(instance_id).cloned()
    }

    fn record(&self, call: ComputeCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl ComputeApi for SimulatedCompute {
    async fn replace_security_groups(
        &self,
        instance_id: &str,
        group_ids: &[String],
        dry_run: bool,
    ) -> Result<(), CapabilityError> {
        self.record(ComputeCall::ReplaceSecurityGroups {
            instance_id: instance_id.to_string(),
            group_ids: group_ids.to_vec(),
            dry_run,
        });
        if let Some(message) = &self.isolation_failure {
            return Err(CapabilityError::rejected("ModifyInstanceAttribute", message.clone()));
        }
        if !self.inventory.contains_key(instance_id) {
            return Err(CapabilityError::rejected(
                "ModifyInstanceAttribute",
                format!("instance {instance_id} does not exist"),
            ));
        }
        if dry_run {
            tracing::info!("[simulated] Would set groups of {} to {:?}", instance_id, group_ids);
            return Ok(());
        }
        tracing::info!("[simulated] Set groups of {} to {:?}", instance_id, group_ids);
        lock(&self.groups).insert(instance_id.to_string(), group_ids.to_vec());
        Ok(())
    }

    async fn describe_instance_volumes(
        &self,
        instance_id: &str,
    ) -> Result<Option<Vec<String>>, CapabilityError> {
        self.record(ComputeCall::DescribeInstanceVolumes {
            instance_id: instance_id.to_string(),
        });
        if let Some(message) = &self.describe_failure {
            return Err(CapabilityError::transport("DescribeInstances", message.clone()));
        }
        Ok(self.inventory.get(instance_id).cloned())
    }

    async fn create_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> Result<Option<String>, CapabilityError> {
        if let Some(message) = self.snapshot_failures.get(&request.volume_id) {
            self.record(ComputeCall::CreateSnapshot {
                request: request.clone(),
                snapshot_id: None,
            });
            return Err(CapabilityError::rejected("CreateSnapshot", message.clone()));
        }
        let snapshot_id = if self.omit_snapshot_ids {
            None
        } else {
            let hex = Uuid::new_v4().simple().to_string();
            Some(format!("snap-{}", &hex[..17]))
        };
        tracing::info!(
            "[simulated] Snapshot of {} started: {}",
            request.volume_id,
            snapshot_id.as_deref().unwrap_or("(no id)")
        );
        self.record(ComputeCall::CreateSnapshot {
            request: request.clone(),
            snapshot_id: snapshot_id.clone(),
        });
        Ok(snapshot_id)
    }
}

/// A notification captured by [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedNotification {
    pub target: String,
    pub subject: String,
    pub body: String,
}

/// Publisher that keeps every notification in memory.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishedNotification>>,
    failure: Option<String>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail with `message` (attempts are still recorded).
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    pub fn published(&self) -> Vec<PublishedNotification> {
        lock(&self.published).clone()
    }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(
        &self,
        target: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), CapabilityError> {
        lock(&self.published).push(PublishedNotification {
            target: target.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        match &self.failure {
            Some(message) => Err(CapabilityError::transport("Publish", message.clone())),
            None => Ok(()),
        }
    }
}
