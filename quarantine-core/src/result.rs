//! Per-invocation result aggregation and the invocation response envelope.

use serde::{Deserialize, Serialize};

use crate::executor::ContainmentOutcome;

/// Status code returned for every invocation; failures are reported in-band.
pub const STATUS_OK: u16 = 200;

/// A contained resource and the snapshots taken from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantinedEntry {
    #[serde(rename = "instanceId")]
    pub resource_id: String,
    #[serde(rename = "snapshots")]
    pub snapshot_ids: Vec<String>,
}

/// An error recorded during an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorRecord {
    /// The finding was refused before containment.
    Rejected {
        #[serde(rename = "findingId")]
        finding_id: String,
        reason: String,
    },
    /// Containment ran and a capability failed.
    Failed {
        #[serde(rename = "instanceId")]
        resource_id: String,
        error: String,
    },
}

/// Counters and records accumulated over one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Findings that passed the decision gate and were acted upon.
    #[serde(rename = "processed")]
    pub processed_count: u32,
    pub quarantined: Vec<QuarantinedEntry>,
    pub errors: Vec<ErrorRecord>,
}

impl InvocationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rejection(&mut self, finding_id: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(ErrorRecord::Rejected {
            finding_id: finding_id.into(),
            reason: reason.into(),
        });
    }

    /// Record a containment attempt, failed or not.
    pub fn record_containment(&mut self, outcome: &ContainmentOutcome) {
        self.processed_count += 1;
        if let Some(error) = &outcome.error_message {
            self.errors.push(ErrorRecord::Failed {
                resource_id: outcome.resource_id.clone(),
                error: error.clone(),
            });
        }
        self.quarantined.push(QuarantinedEntry {
            resource_id: outcome.resource_id.clone(),
            snapshot_ids: outcome.snapshot_ids(),
        });
    }
}

/// What an invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// The event carried no usable finding.
    Skipped { reason: String },
    Completed(InvocationResult),
}

impl Invocation {
    pub fn result(&self) -> Option<&InvocationResult> {
        match self {
            Invocation::Completed(result) => Some(result),
            Invocation::Skipped { .. } => None,
        }
    }

    /// Wrap into the response envelope returned to the host.
    pub fn into_response(self) -> InvocationResponse {
        let body = match &self {
            Invocation::Skipped { reason } => {
                serde_json::to_string(&serde_json::json!({ "skipped": reason }))
            }
            Invocation::Completed(result) => serde_json::to_string(result),
        };
        let body = body.unwrap_or_else(|e| {
            tracing::error!("Failed to serialize invocation result: {}", e);
            "{}".to_string()
        });
        InvocationResponse {
            status_code: STATUS_OK,
            body,
        }
    }
}

/// Response envelope: `{ "statusCode": 200, "body": "<json>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: String,
}
