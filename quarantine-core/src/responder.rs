//! The response pipeline: extract → gate → contain → notify → aggregate.
//!
//! One finding per invocation, each stage awaited to completion before the
//! next starts. Nothing escapes [`Responder::handle`]; every invocation ends
//! in a well-formed [`InvocationResponse`].

use std::sync::Arc;
use tracing::Instrument;

use crate::capability::{ComputeApi, NotificationPublisher};
use crate::config::ResponsePolicy;
use crate::decision::{Decision, DecisionGate};
use crate::executor::{ContainmentExecutor, ContainmentOutcome};
use crate::finding::Finding;
use crate::notifier::{NotificationStatus, Notifier};
use crate::result::{Invocation, InvocationResponse, InvocationResult};

/// Reason reported when an event carries no usable finding.
pub const NO_FINDING_REASON: &str = "no GuardDuty finding in event";

/// Automated containment responder for one finding at a time.
pub struct Responder {
    policy: ResponsePolicy,
    gate: DecisionGate,
    executor: ContainmentExecutor,
    notifier: Notifier,
}

impl Responder {
    pub fn new(
        policy: ResponsePolicy,
        compute: Arc<dyn ComputeApi>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            gate: DecisionGate::new(&policy),
            executor: ContainmentExecutor::new(compute, &policy),
            notifier: Notifier::new(publisher, &policy),
            policy,
        }
    }

    /// Handle one raw event and return the host response.
    pub async fn handle(&self, event: &serde_json::Value) -> InvocationResponse {
        self.process(event).await.into_response()
    }

    /// Handle one raw event.
    pub async fn process(&self, event: &serde_json::Value) -> Invocation {
        let Some(finding) = Finding::from_event(event) else {
            tracing::info!("Skipping event: {}", NO_FINDING_REASON);
            return Invocation::Skipped {
                reason: NO_FINDING_REASON.to_string(),
            };
        };

        let span = tracing::info_span!(
            "finding",
            id = %finding.id,
            severity = finding.severity,
            dry_run = self.policy.dry_run
        );
        let result = self.respond(&finding).instrument(span).await;
        Invocation::Completed(result)
    }

    async fn respond(&self, finding: &Finding) -> InvocationResult {
        let mut result = InvocationResult::new();

        match self.gate.evaluate(finding) {
            Decision::Skip { reason } => {
                tracing::debug!("Ignoring finding {}: {}", finding.id, reason);
            }
            Decision::Reject { reason } => {
                tracing::warn!("Rejecting finding {}: {}", finding.id, reason);
                result.record_rejection(&finding.id, reason);
            }
            Decision::Proceed { resource_id } => {
                tracing::info!(
                    "Containing {} for {} finding {}",
                    resource_id,
                    finding.finding_type,
                    finding.id
                );
                let outcome = self.executor.contain(&resource_id).await;
                self.report(finding, &outcome).await;
                result.record_containment(&outcome);
            }
        }

        result
    }

    async fn report(&self, finding: &Finding, outcome: &ContainmentOutcome) {
        match self.notifier.notify(finding, outcome).await {
            NotificationStatus::Published | NotificationStatus::Unconfigured => {}
            NotificationStatus::Failed(e) => {
                tracing::warn!(
                    "Operators were not notified about {}: {}",
                    outcome.resource_id,
                    e
                );
            }
        }
    }
}
