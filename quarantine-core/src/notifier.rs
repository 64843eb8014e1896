//! Operator notifications about containment outcomes.

use serde::Serialize;
use std::sync::Arc;

use crate::capability::NotificationPublisher;
use crate::config::ResponsePolicy;
use crate::executor::{ContainmentOutcome, SnapshotRecord};
use crate::finding::Finding;

/// Subject lines longer than this are rejected by the notification transport.
pub const MAX_SUBJECT_CHARS: usize = 100;

const SUBJECT_PREFIX: &str = "GuardDuty auto-response";

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// What happened to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationStatus {
    Published,
    /// No notification target is configured.
    Unconfigured,
    Failed(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationBody<'a> {
    summary: &'static str,
    finding_id: &'a str,
    finding_type: &'a str,
    severity: f64,
    instance_id: &'a str,
    actions: NotificationActions<'a>,
    error: Option<&'a str>,
    dry_run: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationActions<'a> {
    quarantine: &'static str,
    snapshots: &'a [SnapshotRecord],
    #[serde(skip_serializing_if = "no_volumes")]
    skipped_volumes: &'a [String],
}

fn no_volumes(volumes: &&[String]) -> bool {
    volumes.is_empty()
}

/// Render the notification for a containment outcome.
pub fn render(
    finding: &Finding,
    outcome: &ContainmentOutcome,
    dry_run: bool,
) -> Result<Notification, serde_json::Error> {
    let subject = if outcome.isolation_applied {
        format!("{SUBJECT_PREFIX}: {} quarantined", outcome.resource_id)
    } else {
        format!("{SUBJECT_PREFIX} FAILED: {}", outcome.resource_id)
    };

    let body = NotificationBody {
        summary: "GuardDuty automated containment",
        finding_id: &finding.id,
        finding_type: &finding.finding_type,
        severity: finding.severity,
        instance_id: &outcome.resource_id,
        actions: NotificationActions {
            quarantine: if outcome.isolation_applied {
                "applied"
            } else {
                "skipped or failed"
            },
            snapshots: &outcome.snapshots,
            skipped_volumes: &outcome.unsnapshotted_volumes,
        },
        error: outcome.error_message.as_deref(),
        dry_run,
    };

    Ok(Notification {
        subject: truncate_chars(&subject, MAX_SUBJECT_CHARS),
        body: serde_json::to_string_pretty(&body)?,
    })
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Publishes outcome summaries, best-effort.
pub struct Notifier {
    publisher: Arc<dyn NotificationPublisher>,
    target: Option<String>,
    dry_run: bool,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn NotificationPublisher>, policy: &ResponsePolicy) -> Self {
        Self {
            publisher,
            target: policy.notification_target.clone(),
            dry_run: policy.dry_run,
        }
    }

    /// Publish the outcome summary. Failures are logged and reported, never raised.
    pub async fn notify(
        &self,
        finding: &Finding,
        outcome: &ContainmentOutcome,
    ) -> NotificationStatus {
        let Some(target) = &self.target else {
            tracing::debug!("No notification target configured");
            return NotificationStatus::Unconfigured;
        };

        let notification = match render(finding, outcome, self.dry_run) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Failed to render notification for {}: {}", finding.id, e);
                return NotificationStatus::Failed(e.to_string());
            }
        };

        match self
            .publisher
            .publish(target, &notification.subject, &notification.body)
            .await
        {
            Ok(()) => {
                tracing::info!("Notified {}: {}", target, notification.subject);
                NotificationStatus::Published
            }
            Err(e) => {
                tracing::warn!("Failed to publish notification to {}: {}", target, e);
                NotificationStatus::Failed(e.to_string())
            }
        }
    }
}
