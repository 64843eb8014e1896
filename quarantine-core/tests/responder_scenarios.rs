//! End-to-end tests for the response pipeline.
//!
//! These drive `Responder` with the simulated compute backend and a recording
//! publisher, checking capability calls, notifications and the in-band result.

use pretty_assertions::assert_eq;
use quarantine_core::simulated::ComputeCall;
use quarantine_core::{
    ErrorRecord, Invocation, InvocationResult, RecordingPublisher, Responder, ResponsePolicy,
    SimulatedCompute,
};
use serde_json::json;
use std::sync::Arc;

const TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:guardduty-response";

fn finding_event(severity: serde_json::Value) -> serde_json::Value {
    json!({
        "version": "0",
        "detail-type": "GuardDuty Finding",
        "source": "aws.guardduty",
        "detail": {
            "id": "f1",
            "type": "Trojan",
            "severity": severity,
            "resource": { "instanceDetails": { "instanceId": "i-1" } }
        }
    })
}

fn policy() -> ResponsePolicy {
    ResponsePolicy::default()
        .with_quarantine_group("sg-q")
        .with_notification_target(TOPIC)
}

struct Harness {
    compute: Arc<SimulatedCompute>,
    publisher: Arc<RecordingPublisher>,
    responder: Responder,
}

fn harness(policy: ResponsePolicy, compute: SimulatedCompute) -> Harness {
    harness_with_publisher(policy, compute, RecordingPublisher::new())
}

fn harness_with_publisher(
    policy: ResponsePolicy,
    compute: SimulatedCompute,
    publisher: RecordingPublisher,
) -> Harness {
    let compute = Arc::new(compute);
    let publisher = Arc::new(publisher);
    let responder = Responder::new(policy, compute.clone(), publisher.clone());
    Harness {
        compute,
        publisher,
        responder,
    }
}

fn completed(invocation: Invocation) -> InvocationResult {
    match invocation {
        Invocation::Completed(result) => result,
        other => panic!("expected a completed invocation, got {other:?}"),
    }
}

fn instance_with_two_volumes() -> SimulatedCompute {
    SimulatedCompute::new().with_instance("i-1", ["vol-a", "vol-b"])
}

#[tokio::test]
async fn test_quarantines_high_severity_finding() {
    let h = harness(policy(), instance_with_two_volumes());

    let result = completed(h.responder.process(&finding_event(json!(8))).await);

    assert_eq!(result.processed_count, 1);
    assert!(result.errors.is_empty());
    assert_eq!(result.quarantined.len(), 1);
    assert_eq!(result.quarantined[0].resource_id, "i-1");
    assert_eq!(result.quarantined[0].snapshot_ids.len(), 2);

    assert_eq!(h.compute.security_groups("i-1"), Some(vec!["sg-q".to_string()]));
    let snapshot_calls: Vec<_> = h
        .compute
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            ComputeCall::CreateSnapshot { request, .. } => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(snapshot_calls.len(), 2);
    assert_eq!(snapshot_calls[0].volume_id, "vol-a");
    assert_eq!(snapshot_calls[1].volume_id, "vol-b");
    assert!(snapshot_calls[0].description.contains("i-1"));

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].target, TOPIC);
    assert_eq!(published[0].subject, "GuardDuty auto-response: i-1 quarantined");
    let body: serde_json::Value = serde_json::from_str(&published[0].body).unwrap();
    assert_eq!(body["findingId"], "f1");
    assert_eq!(body["actions"]["snapshots"].as_array().unwrap().len(), 2);
    assert_eq!(body["dryRun"], false);
}

#[tokio::test]
async fn test_below_threshold_finding_is_silently_ignored() {
    let h = harness(policy(), instance_with_two_volumes());

    for severity in [json!(5), json!(6.99), json!("2.0"), json!(null)] {
        let result = completed(h.responder.process(&finding_event(severity)).await);
        assert_eq!(result, InvocationResult::new());
    }

    assert!(h.compute.calls().is_empty());
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn test_finding_without_instance_is_rejected() {
    let h = harness(policy(), instance_with_two_volumes());
    let event = json!({
        "detail": {
            "id": "f1",
            "type": "UnauthorizedAccess:IAMUser/ConsoleLogin",
            "severity": 8,
            "resource": { "resourceType": "AccessKey" }
        }
    });

    let result = completed(h.responder.process(&event).await);

    assert_eq!(result.processed_count, 0);
    assert!(result.quarantined.is_empty());
    assert_eq!(
        result.errors,
        vec![ErrorRecord::Rejected {
            finding_id: "f1".into(),
            reason: "no EC2 instance in finding".into(),
        }]
    );
    assert!(h.compute.calls().is_empty());
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn test_dry_run_touches_nothing_but_still_notifies() {
    let h = harness(policy().with_dry_run(true), instance_with_two_volumes());

    let result = completed(h.responder.process(&finding_event(json!(8))).await);

    assert_eq!(result.processed_count, 1);
    assert!(result.errors.is_empty());
    assert!(result.quarantined[0].snapshot_ids.is_empty());
    assert!(h.compute.calls().is_empty());

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].subject, "GuardDuty auto-response: i-1 quarantined");
    let body: serde_json::Value = serde_json::from_str(&published[0].body).unwrap();
    assert_eq!(body["dryRun"], true);
    assert_eq!(body["actions"]["quarantine"], "applied");
    assert_eq!(body["actions"]["snapshots"], json!([]));
}

#[tokio::test]
async fn test_dry_run_without_group_reports_not_isolated() {
    let policy = ResponsePolicy::default()
        .with_notification_target(TOPIC)
        .with_dry_run(true);
    let h = harness(policy, instance_with_two_volumes());

    completed(h.responder.process(&finding_event(json!(8))).await);

    assert!(h.compute.calls().is_empty());
    let body: serde_json::Value =
        serde_json::from_str(&h.publisher.published()[0].body).unwrap();
    assert_eq!(body["actions"]["quarantine"], "skipped or failed");
}

#[tokio::test]
async fn test_isolation_failure_is_reported_in_band() {
    let h = harness(
        policy(),
        instance_with_two_volumes().fail_isolation("UnauthorizedOperation"),
    );

    let response = h.responder.handle(&finding_event(json!(8))).await;

    assert_eq!(response.status_code, 200);
    let body: InvocationResult = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body.processed_count, 1);
    assert_eq!(body.errors.len(), 1);
    match &body.errors[0] {
        ErrorRecord::Failed { resource_id, error } => {
            assert_eq!(resource_id, "i-1");
            assert!(error.contains("UnauthorizedOperation"));
        }
        other => panic!("expected a containment failure, got {other:?}"),
    }
    assert_eq!(body.quarantined[0].resource_id, "i-1");
    assert_eq!(h.compute.mutating_calls().len(), 1);

    let published = h.publisher.published();
    assert_eq!(published[0].subject, "GuardDuty auto-response FAILED: i-1");
    let notification: serde_json::Value = serde_json::from_str(&published[0].body).unwrap();
    assert!(
        notification["error"]
            .as_str()
            .unwrap()
            .contains("UnauthorizedOperation")
    );
}

#[tokio::test]
async fn test_snapshot_failure_reports_skipped_volumes() {
    let h = harness(
        policy(),
        instance_with_two_volumes().fail_snapshot("vol-b", "SnapshotCreationPerVolumeRateExceeded"),
    );

    let result = completed(h.responder.process(&finding_event(json!(9))).await);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.quarantined[0].snapshot_ids.len(), 1);

    let published = h.publisher.published();
    assert_eq!(published[0].subject, "GuardDuty auto-response: i-1 quarantined");
    let body: serde_json::Value = serde_json::from_str(&published[0].body).unwrap();
    assert_eq!(body["actions"]["skippedVolumes"], json!(["vol-b"]));
}

#[tokio::test]
async fn test_notification_failure_does_not_change_result() {
    let h = harness_with_publisher(
        policy(),
        instance_with_two_volumes(),
        RecordingPublisher::failing("throttled"),
    );

    let response = h.responder.handle(&finding_event(json!(8))).await;

    assert_eq!(response.status_code, 200);
    let body: InvocationResult = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body.processed_count, 1);
    assert!(body.errors.is_empty());
    assert_eq!(body.quarantined[0].snapshot_ids.len(), 2);
    assert_eq!(h.publisher.published().len(), 1);
}

#[tokio::test]
async fn test_repeated_containment_is_idempotent_for_isolation_only() {
    let h = harness(policy(), instance_with_two_volumes());

    let first = completed(h.responder.process(&finding_event(json!(8))).await);
    let second = completed(h.responder.process(&finding_event(json!(8))).await);

    assert_eq!(h.compute.security_groups("i-1"), Some(vec!["sg-q".to_string()]));
    let isolations = h
        .compute
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ComputeCall::ReplaceSecurityGroups { .. }))
        .count();
    assert_eq!(isolations, 2);

    let first_ids = &first.quarantined[0].snapshot_ids;
    let second_ids = &second.quarantined[0].snapshot_ids;
    assert_eq!(first_ids.len(), 2);
    assert_eq!(second_ids.len(), 2);
    assert!(first_ids.iter().all(|id| !second_ids.contains(id)));
}

#[tokio::test]
async fn test_events_without_a_finding_are_skipped() {
    let h = harness(policy(), instance_with_two_volumes());

    for event in [
        json!({}),
        json!({ "detail": null }),
        json!({ "detail": { "severity": 9 } }),
        json!({ "detail": { "id": "" } }),
    ] {
        let response = h.responder.handle(&event).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.body,
            r#"{"skipped":"no GuardDuty finding in event"}"#
        );
    }
    assert!(h.compute.calls().is_empty());
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn test_unconfigured_target_skips_notification() {
    let h = harness(
        ResponsePolicy::default().with_quarantine_group("sg-q"),
        instance_with_two_volumes(),
    );

    let result = completed(h.responder.process(&finding_event(json!(8))).await);

    assert_eq!(result.processed_count, 1);
    assert!(h.publisher.published().is_empty());
}
