//! Decision gate: severity threshold and target checks ahead of containment.

use crate::config::ResponsePolicy;
use crate::finding::Finding;

/// Reason recorded when a finding does not name a compute instance.
pub const NO_TARGET_REASON: &str = "no EC2 instance in finding";

/// Outcome of gating a finding.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Contain the named resource.
    Proceed { resource_id: String },
    /// Ignore the finding without recording anything.
    Skip { reason: String },
    /// Refuse the finding and record it as an error.
    Reject { reason: String },
}

/// Applies the severity threshold from the response policy.
#[derive(Debug, Clone, Copy)]
pub struct DecisionGate {
    min_severity: f64,
}

impl DecisionGate {
    pub fn new(policy: &ResponsePolicy) -> Self {
        Self {
            min_severity: policy.min_severity,
        }
    }

    /// Decide whether `finding` should be contained.
    ///
    /// The severity check runs first: a low-severity finding without a target is
    /// noise, not an error.
    pub fn evaluate(&self, finding: &Finding) -> Decision {
        if finding.severity < self.min_severity {
            return Decision::Skip {
                reason: format!(
                    "severity {} below threshold {}",
                    finding.severity, self.min_severity
                ),
            };
        }
        match &finding.target_resource_id {
            Some(resource_id) => Decision::Proceed {
                resource_id: resource_id.clone(),
            },
            None => Decision::Reject {
                reason: NO_TARGET_REASON.to_string(),
            },
        }
    }
}
