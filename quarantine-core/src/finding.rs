//! Finding extraction: turns a raw findings-bus event into a canonical [`Finding`].
//!
//! The raw event shape is
//! `{ detail: { id, type, severity, resource: { instanceDetails: { instanceId } } } }`.
//! Everything outside `detail` is ignored. Missing or mistyped nested fields
//! collapse into `None` instead of failing the whole extraction.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A normalized security finding. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Upstream finding identifier, never empty.
    pub id: String,
    /// Finding type as reported upstream (e.g. `Backdoor:EC2/C&CActivity.B`).
    pub finding_type: String,
    /// Severity score as computed upstream.
    pub severity: f64,
    /// Compute instance the finding refers to.
    pub target_resource_id: Option<String>,
}

impl Finding {
    pub fn new(id: impl Into<String>, finding_type: impl Into<String>, severity: f64) -> Self {
        Self {
            id: id.into(),
            finding_type: finding_type.into(),
            severity,
            target_resource_id: None,
        }
    }

    pub fn with_target(mut self, resource_id: impl Into<String>) -> Self {
        self.target_resource_id = Some(resource_id.into());
        self
    }

    /// Extract a finding from a raw event.
    ///
    /// Returns `None` when the event carries no `detail` payload or the payload
    /// has no usable `id`.
    pub fn from_event(event: &serde_json::Value) -> Option<Self> {
        let raw = match RawEvent::deserialize(event) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("Event is not a findings-bus record: {}", e);
                return None;
            }
        };
        let detail = raw.detail?;
        let id = detail.id.filter(|id| !id.is_empty())?;

        let target_resource_id = detail
            .resource
            .and_then(|r| r.instance_details)
            .and_then(|d| d.instance_id)
            .filter(|id| !id.is_empty());

        Some(Self {
            id,
            finding_type: detail.finding_type.unwrap_or_default(),
            severity: detail.severity.map(|s| s.0).unwrap_or(0.0),
            target_resource_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default, deserialize_with = "lenient")]
    detail: Option<RawDetail>,
}

#[derive(Debug, Deserialize)]
struct RawDetail {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    finding_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    severity: Option<Severity>,
    #[serde(default, deserialize_with = "lenient")]
    resource: Option<RawResource>,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(default, rename = "instanceDetails", deserialize_with = "lenient")]
    instance_details: Option<RawInstanceDetails>,
}

#[derive(Debug, Deserialize)]
struct RawInstanceDetails {
    #[serde(default, rename = "instanceId", deserialize_with = "lenient")]
    instance_id: Option<String>,
}

/// Severity coerced from a JSON number or a numeric string.
#[derive(Debug, Clone, Copy)]
struct Severity(f64);

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let score = match &value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match score {
            Some(score) if score.is_finite() => Ok(Severity(score)),
            _ => {
                tracing::warn!("Unusable finding severity {}, treating as 0", value);
                Ok(Severity(0.0))
            }
        }
    }
}

/// Deserialize a field, mapping `null` and type mismatches to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
