//! Response policy for the quarantine responder.
//!
//! Uses `figment` for layered configuration: defaults -> optional TOML file -> environment.
//! The environment keys are the ones the responder has always been deployed with
//! (`QUARANTINE_SG_ID`, `SNS_TOPIC_ARN`, `MIN_SEVERITY`, `DRY_RUN`).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Identifier variables and the policy keys they set. Their values are opaque
/// and are taken verbatim, never parsed as numbers.
const IDENTIFIER_ENV_KEYS: [(&str, &str); 2] = [
    ("QUARANTINE_SG_ID", "quarantine_sg_id"),
    ("SNS_TOPIC_ARN", "sns_topic_arn"),
];

/// Setting variables, parsed by figment's `Env` provider.
const SETTING_ENV_KEYS: [&str; 2] = ["MIN_SEVERITY", "DRY_RUN"];

/// Default severity threshold; findings scoring below it are ignored.
pub const DEFAULT_MIN_SEVERITY: f64 = 7.0;

/// Process-wide response policy. Loaded once and handed to each pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsePolicy {
    /// Security group that becomes the instance's only membership on isolation.
    #[serde(
        rename = "quarantine_sg_id",
        deserialize_with = "optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub quarantine_group_id: Option<String>,
    /// Where outcome notifications are published.
    #[serde(
        rename = "sns_topic_arn",
        deserialize_with = "optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub notification_target: Option<String>,
    /// Findings with a lower severity are skipped silently.
    #[serde(deserialize_with = "severity_threshold")]
    pub min_severity: f64,
    /// Report what would happen without mutating anything.
    #[serde(deserialize_with = "truthy")]
    pub dry_run: bool,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            quarantine_group_id: None,
            notification_target: None,
            min_severity: DEFAULT_MIN_SEVERITY,
            dry_run: false,
        }
    }
}

impl ResponsePolicy {
    /// Load the policy from layered sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables; empty values count as unset
    /// 2. The TOML file at `config_file`, when given
    /// 3. Built-in defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(
            Env::raw()
                .only(&SETTING_ENV_KEYS)
                .filter(|key| env_value(key.as_str()).is_some()),
        );
        for (var, key) in IDENTIFIER_ENV_KEYS {
            if let Some(value) = env_value(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        Self::from_figment(figment)
    }

    /// Extract a policy from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    pub fn with_quarantine_group(mut self, group_id: impl Into<String>) -> Self {
        self.quarantine_group_id = Some(group_id.into());
        self
    }

    pub fn with_notification_target(mut self, target: impl Into<String>) -> Self {
        self.notification_target = Some(target.into());
        self
    }

    pub fn with_min_severity(mut self, min_severity: f64) -> Self {
        self.min_severity = min_severity;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

fn env_value(var: &str) -> Option<String> {
    Env::var(var).filter(|v| !v.is_empty())
}

/// Figment's `Env` parses values eagerly, so `DRY_RUN=1` arrives as an
/// integer. A TOML file may also spell an identifier as a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

fn optional_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.into_text().trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn severity_threshold<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let threshold = match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => i as f64,
        Scalar::Float(f) => f,
        Scalar::Text(s) if s.trim().is_empty() => DEFAULT_MIN_SEVERITY,
        Scalar::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            <D::Error as serde::de::Error>::custom(format!(
                "min severity must be numeric, got '{s}'"
            ))
        })?,
        Scalar::Bool(b) => {
            return Err(serde::de::Error::custom(format!(
                "min severity must be numeric, got '{b}'"
            )));
        }
    };
    if !threshold.is_finite() {
        return Err(serde::de::Error::custom("min severity must be finite"));
    }
    Ok(threshold)
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => false,
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Int(i)) => i == 1,
        Some(Scalar::Float(_)) => false,
        Some(Scalar::Text(s)) => is_truthy(&s),
    })
}

/// `1`, `true` and `yes` (any case) enable a flag; everything else disables it.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
