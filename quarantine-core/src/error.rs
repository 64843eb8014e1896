//! Error types for the quarantine responder.

use thiserror::Error;

/// Errors raised by the external cloud and notification capabilities.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The API accepted the request but refused it (access denied, invalid group, ...).
    #[error("{operation} rejected: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
    /// The request never produced an API answer.
    #[error("{operation} transport failure: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
}

impl CapabilityError {
    pub fn rejected(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }

    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }
}

/// A capability failure tagged with the containment step that raised it.
#[derive(Debug, Error)]
pub enum ContainmentError {
    #[error("isolation of {instance_id} failed: {source}")]
    Isolation {
        instance_id: String,
        #[source]
        source: CapabilityError,
    },
    #[error("volume lookup for {instance_id} failed: {source}")]
    Describe {
        instance_id: String,
        #[source]
        source: CapabilityError,
    },
    #[error("snapshot of volume {volume_id} failed: {source}")]
    Snapshot {
        volume_id: String,
        #[source]
        source: CapabilityError,
    },
}

/// Errors from loading the response policy.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load policy: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("failed to read inventory '{path}': {message}")]
    Inventory { path: String, message: String },
}
