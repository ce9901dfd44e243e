//! Error types for laneguard

use thiserror::Error;

use crate::IncidentId;

/// Core laneguard errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaneguardError {
    // Input errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    // Decision errors
    #[error("Timed out waiting on incident {0}")]
    Timeout(IncidentId),

    #[error("Incident {0} already has a pending decision")]
    DuplicatePending(IncidentId),

    #[error("Incident {0} was already resolved")]
    DuplicateResolution(IncidentId),

    // Cooperating system errors
    #[error("External notification failed: {0}")]
    ExternalNotify(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl LaneguardError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LaneguardError::Validation(msg.into())
    }

    pub fn node_not_found(id: impl Into<String>) -> Self {
        LaneguardError::NotFound {
            kind: "node",
            id: id.into(),
        }
    }

    pub fn node_exists(id: impl Into<String>) -> Self {
        LaneguardError::AlreadyExists {
            kind: "node",
            id: id.into(),
        }
    }

    pub fn incident_not_found(id: impl Into<String>) -> Self {
        LaneguardError::NotFound {
            kind: "incident",
            id: id.into(),
        }
    }

    /// Only configuration problems stop the process; everything else is
    /// reported to the caller or logged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LaneguardError::Configuration(_))
    }
}

/// Result type for laneguard operations
pub type LaneguardResult<T> = Result<T, LaneguardError>;
