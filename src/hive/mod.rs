//! TheHive API surface: wire model, client, and error taxonomy.

pub mod client;
pub mod model;

pub use client::{CaseApi, HiveClient};
pub use model::{Alert, AlertArtifact, Case, CreatedAlert, CreatedCase};

use thiserror::Error;

/// Errors raised by case-management API calls.
#[derive(Debug, Error)]
pub enum HiveError {
    /// The API answered with a non-2xx status.
    #[error("thehive returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never got a usable answer.
    #[error("thehive transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl HiveError {
    /// HTTP 400: the payload itself was rejected. Permanent for this
    /// payload, so never retried and never fatal to the whole incident.
    pub fn is_rejected(&self) -> bool {
        matches!(self, HiveError::Status { status: 400, .. })
    }

    pub fn is_retryable(&self) -> bool {
        !self.is_rejected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_is_rejected_not_retryable() {
        let err = HiveError::Status {
            status: 400,
            body: "invalid custom field".into(),
        };
        assert!(err.is_rejected());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = HiveError::Status {
            status: 503,
            body: "overloaded".into(),
        };
        assert!(!err.is_rejected());
        assert!(err.is_retryable());
    }
}
