//! Error types for the oneM2M client

use thiserror::Error;

/// Errors returned by subscription create/delete requests
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The parent resource of the subscription does not exist (HTTP 404)
    #[error("Endpoint not found: {url}")]
    EndpointNotFound { url: String },

    /// Creation answered with anything but 201, or never reached the platform
    ///
    /// `status` is `None` when the request failed at the transport level
    /// (connection refused, timeout, DNS failure).
    #[error("Failed to create subscription (status {status:?}): {detail}")]
    RegistrationFailed { status: Option<u16>, detail: String },

    /// Deletion answered with anything but 200/204, or never reached the platform
    #[error("Failed to delete subscription (status {status:?}): {detail}")]
    DeregistrationFailed { status: Option<u16>, detail: String },
}

impl RegistrationError {
    /// HTTP status carried by the error, if the platform answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistrationError::EndpointNotFound { .. } => Some(404),
            RegistrationError::RegistrationFailed { status, .. }
            | RegistrationError::DeregistrationFailed { status, .. } => *status,
        }
    }
}

/// Invalid subscription configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for registration requests
pub type Result<T> = std::result::Result<T, RegistrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_display() {
        let error = RegistrationError::EndpointNotFound {
            url: "http://cse.example:7579/Mobius/SubTest/testcnt1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Endpoint not found: http://cse.example:7579/Mobius/SubTest/testcnt1"
        );

        let error = RegistrationError::RegistrationFailed {
            status: Some(409),
            detail: "conflict".to_string(),
        };
        assert!(error.to_string().contains("409"));
        assert!(error.to_string().contains("conflict"));

        let error = RegistrationError::DeregistrationFailed {
            status: None,
            detail: "connection refused".to_string(),
        };
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn test_status_accessor() {
        let error = RegistrationError::EndpointNotFound { url: String::new() };
        assert_eq!(error.status(), Some(404));

        let error = RegistrationError::RegistrationFailed {
            status: None,
            detail: "timeout".to_string(),
        };
        assert_eq!(error.status(), None);
    }
}
