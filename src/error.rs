//! Error types for the Apstra provider.

use thiserror::Error;

/// Errors that can occur while serving provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An HTTP transport error occurred while talking to Apstra.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Apstra API answered with a non-success status.
    #[error("Apstra API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Login was rejected or the session is no longer valid.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Reason reported by the server.
        message: String,
    },

    /// A URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Http(_err) => "http error (see Debug output)",
            Self::Api { message, .. } => message,
            Self::Authentication { message } => message,
            Self::InvalidUrl(_err) => "invalid url (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Returns `true` when the error means the target object does not exist.
    ///
    /// Covers both [`ProviderError::NotFound`] and an API response with
    /// HTTP status 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api { status, .. } => *status == 404,
            Self::Http(err) => err.status().map(|s| s.as_u16()) == Some(404),
            _ => false,
        }
    }

    /// Returns `true` for HTTP 401 responses and rejected logins.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::Api { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Diagnostic summary for this class of error.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Authentication { .. } => "Authentication failed",
            Self::Api { .. } | Self::Http(_) => "Apstra API error",
            _ => "Provider error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("blueprint abc".to_string());
        assert_eq!(format!("{}", err), "Resource not found: blueprint abc");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("apstra_nope".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: apstra_nope");
    }

    #[test]
    fn test_api_error_display() {
        let err = ProviderError::Api {
            status: 422,
            message: "bad vlan".to_string(),
        };
        assert_eq!(format!("{}", err), "Apstra API error (HTTP 422): bad vlan");
        assert_eq!(err.message(), "bad vlan");

        let err = ProviderError::Authentication {
            message: "bad password".to_string(),
        };
        assert_eq!(format!("{}", err), "Authentication failed: bad password");
    }

    #[test]
    fn test_is_not_found() {
        assert!(ProviderError::NotFound("x".into()).is_not_found());
        assert!(ProviderError::Api {
            status: 404,
            message: String::new()
        }
        .is_not_found());
        assert!(!ProviderError::Api {
            status: 500,
            message: String::new()
        }
        .is_not_found());
        assert!(!ProviderError::Sdk("x".into()).is_not_found());
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ProviderError::Api {
            status: 401,
            message: String::new()
        }
        .is_unauthorized());
        assert!(!ProviderError::NotFound("x".into()).is_unauthorized());
    }

    #[test]
    fn test_summary() {
        let err = ProviderError::Api {
            status: 500,
            message: String::new(),
        };
        assert_eq!(err.summary(), "Apstra API error");
        assert_eq!(ProviderError::Sdk("x".into()).summary(), "Provider error");
    }

    #[test]
    fn test_invalid_url_from() {
        let err: ProviderError = url::Url::parse("not a url").unwrap_err().into();
        assert!(format!("{}", err).starts_with("Invalid URL:"));
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::InvalidRequest("bad request".to_string());
        assert_eq!(err.message(), "bad request");
    }
}
