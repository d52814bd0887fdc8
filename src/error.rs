//! Error types for the Cyral provider.

use thiserror::Error;

use crate::core::OperationType;
use crate::schema::Diagnostic;

/// A non-success HTTP response from the control plane.
///
/// The status code is preserved so error handlers can tell an absent
/// resource (404) apart from any other failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}; status code: {status_code}")]
pub struct HttpError {
    /// HTTP status code returned by the control plane.
    pub status_code: u16,
    /// Response body, or a short description when the body was empty.
    pub message: String,
}

impl HttpError {
    /// Create a new HTTP error.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Whether the control plane answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }
}

/// Errors that can occur while serving a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Local validation of the configuration failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is missing configuration or was not configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A JSON payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The control plane answered with a non-success status.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The request never produced an HTTP response.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The access token could not be obtained.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A composed resource ID did not have the expected shape.
    #[error("unexpected ID syntax '{id}'. Correct ID syntax is {expected}")]
    InvalidId {
        /// The offending ID.
        id: String,
        /// Human-readable expected form, e.g. `{policy_id}/{rule_id}`.
        expected: String,
    },

    /// The operation is not supported by this resource.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// A dispatcher step failed.
    #[error("error in operation '{operation}': {source}")]
    Operation {
        /// Lifecycle phase of the failed step.
        kind: OperationType,
        /// Name of the failed step.
        operation: String,
        /// Underlying failure.
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Wrap this error with the name of the dispatcher step that produced it.
    pub fn in_operation(self, kind: OperationType, operation: impl Into<String>) -> Self {
        Self::Operation {
            kind,
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// The HTTP status code behind this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http(err) => Some(err.status_code),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::Operation { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// Whether this error means the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || self.status_code() == Some(404)
    }

    /// The innermost error, looking through operation wrappers.
    pub fn root(&self) -> &ProviderError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<&ProviderError> for Diagnostic {
    fn from(err: &ProviderError) -> Self {
        match err {
            ProviderError::Operation { kind, .. } => {
                Diagnostic::error(format!("Unable to {} resource", kind))
                    .with_detail(err.to_string())
            },
            ProviderError::Validation(msg) => Diagnostic::error("Invalid configuration").with_detail(msg),
            ProviderError::Configuration(msg) => {
                Diagnostic::error("Provider configuration error").with_detail(msg)
            },
            other => Diagnostic::error(other.to_string()),
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::from(&err)
    }
}
