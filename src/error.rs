//! Error types for the Tekton pipeline provider.

use thiserror::Error;

/// Errors that can occur while serving provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The pipeline service rejected or failed a request.
    #[error("API error: {0}")]
    Api(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A composite resource id could not be split into its parts.
    #[error("Invalid resource id: {0}")]
    InvalidId(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Api(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::InvalidId(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Whether this error means the remote object no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// An error returned by a [`PipelineApi`](crate::api::PipelineApi) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed ({status}): {message}")]
pub struct ApiError {
    /// HTTP status code reported by the service.
    pub status: u16,
    /// The service operation that failed, e.g. `GetTektonPipelineProperty`.
    pub operation: String,
    /// The service's error message.
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: u16, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a 404 error for the given operation.
    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(404, operation, message)
    }

    /// Create a 400 error for the given operation.
    pub fn bad_request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(400, operation, message)
    }

    /// Create a 409 error for the given operation.
    pub fn conflict(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(409, operation, message)
    }

    /// Whether the service reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        let msg = err.to_string();
        match err.status {
            404 => ProviderError::NotFound(msg),
            401 | 403 => ProviderError::PermissionDenied(msg),
            409 => ProviderError::AlreadyExists(msg),
            429 => ProviderError::ResourceExhausted(msg),
            503 => ProviderError::Unavailable(msg),
            400 | 422 => ProviderError::InvalidRequest(msg),
            _ => ProviderError::Api(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("custom_resource".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: custom_resource");

        let err = ProviderError::InvalidId("a/b".to_string());
        assert_eq!(format!("{}", err), "Invalid resource id: a/b");
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::new(500, "GetTektonPipeline", "boom");
        assert_eq!(err.to_string(), "GetTektonPipeline failed (500): boom");
    }

    #[test]
    fn test_api_error_status_mapping() {
        let cases = [
            (404, "NotFound"),
            (401, "PermissionDenied"),
            (403, "PermissionDenied"),
            (409, "AlreadyExists"),
            (429, "ResourceExhausted"),
            (503, "Unavailable"),
            (400, "InvalidRequest"),
            (422, "InvalidRequest"),
            (500, "Api"),
            (502, "Api"),
        ];

        for (status, expected) in cases {
            let err: ProviderError = ApiError::new(status, "Op", "msg").into();
            let variant = format!("{:?}", err);
            assert!(
                variant.starts_with(expected),
                "status {} mapped to {}",
                status,
                variant
            );
            assert!(err.message().contains("Op failed"));
        }
    }

    #[test]
    fn test_not_found_helpers() {
        let api = ApiError::not_found("GetTektonPipelineProperty", "no such property");
        assert!(api.is_not_found());
        assert!(!ApiError::conflict("Op", "exists").is_not_found());

        let err: ProviderError = api.into();
        assert!(err.is_not_found());
        assert!(!ProviderError::Api("x".to_string()).is_not_found());
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(err.message(), "resource-123");

        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::FailedPrecondition("force new".to_string());
        assert_eq!(err.message(), "force new");
    }
}
