//! Domain errors for the orchestrator.

use thiserror::Error;

/// Format task names as `[a, b, c]`.
fn format_names<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    let joined = names
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{joined}]")
}

/// Fatal errors that abort a scheduling run.
///
/// Per-task failures are never reported through this type; they surface as
/// failed [`AgentResult`](crate::domain::models::AgentResult)s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Circular dependency detected among: {}", format_names(.tasks))]
    CircularDependency { tasks: Vec<String> },

    #[error("Wave {index} failed: {}", format_names(.failed))]
    WaveFailed { index: usize, failed: Vec<String> },

    #[error("Batch execution failed: {}", format_names(.failed))]
    BatchFailed { failed: Vec<String> },

    #[error("Test {test_file} written by {task} passed before implementation")]
    TddViolation { task: String, test_file: String },

    #[error("Run exceeded its total timeout of {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u64 },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors returned by the remote completion API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Invalid request parameters (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid or missing API key (HTTP 401)
    #[error("Invalid API key - authentication failed")]
    InvalidApiKey,

    /// Permission denied (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded - too many requests")]
    RateLimitExceeded,

    /// Server error (HTTP 5xx, including 529 overloaded)
    #[error("Server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(String),

    /// Request timed out
    #[error("Request timeout")]
    Timeout,

    /// Anything else
    #[error("Unknown error ({status}): {body}")]
    Unknown { status: u16, body: String },
}

impl ApiError {
    /// Returns true if this error is transient and should be retried
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::ServerError { .. } | Self::Timeout | Self::Network(_)
        )
    }

    /// Returns true if this is a permanent error that should not be retried
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::InvalidApiKey | Self::Forbidden(_) | Self::NotFound
        )
    }

    /// Classify an HTTP error status and body.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => Self::InvalidRequest(body),
            401 => Self::InvalidApiKey,
            403 => Self::Forbidden(body),
            404 => Self::NotFound,
            429 => Self::RateLimitExceeded,
            500..=599 => Self::ServerError { status, body },
            _ => Self::Unknown { status, body },
        }
    }
}

/// Errors raised while reading a task manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Invalid YAML manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task name must not be empty")]
    EmptyName,

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Task {0} depends on itself")]
    SelfDependency(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_error_messages() {
        let err = SchedulerError::CircularDependency {
            tasks: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected among: [a, b]");

        let err = SchedulerError::WaveFailed {
            index: 2,
            failed: vec!["x".to_string()],
        };
        assert_eq!(err.to_string(), "Wave 2 failed: [x]");

        let err = SchedulerError::BatchFailed {
            failed: vec!["d".to_string(), "e".to_string()],
        };
        assert_eq!(err.to_string(), "Batch execution failed: [d, e]");
    }

    #[test]
    fn test_transient_errors() {
        assert!(ApiError::RateLimitExceeded.is_transient());
        assert!(ApiError::ServerError {
            status: 529,
            body: "overloaded".to_string()
        }
        .is_transient());
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::Network("reset".to_string()).is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(ApiError::InvalidRequest("bad".to_string()).is_permanent());
        assert!(ApiError::InvalidApiKey.is_permanent());
        assert!(ApiError::Forbidden("no".to_string()).is_permanent());
        assert!(ApiError::NotFound.is_permanent());
        assert!(!ApiError::Json("eof".to_string()).is_transient());
    }

    #[test]
    fn test_from_status() {
        assert_eq!(
            ApiError::from_status(400, "bad".to_string()),
            ApiError::InvalidRequest("bad".to_string())
        );
        assert_eq!(ApiError::from_status(401, String::new()), ApiError::InvalidApiKey);
        assert_eq!(
            ApiError::from_status(429, String::new()),
            ApiError::RateLimitExceeded
        );
        assert!(ApiError::from_status(529, "overloaded".to_string()).is_transient());
        assert!(matches!(
            ApiError::from_status(418, "teapot".to_string()),
            ApiError::Unknown { status: 418, .. }
        ));
    }
}
