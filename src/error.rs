//! Error types for the convergence toolkit.
//!
//! This module provides the error hierarchy for every stage of a
//! convergence run: configuration, the remote resource API, waiting for a
//! state, and tag reconciliation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::status::ResourceState;

/// The main error type for the convergence toolkit.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote resource API errors.
    #[error("Resource API error: {0}")]
    Api(#[from] ApiError),

    /// Errors raised while waiting for a resource state.
    #[error("Wait error: {0}")]
    Wait(#[from] WaitError),

    /// Tag reconciliation errors.
    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// A wait profile was requested that is neither configured nor built in.
    #[error("Unknown wait profile: {name}")]
    UnknownProfile {
        /// The requested profile name.
        name: String,
    },
}

/// Remote resource API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed with a non-retryable status.
    #[error("API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The service reported a temporary server-side fault.
    #[error("Service unavailable: {status} - {message}")]
    ServiceUnavailable {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Resource not found.
    #[error("Resource not found: {resource_id}")]
    ResourceNotFound {
        /// ID of the missing resource.
        resource_id: String,
    },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Terminal failures of a convergence wait.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The time budget ran out while the resource was still pending.
    #[error(
        "Timeout after {elapsed:?} waiting for {resource} to reach {expected} (last state: {}, {attempts} attempts)",
        display_state(.last_state.as_ref())
    )]
    Timeout {
        /// Resource identifier.
        resource: String,
        /// Target states that were not reached.
        expected: String,
        /// Last state observed before giving up.
        last_state: Option<ResourceState>,
        /// Number of fetch attempts made.
        attempts: u32,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// The resource reported a state outside the pending and target sets.
    #[error("Unexpected state '{state}' for {resource}, wanted {expected} (after {elapsed:?})")]
    UnexpectedState {
        /// Resource identifier.
        resource: String,
        /// The state that was observed.
        state: ResourceState,
        /// Target states.
        expected: String,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// The status capability failed with a non-transient error, or ran out of
    /// transient retries.
    #[error("Fetching status of {resource} failed after {attempts} attempt(s): {source}")]
    FetchFailed {
        /// Resource identifier.
        resource: String,
        /// Consecutive failed attempts.
        attempts: u32,
        /// Last state observed before the failure.
        last_state: Option<ResourceState>,
        /// The underlying failure.
        #[source]
        source: Box<ConvergeError>,
    },

    /// The caller cancelled the wait.
    #[error(
        "Wait for {resource} cancelled after {elapsed:?} (last state: {})",
        display_state(.last_state.as_ref())
    )]
    Cancelled {
        /// Resource identifier.
        resource: String,
        /// Last state observed before cancellation.
        last_state: Option<ResourceState>,
        /// Time spent waiting.
        elapsed: Duration,
    },
}

/// Which half of a tag reconciliation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPhase {
    /// Removing tags that are no longer desired.
    Remove,
    /// Adding new tags or rewriting changed values.
    Upsert,
}

/// Tag reconciliation errors.
#[derive(Debug, Error)]
pub enum TagError {
    /// A mutation call failed.
    #[error("{phase} tags on resource ({resource}): {source}")]
    OperationFailed {
        /// The phase that failed.
        phase: TagPhase,
        /// Resource identifier.
        resource: String,
        /// The underlying failure.
        #[source]
        source: Box<ConvergeError>,
    },

    /// Listing the current tags failed.
    #[error("listing tags on resource ({resource}): {source}")]
    ListFailed {
        /// Resource identifier.
        resource: String,
        /// The underlying failure.
        #[source]
        source: Box<ConvergeError>,
    },
}

/// Result type alias for convergence operations.
pub type Result<T> = std::result::Result<T, ConvergeError>;

fn display_state(state: Option<&ResourceState>) -> &str {
    state.map_or("none", ResourceState::as_str)
}

impl std::fmt::Display for TagPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Remove => "removing",
            Self::Upsert => "upserting",
        };
        write!(f, "{s}")
    }
}

impl ConvergeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is transient and the call may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api(
                ApiError::RateLimited { .. }
                    | ApiError::NetworkError { .. }
                    | ApiError::ServiceUnavailable { .. }
            )
        )
    }

    /// Returns the suggested retry delay in seconds, if the remote side gave one.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Api(ApiError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Returns true if this error means the resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(ApiError::ResourceNotFound { .. }))
    }

    /// Returns the wait failure, if this error is one.
    #[must_use]
    pub const fn as_wait(&self) -> Option<&WaitError> {
        match self {
            Self::Wait(err) => Some(err),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl ApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl WaitError {
    /// Returns the last state observed before the wait ended.
    #[must_use]
    pub const fn last_state(&self) -> Option<&ResourceState> {
        match self {
            Self::Timeout { last_state, .. }
            | Self::FetchFailed { last_state, .. }
            | Self::Cancelled { last_state, .. } => last_state.as_ref(),
            Self::UnexpectedState { state, .. } => Some(state),
        }
    }

    /// Short name of the terminal condition, used in reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::UnexpectedState { .. } => "unexpected_state",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ConvergeError::from(ApiError::network("reset")).is_retryable());
        assert!(ConvergeError::from(ApiError::RateLimited { retry_after_secs: 3 }).is_retryable());
        assert!(
            ConvergeError::from(ApiError::ServiceUnavailable {
                status: 503,
                message: String::from("busy"),
            })
            .is_retryable()
        );
        assert!(!ConvergeError::from(ApiError::api_error(400, "bad")).is_retryable());
        assert!(
            !ConvergeError::from(ApiError::AuthenticationFailed {
                message: String::from("nope"),
            })
            .is_retryable()
        );
    }

    #[test]
    fn test_retry_delay_only_for_rate_limit() {
        let limited = ConvergeError::from(ApiError::RateLimited { retry_after_secs: 7 });
        assert_eq!(limited.retry_delay_secs(), Some(7));
        assert_eq!(ConvergeError::from(ApiError::network("x")).retry_delay_secs(), None);
    }

    #[test]
    fn test_tag_error_names_phase_and_resource() {
        let err = TagError::OperationFailed {
            phase: TagPhase::Remove,
            resource: String::from("arn:x:1"),
            source: Box::new(ApiError::api_error(400, "denied").into()),
        };
        let message = err.to_string();
        assert!(message.starts_with("removing tags on resource (arn:x:1)"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn test_timeout_message_includes_last_state() {
        let err = WaitError::Timeout {
            resource: String::from("acct-1"),
            expected: String::from("ENABLED"),
            last_state: Some(ResourceState::new("PENDING")),
            attempts: 4,
            elapsed: Duration::from_secs(300),
        };
        let message = err.to_string();
        assert!(message.contains("last state: PENDING"));
        assert_eq!(err.kind(), "timeout");
        assert_eq!(err.last_state().map(ResourceState::as_str), Some("PENDING"));
    }
}
