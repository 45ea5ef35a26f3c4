//! Resource states and status-normalization helpers.
//!
//! Remote systems report lifecycle states as free-form strings. This module
//! gives them one canonical spelling and treats "the resource does not
//! exist" as a regular state (`NOT_FOUND`) rather than an error, so a wait
//! for deletion can target it like any other state.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A lifecycle state reported by the remote system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceState(String);

impl ResourceState {
    /// Sentinel state for a resource that is absent.
    pub const NOT_FOUND: &'static str = "NOT_FOUND";

    /// Creates a state from its exact spelling.
    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self(state.into())
    }

    /// The `NOT_FOUND` sentinel.
    #[must_use]
    pub fn not_found() -> Self {
        Self(String::from(Self::NOT_FOUND))
    }

    /// Canonicalizes a raw state string.
    ///
    /// Trims whitespace, upper-cases ASCII letters and maps `-` and spaces to
    /// `_`, so `"Disable-In-Progress"` becomes `DISABLE_IN_PROGRESS`. An
    /// empty string means the remote side returned nothing, i.e. `NOT_FOUND`.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::not_found();
        }

        let canonical = trimmed
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect();
        Self(canonical)
    }

    /// Returns true for the `NOT_FOUND` sentinel.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.0 == Self::NOT_FOUND
    }

    /// The state as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceState {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One answer from a status capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<T> {
    /// The observed state.
    pub state: ResourceState,
    /// Full resource payload; absent when the resource is `NOT_FOUND`.
    pub payload: Option<T>,
}

impl<T> Observation<T> {
    /// An observation of an existing resource.
    #[must_use]
    pub const fn found(state: ResourceState, payload: T) -> Self {
        Self {
            state,
            payload: Some(payload),
        }
    }

    /// An observation of an absent resource.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            state: ResourceState::not_found(),
            payload: None,
        }
    }
}

/// Converts a resource lookup into an observation.
///
/// A missing resource, whether reported as `Ok(None)` or as a not-found
/// error, becomes `NOT_FOUND`. Every other error is returned unchanged.
///
/// # Errors
///
/// Returns the lookup error when it is not a not-found condition.
pub fn observation_from_lookup<T, F>(lookup: Result<Option<T>>, state_of: F) -> Result<Observation<T>>
where
    F: FnOnce(&T) -> ResourceState,
{
    match lookup {
        Ok(Some(payload)) => Ok(Observation::found(state_of(&payload), payload)),
        Ok(None) => Ok(Observation::not_found()),
        Err(err) if err.is_not_found() => Ok(Observation::not_found()),
        Err(err) => Err(err),
    }
}

/// Joins a set of states for messages, e.g. `ENABLED, INCOMPLETE`.
#[must_use]
pub fn join_states<'a>(states: impl IntoIterator<Item = &'a ResourceState>) -> String {
    states
        .into_iter()
        .map(ResourceState::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ConvergeError};

    #[test]
    fn test_normalize_spellings() {
        assert_eq!(ResourceState::normalize("enabled").as_str(), "ENABLED");
        assert_eq!(
            ResourceState::normalize(" Disable-In-Progress ").as_str(),
            "DISABLE_IN_PROGRESS"
        );
        assert_eq!(ResourceState::normalize("not found").as_str(), "NOT_FOUND");
        assert!(ResourceState::normalize("").is_not_found());
        assert!(ResourceState::normalize("   ").is_not_found());
    }

    #[test]
    fn test_lookup_found() {
        let obs = observation_from_lookup(Ok(Some("READY")), |s| ResourceState::normalize(s))
            .expect("lookup should succeed");
        assert_eq!(obs.state.as_str(), "READY");
        assert_eq!(obs.payload, Some("READY"));
    }

    #[test]
    fn test_lookup_absent_is_state_not_error() {
        let obs = observation_from_lookup::<String, _>(Ok(None), |_| ResourceState::new("X"))
            .expect("absent is not an error");
        assert!(obs.state.is_not_found());
        assert!(obs.payload.is_none());

        let not_found: Result<Option<String>> = Err(ConvergeError::from(ApiError::ResourceNotFound {
            resource_id: String::from("r-1"),
        }));
        let obs = observation_from_lookup(not_found, |_| ResourceState::new("X"))
            .expect("not-found error maps to state");
        assert!(obs.state.is_not_found());
    }

    #[test]
    fn test_lookup_other_errors_propagate() {
        let failed: Result<Option<String>> = Err(ApiError::network("reset").into());
        let err = observation_from_lookup(failed, |_| ResourceState::new("X"))
            .expect_err("network errors must propagate");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_join_states() {
        let states = [ResourceState::new("READY"), ResourceState::new("INCOMPLETE")];
        assert_eq!(join_states(&states), "READY, INCOMPLETE");
    }
}
