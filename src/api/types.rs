//! Resource representations returned by the remote API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::ResourceState;

/// A resource as read from the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceView {
    /// Resource identifier.
    pub id: String,
    /// Normalized lifecycle state.
    pub state: ResourceState,
    /// Raw response body.
    #[serde(default)]
    pub body: serde_json::Value,
    /// When this view was fetched.
    pub observed_at: DateTime<Utc>,
}

impl ResourceView {
    /// Creates a view observed now, normalizing the raw state.
    #[must_use]
    pub fn new(id: impl Into<String>, raw_state: &str, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            state: ResourceState::normalize(raw_state),
            body,
            observed_at: Utc::now(),
        }
    }
}

/// Reads a value from a JSON document by dotted path, e.g. `"status.phase"`.
///
/// An empty path yields the document itself.
#[must_use]
pub fn lookup_field<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| current.get(segment))
}
