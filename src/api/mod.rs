//! Remote resource API.
//!
//! [`ResourceApi`] is the collaborator both the poller and the tag
//! reconciler talk to. [`HttpResourceClient`] implements it over a JSON REST
//! API; tests substitute their own implementations.

mod client;
mod types;

pub use client::HttpResourceClient;
pub use types::{lookup_field, ResourceView};

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::status::{observation_from_lookup, Observation};
use crate::tags::TagSet;

/// Operations the remote system exposes for one resource.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Reads a resource. `Ok(None)` means it does not exist.
    async fn get_resource(&self, id: &str) -> Result<Option<ResourceView>>;

    /// Lists the tags currently on a resource.
    async fn list_tags(&self, id: &str) -> Result<TagSet>;

    /// Creates or overwrites tags.
    async fn add_tags(&self, id: &str, tags: &TagSet) -> Result<()>;

    /// Removes tags by key.
    async fn remove_tags(&self, id: &str, keys: &BTreeSet<String>) -> Result<()>;
}

/// Fetches one observation of a resource.
///
/// An absent resource is reported as the `NOT_FOUND` state, never as an error.
///
/// # Errors
///
/// Returns the API error for anything other than a missing resource.
pub async fn observe<A: ResourceApi + ?Sized>(api: &A, id: &str) -> Result<Observation<ResourceView>> {
    observation_from_lookup(api.get_resource(id).await, |view| view.state.clone())
}


#[cfg(test)]
mod tests {
    use super::testing::MockApi;
    use super::*;
    use crate::error::ApiError;
    use mockall::predicate::eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_observe_present_resource() {
        let mut api = MockApi::new();
        api.expect_get_resource()
            .with(eq("hub-1"))
            .returning(|id| Ok(Some(ResourceView::new(id, "enabled", json!({})))));

        let obs = observe(&api, "hub-1").await.expect("observe succeeds");
        assert_eq!(obs.state.as_str(), "ENABLED");
        assert_eq!(obs.payload.map(|view| view.id), Some(String::from("hub-1")));
    }

    #[tokio::test]
    async fn test_observe_absent_resource() {
        let mut api = MockApi::new();
        api.expect_get_resource().returning(|_| Ok(None));

        let obs = observe(&api, "hub-1").await.expect("absent is a state");
        assert!(obs.state.is_not_found());
        assert!(obs.payload.is_none());
    }

    #[tokio::test]
    async fn test_observe_propagates_failures() {
        let mut api = MockApi::new();
        api.expect_get_resource()
            .returning(|_| Err(ApiError::network("connection reset").into()));

        let err = observe(&api, "hub-1").await.expect_err("network errors propagate");
        assert!(err.is_retryable());
    }
}
