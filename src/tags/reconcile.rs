//! Applying tag diffs to a remote resource.

use std::collections::BTreeSet;
use std::future::Future;
use tracing::{debug, info};

use crate::api::ResourceApi;
use crate::error::{Result, TagError, TagPhase};

use super::diff::TagDiff;
use super::set::{ReservedKeys, TagSet};

/// Brings a remote tag set in line with a desired one using the fewest calls.
///
/// Removals go out first, then upserts. A no-op diff issues no calls. If a
/// call fails the error names the phase and the resource; a removal that
/// already succeeded is not rolled back, and running the reconciliation again
/// only sends what is still missing.
///
/// # Errors
///
/// Returns [`TagError::OperationFailed`] when either mutation fails.
pub async fn reconcile_tags<R, RFut, U, UFut>(
    resource: &str,
    observed: &TagSet,
    desired: &TagSet,
    is_reserved: impl Fn(&str) -> bool,
    remove: R,
    upsert: U,
) -> Result<TagDiff>
where
    R: FnOnce(BTreeSet<String>) -> RFut,
    RFut: Future<Output = Result<()>>,
    U: FnOnce(TagSet) -> UFut,
    UFut: Future<Output = Result<()>>,
{
    let diff = TagDiff::compute(observed, desired, is_reserved);

    if diff.is_empty() {
        debug!("Tags on {resource} already match");
        return Ok(diff);
    }

    if !diff.to_remove.is_empty() {
        debug!("Removing {} tag(s) from {resource}", diff.to_remove.len());
        remove(diff.to_remove.clone())
            .await
            .map_err(|source| TagError::OperationFailed {
                phase: TagPhase::Remove,
                resource: resource.to_string(),
                source: Box::new(source),
            })?;
    }

    if !diff.to_upsert.is_empty() {
        debug!("Upserting {} tag(s) on {resource}", diff.to_upsert.len());
        upsert(diff.to_upsert.clone())
            .await
            .map_err(|source| TagError::OperationFailed {
                phase: TagPhase::Upsert,
                resource: resource.to_string(),
                source: Box::new(source),
            })?;
    }

    info!("Reconciled tags on {resource}: {diff}");
    Ok(diff)
}

/// Tag reconciliation bound to a reserved-key policy and default tags.
#[derive(Debug, Clone, Default)]
pub struct TagReconciler {
    /// Keys the reconciler never touches.
    reserved: ReservedKeys,
    /// Tags applied underneath every desired set.
    defaults: TagSet,
}

impl TagReconciler {
    /// Creates a reconciler with the given reserved keys and no default tags.
    #[must_use]
    pub const fn new(reserved: ReservedKeys) -> Self {
        Self {
            reserved,
            defaults: TagSet::new(),
        }
    }

    /// Sets tags merged underneath every desired set.
    #[must_use]
    pub fn with_defaults(mut self, defaults: TagSet) -> Self {
        self.defaults = defaults;
        self
    }

    /// The reserved-key policy.
    #[must_use]
    pub const fn reserved(&self) -> &ReservedKeys {
        &self.reserved
    }

    /// The desired tags with defaults applied.
    #[must_use]
    pub fn effective(&self, desired: &TagSet) -> TagSet {
        self.defaults.merge(desired)
    }

    /// Computes the diff without calling anything.
    #[must_use]
    pub fn plan(&self, observed: &TagSet, desired: &TagSet) -> TagDiff {
        TagDiff::compute(observed, &self.effective(desired), |k| {
            self.reserved.is_reserved(k)
        })
    }

    /// Reconciles against last-applied tags, without listing the remote set.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::OperationFailed`] when a mutation fails.
    pub async fn apply<A: ResourceApi + ?Sized>(
        &self,
        api: &A,
        resource: &str,
        old: &TagSet,
        new: &TagSet,
    ) -> Result<TagDiff> {
        let desired = self.effective(new);
        reconcile_tags(
            resource,
            old,
            &desired,
            |k| self.reserved.is_reserved(k),
            |keys| async move { api.remove_tags(resource, &keys).await },
            |tags| async move { api.add_tags(resource, &tags).await },
        )
        .await
    }

    /// Lists the remote tags, then reconciles them to `desired`.
    ///
    /// # Errors
    ///
    /// Returns [`TagError::ListFailed`] when the listing fails, or
    /// [`TagError::OperationFailed`] when a mutation fails.
    pub async fn sync<A: ResourceApi + ?Sized>(
        &self,
        api: &A,
        resource: &str,
        desired: &TagSet,
    ) -> Result<TagDiff> {
        let observed = api
            .list_tags(resource)
            .await
            .map_err(|source| TagError::ListFailed {
                resource: resource.to_string(),
                source: Box::new(source),
            })?;

        self.apply(api, resource, &observed, desired).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::MockApi;
    use crate::error::{ApiError, ConvergeError};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::sync::{Arc, Mutex};

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs.iter().copied().collect()
    }

    fn keys(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|k| (*k).to_string()).collect()
    }

    async fn never_remove(_keys: BTreeSet<String>) -> Result<()> {
        panic!("remove must not be called")
    }

    async fn never_upsert(_tags: TagSet) -> Result<()> {
        panic!("upsert must not be called")
    }

    #[tokio::test]
    async fn test_removes_before_upserting() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (remove_log, upsert_log) = (Arc::clone(&calls), Arc::clone(&calls));

        let diff = reconcile_tags(
            "res-1",
            &tags(&[("a", "1"), ("b", "2")]),
            &tags(&[("a", "1"), ("c", "3")]),
            |_| false,
            |keys| async move {
                remove_log.lock().unwrap().push(format!("remove {keys:?}"));
                Ok(())
            },
            |upserted| async move {
                upsert_log.lock().unwrap().push(format!("upsert {upserted:?}"));
                Ok(())
            },
        )
        .await
        .expect("reconcile should succeed");

        assert_eq!(diff.to_remove, keys(&["b"]));
        assert_eq!(diff.to_upsert, tags(&[("c", "3")]));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("remove"));
        assert!(calls[1].starts_with("upsert"));
    }

    #[tokio::test]
    async fn test_empty_diff_issues_no_calls() {
        let diff = reconcile_tags(
            "res-1",
            &TagSet::new(),
            &TagSet::new(),
            |_| false,
            never_remove,
            never_upsert,
        )
        .await
        .expect("no-op succeeds");

        assert!(diff.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_failure_names_phase_and_resource() {
        let err = reconcile_tags(
            "arn:res:9",
            &tags(&[("old", "x")]),
            &tags(&[("new", "y")]),
            |_| false,
            |_keys| async { Ok(()) },
            |_tags| async { Err(ApiError::api_error(400, "tag limit exceeded").into()) },
        )
        .await
        .expect_err("upsert failure surfaces");

        match err {
            ConvergeError::Tag(TagError::OperationFailed { phase, resource, .. }) => {
                assert_eq!(phase, TagPhase::Upsert);
                assert_eq!(resource, "arn:res:9");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_remove_failure_skips_upsert() {
        let err = reconcile_tags(
            "res-1",
            &tags(&[("old", "x")]),
            &tags(&[("new", "y")]),
            |_| false,
            |_keys| async { Err(ApiError::network("reset").into()) },
            never_upsert,
        )
        .await
        .expect_err("remove failure surfaces");

        assert!(matches!(
            err,
            ConvergeError::Tag(TagError::OperationFailed {
                phase: TagPhase::Remove,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_sync_lists_then_applies_in_order() {
        let mut api = MockApi::new();
        let mut seq = Sequence::new();

        api.expect_list_tags()
            .with(eq("res-1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok([("aws:managed", "true"), ("stale", "1"), ("team", "core")]
                    .into_iter()
                    .collect())
            });
        api.expect_remove_tags()
            .withf(|id, keys| id == "res-1" && keys.len() == 1 && keys.contains("stale"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        api.expect_add_tags()
            .withf(|id, tags| {
                id == "res-1" && tags.get("env") == Some("prod") && tags.get("owner") == Some("ops") && tags.len() == 2
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let reconciler = TagReconciler::new(ReservedKeys::default())
            .with_defaults(tags(&[("owner", "ops"), ("team", "core")]));
        let diff = reconciler
            .sync(&api, "res-1", &tags(&[("env", "prod")]))
            .await
            .expect("sync should succeed");

        assert_eq!(diff.change_count(), 3);
    }

    #[tokio::test]
    async fn test_sync_second_pass_is_noop() {
        let mut api = MockApi::new();
        api.expect_list_tags()
            .times(1)
            .returning(|_| Ok([("env", "prod")].into_iter().collect()));
        api.expect_remove_tags().never();
        api.expect_add_tags().never();

        let reconciler = TagReconciler::default();
        let diff = reconciler
            .sync(&api, "res-1", &tags(&[("env", "prod")]))
            .await
            .expect("sync should succeed");

        assert!(diff.is_empty());
    }

    #[tokio::test]
    async fn test_sync_list_failure() {
        let mut api = MockApi::new();
        api.expect_list_tags().times(1).returning(|id| {
            Err(ApiError::ResourceNotFound {
                resource_id: id.to_string(),
            }
            .into())
        });

        let err = TagReconciler::default()
            .sync(&api, "gone-1", &tags(&[("a", "1")]))
            .await
            .expect_err("listing failure surfaces");

        assert!(matches!(err, ConvergeError::Tag(TagError::ListFailed { .. })));
    }
}
