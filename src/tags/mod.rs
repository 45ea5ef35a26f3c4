//! Tag reconciliation.
//!
//! Computes the minimal set of removals and upserts that bring a remote
//! resource's tags in line with a desired set, and applies them through the
//! [`ResourceApi`](crate::api::ResourceApi) seam. Provider-reserved keys are
//! left alone on both sides.

mod diff;
mod reconcile;
mod set;

pub use diff::TagDiff;
pub use reconcile::{reconcile_tags, TagReconciler};
pub use set::{ReservedKeys, TagSet, DEFAULT_RESERVED_PREFIX};
