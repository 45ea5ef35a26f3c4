//! Minimal tag changes between an observed and a desired tag set.

use serde::Serialize;
use std::collections::BTreeSet;

use super::set::TagSet;

/// The mutations needed to turn an observed tag set into the desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagDiff {
    /// Keys to delete remotely.
    pub to_remove: BTreeSet<String>,
    /// Keys to create or overwrite, with their desired values.
    pub to_upsert: TagSet,
}

impl TagDiff {
    /// Computes the diff, leaving reserved keys out on both sides.
    ///
    /// Unchanged keys appear in neither set.
    #[must_use]
    pub fn compute(observed: &TagSet, desired: &TagSet, is_reserved: impl Fn(&str) -> bool) -> Self {
        let to_remove = observed
            .removed(desired)
            .into_iter()
            .filter(|key| !is_reserved(key.as_str()))
            .collect();
        let to_upsert = observed.updated(desired).without_reserved(&is_reserved);

        Self {
            to_remove,
            to_upsert,
        }
    }

    /// Returns true when nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_upsert.is_empty()
    }

    /// Total number of key changes.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.to_remove.len() + self.to_upsert.len()
    }
}

impl std::fmt::Display for TagDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "no tag changes");
        }

        let mut parts = Vec::with_capacity(self.change_count());
        parts.extend(self.to_remove.iter().map(|key| format!("-{key}")));
        parts.extend(self.to_upsert.iter().map(|(key, value)| format!("+{key}={value}")));
        write!(f, "{}", parts.join(", "))
    }
}
