//! Key-value tag sets and the reserved-key predicate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Default prefix of provider-owned tag keys.
pub const DEFAULT_RESERVED_PREFIX: &str = "aws:";

/// A set of tags: unique keys, each with one value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a tag, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Looks up the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All keys.
    #[must_use]
    pub fn keys(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }

    /// Borrows the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Keys present here but absent from `desired`.
    #[must_use]
    pub fn removed(&self, desired: &Self) -> BTreeSet<String> {
        self.0
            .keys()
            .filter(|key| !desired.contains_key(key))
            .cloned()
            .collect()
    }

    /// Tags of `desired` that are new or carry a different value than here.
    #[must_use]
    pub fn updated(&self, desired: &Self) -> Self {
        desired
            .iter()
            .filter(|(key, value)| self.get(key) != Some(*value))
            .collect()
    }

    /// Copy without any key matching the predicate.
    #[must_use]
    pub fn without_reserved(&self, is_reserved: impl Fn(&str) -> bool) -> Self {
        self.iter().filter(|(key, _)| !is_reserved(*key)).collect()
    }

    /// Copy of `self` overlaid with `other`; `other` wins on conflicts.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in other.iter() {
            merged.insert(key, value);
        }
        merged
    }

    /// Parses a `key=value` pair. The value may be empty or contain `=`.
    ///
    /// Returns `None` when there is no `=` or the key is empty.
    #[must_use]
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), value.to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<HashMap<String, String>> for TagSet {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Predicate for tag keys owned by the provider or system.
///
/// Reserved keys are never removed or rewritten by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedKeys {
    /// Key prefixes that mark a reserved key.
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Exact reserved keys.
    #[serde(default)]
    pub keys: BTreeSet<String>,
}

impl ReservedKeys {
    /// No reserved keys at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            prefixes: Vec::new(),
            keys: BTreeSet::new(),
        }
    }

    /// Reserves every key starting with one of `prefixes`.
    #[must_use]
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
            keys: BTreeSet::new(),
        }
    }

    /// Adds an exact reserved key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.insert(key.into());
        self
    }

    /// Returns true if the key is reserved.
    #[must_use]
    pub fn is_reserved(&self, key: &str) -> bool {
        self.keys.contains(key) || self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self::with_prefixes([DEFAULT_RESERVED_PREFIX])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_removed_and_updated() {
        let old = tags(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let new = tags(&[("a", "1"), ("c", "30"), ("d", "4")]);

        assert_eq!(old.removed(&new), BTreeSet::from([String::from("b")]));
        assert_eq!(old.updated(&new), tags(&[("c", "30"), ("d", "4")]));
    }

    #[test]
    fn test_without_reserved() {
        let reserved = ReservedKeys::default();
        let set = tags(&[("aws:cloudformation:stack-name", "s"), ("team", "core")]);
        let filtered = set.without_reserved(|k| reserved.is_reserved(k));
        assert_eq!(filtered, tags(&[("team", "core")]));
    }

    #[test]
    fn test_merge_prefers_other() {
        let defaults = tags(&[("env", "dev"), ("owner", "ops")]);
        let resource = tags(&[("env", "prod")]);
        assert_eq!(
            defaults.merge(&resource),
            tags(&[("env", "prod"), ("owner", "ops")])
        );
    }

    #[test]
    fn test_reserved_keys_exact_and_prefix() {
        let reserved = ReservedKeys::with_prefixes(["sys:"]).with_key("Name");
        assert!(reserved.is_reserved("sys:owner"));
        assert!(reserved.is_reserved("Name"));
        assert!(!reserved.is_reserved("name"));
        assert!(!ReservedKeys::none().is_reserved("aws:x"));
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            TagSet::parse_pair("team=core"),
            Some((String::from("team"), String::from("core")))
        );
        assert_eq!(
            TagSet::parse_pair("expr=a=b"),
            Some((String::from("expr"), String::from("a=b")))
        );
        assert_eq!(
            TagSet::parse_pair("empty="),
            Some((String::from("empty"), String::new()))
        );
        assert_eq!(TagSet::parse_pair("novalue"), None);
        assert_eq!(TagSet::parse_pair("=x"), None);
    }

    #[test]
    fn test_serde_is_a_plain_map() {
        let set = tags(&[("a", "1")]);
        let json = serde_json::to_string(&set).expect("serialize");
        assert_eq!(json, r#"{"a":"1"}"#);
    }
}
