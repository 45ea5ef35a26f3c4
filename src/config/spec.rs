//! Configuration types for the convergence tool.
//!
//! These structs map to the `converge.yaml` file. Every section except `api`
//! is optional and falls back to the defaults documented on each field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::poller::{Backoff, PollSpec};
use crate::status::ResourceState;
use crate::tags::{ReservedKeys, TagReconciler, TagSet, DEFAULT_RESERVED_PREFIX};

/// Name of the built-in profile that waits for a resource to exist.
pub const PROFILE_PRESENT: &str = "present";

/// Name of the built-in profile that waits for a resource to disappear.
pub const PROFILE_ABSENT: &str = "absent";

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvergeConfig {
    /// Remote API settings.
    pub api: ApiConfig,
    /// Poll interval policy shared by all waits.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Named wait profiles; these override built-ins with the same name.
    #[serde(default)]
    pub profiles: BTreeMap<String, WaitProfile>,
    /// Tag reconciliation settings.
    #[serde(default)]
    pub tags: TagsConfig,
}

impl ConvergeConfig {
    /// Resolves a profile by name, preferring the config over built-ins.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProfile`] if no profile has that name.
    pub fn profile(&self, name: &str) -> Result<WaitProfile> {
        self.profiles
            .get(name)
            .cloned()
            .or_else(|| WaitProfile::builtin(name))
            .ok_or_else(|| {
                ConfigError::UnknownProfile {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Every resolvable profile, built-ins included.
    #[must_use]
    pub fn all_profiles(&self) -> BTreeMap<String, WaitProfile> {
        let mut all = BTreeMap::from([
            (String::from(PROFILE_PRESENT), WaitProfile::present()),
            (String::from(PROFILE_ABSENT), WaitProfile::absent()),
        ]);
        all.extend(self.profiles.clone());
        all
    }

    /// Builds the poll spec for a profile.
    #[must_use]
    pub fn poll_spec(&self, profile: &WaitProfile) -> PollSpec {
        profile.to_poll_spec(&self.polling)
    }

    /// Builds the tag reconciler described by the `tags` section.
    #[must_use]
    pub fn tag_reconciler(&self) -> TagReconciler {
        TagReconciler::new(self.tags.reserved_keys()).with_defaults(self.tags.defaults.clone())
    }
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Path of a single resource; `{id}` is replaced by the resource id.
    #[serde(default = "default_resource_path")]
    pub resource_path: String,
    /// Path of a resource's tags; `{id}` is replaced by the resource id.
    #[serde(default = "default_tags_path")]
    pub tags_path: String,
    /// Dotted path of the status field in a resource body.
    #[serde(default = "default_status_field")]
    pub status_field: String,
    /// Dotted path of the tag map in a tags body. Empty means the whole body.
    #[serde(default = "default_tags_field")]
    pub tags_field: String,
    /// Query parameter carrying keys on tag removal.
    #[serde(default = "default_tag_keys_param")]
    pub tag_keys_param: String,
    /// Environment variable holding a bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Creates settings for `base_url` with default paths and fields.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            resource_path: default_resource_path(),
            tags_path: default_tags_path(),
            status_field: default_status_field(),
            tags_field: default_tags_field(),
            tag_keys_param: default_tag_keys_param(),
            token_env: None,
            timeout_secs: default_request_timeout(),
        }
    }

    /// Reads the bearer token, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if `token_env` names an unset variable.
    pub fn token(&self) -> Result<Option<String>> {
        let Some(var) = &self.token_env else {
            return Ok(None);
        };
        std::env::var(var)
            .map(Some)
            .map_err(|_| ConfigError::MissingEnvVar { name: var.clone() }.into())
    }

    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_resource_path() -> String {
    String::from("/resources/{id}")
}

fn default_tags_path() -> String {
    String::from("/resources/{id}/tags")
}

fn default_status_field() -> String {
    String::from("status")
}

fn default_tags_field() -> String {
    String::from("tags")
}

fn default_tag_keys_param() -> String {
    String::from("tagKeys")
}

const fn default_request_timeout() -> u64 {
    30
}

/// Poll interval policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// First interval between polls.
    pub interval_ms: u64,
    /// Ceiling for the growing interval.
    pub max_interval_ms: u64,
    /// Growth factor per wait.
    pub multiplier: f64,
    /// Random jitter added to each interval.
    pub jitter_ms: u64,
    /// Wait before the first poll.
    pub delay_ms: u64,
    /// Consecutive transient fetch errors tolerated.
    pub transient_retries: u32,
    /// Consecutive target observations required.
    pub continuous_target_occurrence: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_interval_ms: 10_000,
            multiplier: 2.0,
            jitter_ms: 250,
            delay_ms: 0,
            transient_retries: 3,
            continuous_target_occurrence: 1,
        }
    }
}

impl PollingConfig {
    /// The backoff this section describes.
    #[must_use]
    pub const fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.max_interval_ms),
        )
        .with_multiplier(self.multiplier)
        .with_jitter(Duration::from_millis(self.jitter_ms))
    }
}

/// Pending and target states for a named kind of wait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaitProfile {
    /// States to keep waiting on.
    #[serde(default)]
    pub pending: Vec<String>,
    /// States that end the wait.
    pub target: Vec<String>,
    /// Time budget in seconds.
    #[serde(default = "default_wait_timeout")]
    pub timeout_secs: u64,
}

const fn default_wait_timeout() -> u64 {
    300
}

impl WaitProfile {
    /// Waits for a newly created resource to become enabled.
    #[must_use]
    pub fn present() -> Self {
        Self {
            pending: vec![String::from(ResourceState::NOT_FOUND), String::from("PENDING")],
            target: vec![String::from("ENABLED")],
            timeout_secs: default_wait_timeout(),
        }
    }

    /// Waits for a deleted resource to disappear.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            pending: vec![String::from("DELETING")],
            target: vec![String::from(ResourceState::NOT_FOUND)],
            timeout_secs: default_wait_timeout(),
        }
    }

    /// Looks up a built-in profile.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            PROFILE_PRESENT => Some(Self::present()),
            PROFILE_ABSENT => Some(Self::absent()),
            _ => None,
        }
    }

    /// Replaces the time budget.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Builds a poll spec with normalized states and the given polling policy.
    #[must_use]
    pub fn to_poll_spec(&self, polling: &PollingConfig) -> PollSpec {
        let normalize = |states: &[String]| -> Vec<ResourceState> {
            states.iter().map(|s| ResourceState::normalize(s)).collect()
        };

        PollSpec::new(
            normalize(&self.pending),
            normalize(&self.target),
            Duration::from_secs(self.timeout_secs),
        )
        .with_backoff(polling.backoff())
        .with_delay(Duration::from_millis(polling.delay_ms))
        .with_transient_retry_limit(polling.transient_retries)
        .with_continuous_target_occurrence(polling.continuous_target_occurrence)
    }
}

/// Tag reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagsConfig {
    /// Key prefixes never touched by reconciliation.
    #[serde(default = "default_reserved_prefixes")]
    pub reserved_prefixes: Vec<String>,
    /// Exact keys never touched by reconciliation.
    #[serde(default)]
    pub reserved_keys: Vec<String>,
    /// Tags applied underneath every desired set.
    #[serde(default)]
    pub defaults: TagSet,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            reserved_prefixes: default_reserved_prefixes(),
            reserved_keys: Vec::new(),
            defaults: TagSet::new(),
        }
    }
}

impl TagsConfig {
    /// The reserved-key predicate this section describes.
    #[must_use]
    pub fn reserved_keys(&self) -> ReservedKeys {
        self.reserved_keys
            .iter()
            .fold(ReservedKeys::with_prefixes(self.reserved_prefixes.clone()), |keys, key| {
                keys.with_key(key.clone())
            })
    }
}

fn default_reserved_prefixes() -> Vec<String> {
    vec![String::from(DEFAULT_RESERVED_PREFIX)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConvergeConfig {
        ConvergeConfig {
            api: ApiConfig::new("https://api.example.com"),
            polling: PollingConfig::default(),
            profiles: BTreeMap::new(),
            tags: TagsConfig::default(),
        }
    }

    #[test]
    fn test_builtin_profiles() {
        let config = config();
        let present = config.profile("present").expect("built-in");
        assert_eq!(present.target, vec![String::from("ENABLED")]);
        assert_eq!(present.timeout_secs, 300);

        let absent = config.profile("absent").expect("built-in");
        assert_eq!(absent.target, vec![String::from("NOT_FOUND")]);

        assert!(config.profile("nope").is_err());
    }

    #[test]
    fn test_config_profile_overrides_builtin() {
        let mut config = config();
        config.profiles.insert(
            String::from("present"),
            WaitProfile {
                pending: vec![String::from("creating")],
                target: vec![String::from("active")],
                timeout_secs: 60,
            },
        );

        let present = config.profile("present").expect("override");
        assert_eq!(present.timeout_secs, 60);
        assert_eq!(config.all_profiles().len(), 2);
    }

    #[test]
    fn test_poll_spec_normalizes_states() {
        let config = config();
        let profile = WaitProfile {
            pending: vec![String::from("in-progress")],
            target: vec![String::from("Ready")],
            timeout_secs: 10,
        };

        let spec = config.poll_spec(&profile);
        assert!(spec.pending.contains(&ResourceState::new("IN_PROGRESS")));
        assert!(spec.target.contains(&ResourceState::new("READY")));
        assert_eq!(spec.timeout, Duration::from_secs(10));
        assert_eq!(spec.transient_retry_limit, 3);
        assert_eq!(spec.backoff.initial, Duration::from_millis(2000));
    }

    #[test]
    fn test_reserved_keys_from_tags_section() {
        let tags = TagsConfig {
            reserved_prefixes: vec![String::from("sys:")],
            reserved_keys: vec![String::from("Name")],
            defaults: TagSet::new(),
        };
        let reserved = tags.reserved_keys();
        assert!(reserved.is_reserved("sys:x"));
        assert!(reserved.is_reserved("Name"));
        assert!(!reserved.is_reserved("aws:x"));
    }
}
