//! Declarative description of a single wait.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::status::{join_states, ResourceState};

use super::backoff::Backoff;

/// Default number of consecutive transient fetch errors tolerated.
const DEFAULT_TRANSIENT_RETRY_LIMIT: u32 = 3;

/// Where an observed state falls relative to a [`PollSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// Transient; keep waiting.
    Pending,
    /// Desired outcome.
    Target,
    /// Anything else; the wait fails immediately.
    Unexpected,
}

/// Parameters for one convergence wait.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSpec {
    /// States that are safe to keep waiting on.
    pub pending: BTreeSet<ResourceState>,
    /// States that end the wait successfully.
    pub target: BTreeSet<ResourceState>,
    /// Total time budget measured from the start of the wait.
    pub timeout: Duration,
    /// Wait before the first fetch.
    pub delay: Duration,
    /// Interval policy between fetches.
    pub backoff: Backoff,
    /// Consecutive transient fetch errors tolerated before failing.
    pub transient_retry_limit: u32,
    /// How many consecutive target observations are required.
    pub continuous_target_occurrence: u32,
}

impl PollSpec {
    /// Creates a spec with default backoff and retry settings.
    #[must_use]
    pub fn new<P, T>(pending: P, target: T, timeout: Duration) -> Self
    where
        P: IntoIterator,
        P::Item: Into<ResourceState>,
        T: IntoIterator,
        T::Item: Into<ResourceState>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout,
            delay: Duration::ZERO,
            backoff: Backoff::default(),
            transient_retry_limit: DEFAULT_TRANSIENT_RETRY_LIMIT,
            continuous_target_occurrence: 1,
        }
    }

    /// Sets the interval policy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets a fixed interval between fetches.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.backoff = Backoff::fixed(interval);
        self
    }

    /// Sets the wait before the first fetch.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the transient error budget.
    #[must_use]
    pub const fn with_transient_retry_limit(mut self, limit: u32) -> Self {
        self.transient_retry_limit = limit;
        self
    }

    /// Requires the target to be seen this many times in a row.
    #[must_use]
    pub const fn with_continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count;
        self
    }

    /// Classifies an observed state. Target wins over pending.
    #[must_use]
    pub fn classify(&self, state: &ResourceState) -> StateClass {
        if self.target.contains(state) {
            StateClass::Target
        } else if self.pending.contains(state) {
            StateClass::Pending
        } else {
            StateClass::Unexpected
        }
    }

    /// Target states joined for messages.
    #[must_use]
    pub fn expected(&self) -> String {
        join_states(&self.target)
    }

    /// Checks that the spec describes a wait that can succeed.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty target set, a zero timeout, an
    /// initial delay that uses up the whole timeout, a zero poll interval, a
    /// zero occurrence count, or a state listed as both pending and target.
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(ConfigError::validation("target states cannot be empty", "target").into());
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::validation("timeout must be greater than zero", "timeout").into());
        }

        if self.delay >= self.timeout {
            return Err(ConfigError::validation(
                format!(
                    "initial delay {:?} must be shorter than the timeout {:?}",
                    self.delay, self.timeout
                ),
                "delay",
            )
            .into());
        }

        if self.backoff.initial.is_zero() {
            return Err(ConfigError::validation("poll interval must be greater than zero", "interval").into());
        }

        if self.continuous_target_occurrence == 0 {
            return Err(ConfigError::validation(
                "continuous target occurrence must be at least 1",
                "continuous_target_occurrence",
            )
            .into());
        }

        let overlap: Vec<&ResourceState> = self.pending.intersection(&self.target).collect();
        if !overlap.is_empty() {
            return Err(ConfigError::validation(
                format!("states listed as both pending and target: {}", join_states(overlap)),
                "pending",
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let spec = PollSpec::new(["DELETING"], [ResourceState::NOT_FOUND], Duration::from_secs(60));
        assert_eq!(spec.classify(&ResourceState::new("DELETING")), StateClass::Pending);
        assert_eq!(spec.classify(&ResourceState::not_found()), StateClass::Target);
        assert_eq!(spec.classify(&ResourceState::new("FAILED")), StateClass::Unexpected);
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let spec = PollSpec::new(["PENDING", "READY"], ["READY"], Duration::from_secs(60));
        let err = spec.validate().expect_err("overlap must be rejected");
        assert!(err.to_string().contains("READY"));
    }

    #[test]
    fn test_validate_rejects_degenerate_specs() {
        let no_target = PollSpec::new(["PENDING"], Vec::<&str>::new(), Duration::from_secs(60));
        assert!(no_target.validate().is_err());

        let no_time = PollSpec::new(["PENDING"], ["READY"], Duration::ZERO);
        assert!(no_time.validate().is_err());

        let no_occurrence = PollSpec::new(["PENDING"], ["READY"], Duration::from_secs(1))
            .with_continuous_target_occurrence(0);
        assert!(no_occurrence.validate().is_err());

        let no_interval = PollSpec::new(["PENDING"], ["READY"], Duration::from_secs(1))
            .with_backoff(Backoff::new(Duration::ZERO, Duration::ZERO));
        let err = no_interval.validate().expect_err("zero interval must be rejected");
        assert!(err.to_string().contains("interval"));

        let late_start = PollSpec::new(["PENDING"], ["READY"], Duration::from_secs(60))
            .with_delay(Duration::from_secs(60));
        let err = late_start.validate().expect_err("delay must leave time to poll");
        assert!(err.to_string().contains("delay"));
    }

    #[test]
    fn test_expected_lists_targets() {
        let spec = PollSpec::new(["PENDING"], ["READY", "INCOMPLETE"], Duration::from_secs(1));
        assert_eq!(spec.expected(), "INCOMPLETE, READY");
        assert!(spec.validate().is_ok());
    }
}
