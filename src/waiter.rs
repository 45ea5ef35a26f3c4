//! Waiting on remote resources by profile.
//!
//! A [`ResourceWaiter`] ties the poller to a [`ResourceApi`]: it resolves a
//! named [`WaitProfile`], builds the poll spec from the polling policy and
//! polls [`observe`] until the resource converges.

use std::collections::BTreeMap;
use tracing::debug;

use crate::api::{observe, ResourceApi, ResourceView};
use crate::config::{ConvergeConfig, PollingConfig, WaitProfile, PROFILE_ABSENT, PROFILE_PRESENT};
use crate::error::{ConfigError, Result};
use crate::poller::{CancelSignal, Clock, PollOutcome, Poller, TokioClock};

/// Waits for resources behind one API to reach profile-defined states.
pub struct ResourceWaiter<'a, A: ?Sized, C = TokioClock> {
    api: &'a A,
    poller: Poller<C>,
    polling: PollingConfig,
    profiles: BTreeMap<String, WaitProfile>,
}

impl<'a, A: ResourceApi + ?Sized> ResourceWaiter<'a, A, TokioClock> {
    /// Creates a waiter with default polling and the built-in profiles.
    #[must_use]
    pub fn new(api: &'a A) -> Self {
        Self::with_poller(api, Poller::new())
    }

    /// Creates a waiter using the polling section and profiles of a config.
    #[must_use]
    pub fn from_config(api: &'a A, config: &ConvergeConfig) -> Self {
        Self::new(api)
            .with_polling(config.polling.clone())
            .with_profiles(config.all_profiles())
    }
}

impl<'a, A: ResourceApi + ?Sized, C: Clock> ResourceWaiter<'a, A, C> {
    /// Creates a waiter on a specific poller.
    #[must_use]
    pub fn with_poller(api: &'a A, poller: Poller<C>) -> Self {
        let profiles = BTreeMap::from([
            (String::from(PROFILE_PRESENT), WaitProfile::present()),
            (String::from(PROFILE_ABSENT), WaitProfile::absent()),
        ]);

        Self {
            api,
            poller,
            polling: PollingConfig::default(),
            profiles,
        }
    }

    /// Replaces the polling policy.
    #[must_use]
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Adds or overrides named profiles.
    #[must_use]
    pub fn with_profiles(mut self, profiles: BTreeMap<String, WaitProfile>) -> Self {
        self.profiles.extend(profiles);
        self
    }

    /// Resolves a profile by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProfile`] for an unknown name.
    pub fn profile(&self, name: &str) -> Result<&WaitProfile> {
        self.profiles.get(name).ok_or_else(|| {
            ConfigError::UnknownProfile {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Polls a resource until it reaches one of the profile's target states.
    ///
    /// # Errors
    ///
    /// Returns a wait error when the resource does not converge.
    pub async fn wait_for(
        &self,
        id: &str,
        profile: &WaitProfile,
        cancel: &CancelSignal,
    ) -> Result<PollOutcome<ResourceView>> {
        let spec = profile.to_poll_spec(&self.polling);
        debug!(
            "Waiting on {id}: pending [{}], target [{}]",
            profile.pending.join(", "),
            profile.target.join(", ")
        );

        self.poller
            .poll(id, &spec, cancel, || observe(self.api, id))
            .await
    }

    /// Waits for a resource to exist and be enabled.
    ///
    /// # Errors
    ///
    /// Returns a wait error when the resource does not converge.
    pub async fn wait_until_present(
        &self,
        id: &str,
        cancel: &CancelSignal,
    ) -> Result<PollOutcome<ResourceView>> {
        let profile = self.profile(PROFILE_PRESENT)?;
        self.wait_for(id, profile, cancel).await
    }

    /// Waits for a resource to disappear.
    ///
    /// # Errors
    ///
    /// Returns a wait error when the resource does not converge.
    pub async fn wait_until_absent(
        &self,
        id: &str,
        cancel: &CancelSignal,
    ) -> Result<PollOutcome<ResourceView>> {
        let profile = self.profile(PROFILE_ABSENT)?;
        self.wait_for(id, profile, cancel).await
    }
}
