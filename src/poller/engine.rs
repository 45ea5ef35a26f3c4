//! The polling state machine.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{ConvergeError, Result, WaitError};
use crate::status::{Observation, ResourceState};

use super::cancel::CancelSignal;
use super::clock::{Clock, TokioClock};
use super::spec::{PollSpec, StateClass};

/// Successful end of a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome<T> {
    /// The target state that was reached.
    pub state: ResourceState,
    /// Payload from the final observation.
    pub payload: Option<T>,
    /// Number of fetch calls made.
    pub attempts: u32,
    /// Time spent waiting.
    pub elapsed: Duration,
}

/// Bookkeeping for one run of the state machine.
struct PollRun<'a> {
    resource: &'a str,
    spec: &'a PollSpec,
    started: Instant,
    attempts: u32,
    transient_failures: u32,
    target_streak: u32,
    waits: u32,
    last_state: Option<ResourceState>,
}

impl PollRun<'_> {
    fn cancelled(&self, elapsed: Duration) -> ConvergeError {
        WaitError::Cancelled {
            resource: self.resource.to_string(),
            last_state: self.last_state.clone(),
            elapsed,
        }
        .into()
    }

    fn fetch_failed(&self, source: ConvergeError) -> ConvergeError {
        WaitError::FetchFailed {
            resource: self.resource.to_string(),
            attempts: self.transient_failures.max(1),
            last_state: self.last_state.clone(),
            source: Box::new(source),
        }
        .into()
    }

    fn timed_out(&self, elapsed: Duration) -> ConvergeError {
        WaitError::Timeout {
            resource: self.resource.to_string(),
            expected: self.spec.expected(),
            last_state: self.last_state.clone(),
            attempts: self.attempts,
            elapsed,
        }
        .into()
    }
}

/// Drives a resource to a target state by repeated status fetches.
///
/// The poller holds no state between calls; one instance can serve any
/// number of concurrent waits.
#[derive(Debug, Clone, Default)]
pub struct Poller<C = TokioClock> {
    clock: C,
}

impl Poller<TokioClock> {
    /// Creates a poller on the tokio timer.
    #[must_use]
    pub const fn new() -> Self {
        Self { clock: TokioClock }
    }
}

impl<C: Clock> Poller<C> {
    /// Creates a poller on a custom clock.
    #[must_use]
    pub const fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    /// Returns the clock.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Polls `fetch` until the resource reaches a target state.
    ///
    /// Fetches are strictly sequential. Pending states sleep according to the
    /// spec's backoff; a state outside both sets fails immediately; transient
    /// fetch errors are retried up to the `PollSpec` budget. Both cancellation
    /// and the timeout are honored while sleeping and while a fetch is in
    /// flight.
    ///
    /// # Errors
    ///
    /// Returns a [`WaitError`] (`Timeout`, `UnexpectedState`, `FetchFailed`
    /// or `Cancelled`) or a validation error for an invalid spec.
    pub async fn poll<T, F, Fut>(
        &self,
        resource: &str,
        spec: &PollSpec,
        cancel: &CancelSignal,
        mut fetch: F,
    ) -> Result<PollOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Observation<T>>>,
    {
        spec.validate()?;

        let mut run = PollRun {
            resource,
            spec,
            started: self.clock.now(),
            attempts: 0,
            transient_failures: 0,
            target_streak: 0,
            waits: 0,
            last_state: None,
        };

        debug!(
            "Waiting for {resource} to reach [{}] (timeout {:?})",
            spec.expected(),
            spec.timeout
        );

        if !spec.delay.is_zero() && !self.sleep_or_cancel(spec.delay, cancel).await {
            return Err(run.cancelled(self.elapsed(&run)));
        }

        loop {
            if cancel.is_cancelled() {
                return Err(run.cancelled(self.elapsed(&run)));
            }

            run.attempts += 1;
            let remaining = spec.timeout.saturating_sub(self.elapsed(&run));
            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(run.cancelled(self.elapsed(&run))),
                result = fetch() => result,
                () = self.clock.sleep(remaining) => {
                    let elapsed = self.elapsed(&run);
                    warn!("Timed out waiting for {resource} after {elapsed:?} with a fetch in flight");
                    return Err(run.timed_out(elapsed));
                }
            };

            let mut hint = None;
            match fetched {
                Ok(observation) => {
                    run.transient_failures = 0;
                    let state = observation.state;

                    match spec.classify(&state) {
                        StateClass::Target => {
                            run.target_streak += 1;
                            if run.target_streak >= spec.continuous_target_occurrence {
                                let elapsed = self.elapsed(&run);
                                info!(
                                    "{resource} reached {state} after {} attempt(s) in {elapsed:?}",
                                    run.attempts
                                );
                                return Ok(PollOutcome {
                                    state,
                                    payload: observation.payload,
                                    attempts: run.attempts,
                                    elapsed,
                                });
                            }
                            debug!(
                                "{resource} in target state {state} ({}/{})",
                                run.target_streak, spec.continuous_target_occurrence
                            );
                        }
                        StateClass::Pending => {
                            run.target_streak = 0;
                            debug!("{resource} still pending: {state}");
                        }
                        StateClass::Unexpected => {
                            let elapsed = self.elapsed(&run);
                            warn!("{resource} entered unexpected state {state}");
                            return Err(WaitError::UnexpectedState {
                                resource: resource.to_string(),
                                state,
                                expected: spec.expected(),
                                elapsed,
                            }
                            .into());
                        }
                    }

                    run.last_state = Some(state);
                }
                Err(err) if err.is_retryable() => {
                    run.transient_failures += 1;
                    if run.transient_failures > spec.transient_retry_limit {
                        return Err(run.fetch_failed(err));
                    }
                    warn!(
                        "Transient error fetching {resource} ({}/{}): {err}",
                        run.transient_failures, spec.transient_retry_limit
                    );
                    hint = err.retry_delay_secs().map(Duration::from_secs);
                }
                Err(err) => return Err(run.fetch_failed(err)),
            }

            let elapsed = self.elapsed(&run);
            if elapsed >= spec.timeout {
                warn!("Timed out waiting for {resource} after {elapsed:?}");
                return Err(run.timed_out(elapsed));
            }

            let remaining = spec.timeout.saturating_sub(elapsed);
            let backoff = spec.backoff.delay(run.waits);
            let wait = hint.map_or(backoff, |h| h.max(backoff)).min(remaining);
            run.waits += 1;

            if !self.sleep_or_cancel(wait, cancel).await {
                return Err(run.cancelled(self.elapsed(&run)));
            }
        }
    }

    fn elapsed(&self, run: &PollRun<'_>) -> Duration {
        self.clock.now().saturating_duration_since(run.started)
    }

    /// Sleeps unless cancelled first. Returns false on cancellation.
    async fn sleep_or_cancel(&self, duration: Duration, cancel: &CancelSignal) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = self.clock.sleep(duration) => true,
        }
    }
}
