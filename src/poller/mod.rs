//! Convergence poller.
//!
//! This module drives a single resource from whatever state it is in to one
//! of a declared set of target states. A caller describes the wait
//! declaratively with a [`PollSpec`] and supplies a status-fetch capability;
//! the [`Poller`] does the rest (backoff, timeouts, cancellation and the
//! fail-fast policy for unexpected states).

mod backoff;
mod cancel;
mod clock;
mod engine;
mod spec;

pub use backoff::Backoff;
pub use cancel::{cancellation, CancelHandle, CancelSignal};
pub use clock::{Clock, ManualClock, TokioClock};
pub use engine::{PollOutcome, Poller};
pub use spec::{PollSpec, StateClass};
