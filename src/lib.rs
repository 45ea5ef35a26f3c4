// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Halldyll Converge
//!
//! State-convergence polling and tag reconciliation for cloud resources that
//! change state asynchronously.
//!
//! ## Overview
//!
//! Remote control planes accept a create or delete request and then move the
//! resource through intermediate states on their own schedule. This crate
//! lets you:
//!
//! - Wait until a resource reaches a target state, with backoff, a time
//!   budget, cancellation and fail-fast handling of unexpected states
//! - Treat "the resource does not exist" as an ordinary state
//! - Bring a resource's tags in line with a desired set using the fewest
//!   remove and upsert calls, never touching provider-reserved keys
//!
//! ## Modules
//!
//! - [`poller`]: The convergence state machine and its building blocks
//! - [`tags`]: Tag sets, diffs and reconciliation
//! - [`api`]: The remote resource seam and its HTTP client
//! - [`waiter`]: Profile-driven waits on top of the poller
//! - [`status`]: Resource states and normalization
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! api:
//!   base_url: https://api.example.com/v1
//!   status_field: Hub.Status
//!   token_env: CONVERGE_API_TOKEN
//!
//! profiles:
//!   present:
//!     pending: [NOT_FOUND, PENDING]
//!     target: [ENABLED, INCOMPLETE]
//!     timeout_secs: 300
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod poller;
pub mod status;
pub mod tags;
pub mod waiter;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{HttpResourceClient, ResourceApi, ResourceView};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ConvergeConfig, WaitProfile};
pub use error::{ConvergeError, Result};
pub use poller::{cancellation, Backoff, CancelHandle, CancelSignal, PollOutcome, PollSpec, Poller};
pub use status::{Observation, ResourceState};
pub use tags::{reconcile_tags, ReservedKeys, TagDiff, TagReconciler, TagSet};
pub use waiter::ResourceWaiter;
