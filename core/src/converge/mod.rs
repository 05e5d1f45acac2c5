//! Waiting for the platform to converge.
//!
//! A wait is a fetch function, a [`Predicate`] and a [`PollConfig`]. The
//! [`await_condition`] loop ties them together and reports either the
//! satisfying state or a [`ConvergenceError`] carrying the last observation.

mod monitor;
pub mod predicate;
mod poller;

pub use monitor::{LastObservation, PollMonitor, PollSummary};
pub use poller::{await_condition, Converged, ConvergenceError, Failure, PollConfig};
pub use predicate::{Correlation, Observed, Predicate, Verdict};
