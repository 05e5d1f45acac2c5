//! Fixture-driven scenario runs.
//!
//! A [`ScenarioFixture`] names the resources a scenario creates; the
//! [`SuiteHarness`] allocates a namespace, runs the scenario and releases
//! what it created.

pub mod fixture;
pub mod harness;

pub use fixture::{ReleaseNames, ScenarioFixture, ScenarioKind, TestRepo};
pub use harness::{ScenarioResult, SuiteHarness};
