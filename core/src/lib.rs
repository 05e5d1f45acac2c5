//! AppStudio E2E - convergence verification for an eventually-consistent control plane
//!
//! This library creates platform resources, then waits for the control plane to
//! drive them through build, signing, snapshotting, ephemeral environments,
//! integration testing, teardown and release, within bounded time.

pub mod accessor;
pub mod config;
pub mod converge;
pub mod error;
pub mod guard;
pub mod namespace;
pub mod resource;
pub mod scenario;
pub mod suite;

pub use error::{Error, Result};

pub use accessor::{
    AccessError, Client, InMemoryAccessor, LabelSelector, PlatformBehavior, ResourceAccessor,
    SimulatedPlatform, SnapshotLookup,
};
pub use config::{
    StepTiming, SuiteConfig, TeardownPolicy, TimingConfig, Validate, ValidationResult,
};
pub use converge::{
    await_condition, Converged, ConvergenceError, Failure, LastObservation, PollConfig,
    PollSummary, Predicate, Verdict,
};
pub use guard::{LifecycleGuard, TeardownClass, TeardownReport, Tracked};
pub use namespace::{GeneratedNamespaces, NamespaceProvisioner};
pub use resource::{Object, ObjectMeta, Resource, ResourceKind, ResourceRef};
pub use scenario::{
    Diagnostic, HappyPath, NegativePath, ReleasePath, Scenario, ScenarioContext,
    ScenarioMachine, ScenarioReport, StepError, StepOutcome,
};
pub use suite::{ScenarioFixture, ScenarioKind, ScenarioResult, SuiteHarness};
