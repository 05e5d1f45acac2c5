//! Step records, step errors and failure diagnostics.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::accessor::AccessError;
use crate::converge::{ConvergenceError, LastObservation};
use crate::resource::{ResourceKind, ResourceRef};

/// What a step does to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Creates a resource. Never retried.
    Mutation,
    /// Waits for the platform to converge.
    Convergence,
    /// Reads the current state once and asserts on it.
    Check,
}

/// Budget of a single create or read call.
pub const CALL_BUDGET: Duration = Duration::from_secs(30);

/// A step as planned by a scenario.
#[derive(Debug, Clone)]
pub struct PlannedStep<S> {
    pub step: S,
    pub name: &'static str,
    pub kind: StepKind,
    /// Time the step may take; counts towards the scenario deadline.
    pub budget: Duration,
}

impl<S> PlannedStep<S> {
    pub fn mutation(name: &'static str, step: S) -> Self {
        Self {
            step,
            name,
            kind: StepKind::Mutation,
            budget: CALL_BUDGET,
        }
    }

    pub fn convergence(name: &'static str, step: S, budget: Duration) -> Self {
        Self {
            step,
            name,
            kind: StepKind::Convergence,
            budget,
        }
    }

    pub fn check(name: &'static str, step: S) -> Self {
        Self {
            step,
            name,
            kind: StepKind::Check,
            budget: CALL_BUDGET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum StepOutcome {
    Passed,
    Failed(String),
    /// Not run because an earlier step failed.
    Skipped,
}

/// What happened to one step of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub kind: StepKind,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub elapsed_ms: u64,
}

/// Why a step failed.
#[derive(Error, Debug)]
pub enum StepError {
    /// A create call was rejected.
    #[error("failed to create {target}: {source}")]
    Mutation {
        target: ResourceRef,
        #[source]
        source: AccessError,
    },

    /// A wait failed or timed out.
    #[error("{target}: {source}")]
    Convergence {
        target: ResourceRef,
        #[source]
        source: ConvergenceError,
    },

    /// A check read succeeded but the state was wrong.
    #[error("{message}")]
    Assertion {
        target: Option<ResourceRef>,
        message: String,
    },

    /// A check read failed with something other than the expected error.
    #[error("unexpected error reading {target}: {source}")]
    Access {
        target: ResourceRef,
        #[source]
        source: AccessError,
    },

    /// The scenario ran out of time before the step could start.
    #[error("scenario deadline of {deadline:?} exceeded before step '{step}'")]
    DeadlineExceeded { step: String, deadline: Duration },

    /// The step depends on state an earlier step should have recorded.
    #[error("scenario context has no {0}")]
    MissingContext(&'static str),
}

impl StepError {
    pub fn assertion(target: ResourceRef, message: impl Into<String>) -> Self {
        StepError::Assertion {
            target: Some(target),
            message: message.into(),
        }
    }

    /// Resource the step was about, if any.
    pub fn target(&self) -> Option<&ResourceRef> {
        match self {
            StepError::Mutation { target, .. }
            | StepError::Convergence { target, .. }
            | StepError::Access { target, .. } => Some(target),
            StepError::Assertion { target, .. } => target.as_ref(),
            StepError::DeadlineExceeded { .. } | StepError::MissingContext(_) => None,
        }
    }

    /// Builds the failure record handed to reporters.
    pub fn diagnostic(&self, step: &str, namespace: &str, step_elapsed: Duration) -> Diagnostic {
        let target = self.target();
        let (elapsed, last_state, last_error) = match self {
            StepError::Convergence { source, .. } => (
                source.summary.elapsed(),
                source.summary.last_observation.clone(),
                source.last_error.as_ref().map(ToString::to_string),
            ),
            StepError::Mutation { source, .. } | StepError::Access { source, .. } => {
                (step_elapsed, LastObservation::Never, Some(source.to_string()))
            }
            _ => (step_elapsed, LastObservation::Never, None),
        };

        Diagnostic {
            step: step.to_string(),
            kind: target.map(|t| t.kind),
            name: target
                .map(|t| t.name.clone())
                .filter(|name| !name.is_empty())
                .or_else(|| observed_name(&last_state)),
            namespace: target
                .filter(|t| !t.kind.is_cluster_scoped())
                .map_or_else(|| namespace.to_string(), |t| t.namespace.clone()),
            elapsed_ms: elapsed.as_millis() as u64,
            last_state,
            last_error,
            reason: self.to_string(),
        }
    }
}

/// Name of the last observed entity, for lookups that started without one.
fn observed_name(last_state: &LastObservation) -> Option<String> {
    match last_state {
        LastObservation::Present(value) => value["metadata"]["name"]
            .as_str()
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Structured record of a failed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub step: String,
    pub kind: Option<ResourceKind>,
    pub name: Option<String>,
    pub namespace: String,
    pub elapsed_ms: u64,
    pub last_state: LastObservation,
    pub last_error: Option<String>,
    pub reason: String,
}
