//! Scenario state machine.
//!
//! A scenario is a fixed, ordered list of mutation, convergence and check
//! steps. The [`ScenarioMachine`] runs them one after another against a
//! [`ScenarioContext`] and stops at the first failure.

mod context;
pub mod happy_path;
mod machine;
pub mod negative_path;
pub mod release;
mod step;

pub use context::{require, ScenarioContext};
pub use happy_path::HappyPath;
pub use machine::{Scenario, ScenarioMachine, ScenarioReport};
pub use negative_path::NegativePath;
pub use release::ReleasePath;
pub use step::{
    Diagnostic, PlannedStep, StepError, StepKind, StepOutcome, StepRecord, CALL_BUDGET,
};

use std::future::Future;

use serde::Serialize;

use crate::accessor::{AccessError, Client};
use crate::converge::{await_condition, PollConfig, Predicate};
use crate::resource::{Resource, ResourceRef};

/// Creates a resource; any rejection fails the step.
pub(crate) async fn create<T: Resource>(client: &Client, resource: &T) -> Result<T, StepError> {
    let created = client.create(resource).await.map_err(|source| StepError::Mutation {
        target: resource.resource_ref(),
        source,
    })?;
    tracing::info!(resource = %created.resource_ref(), "created");
    Ok(created)
}

/// Waits until `predicate` is satisfied by a present entity and returns it.
pub(crate) async fn await_present<T, F, Fut>(
    target: ResourceRef,
    fetch: F,
    predicate: &Predicate<T>,
    config: PollConfig,
) -> Result<T, StepError>
where
    T: Serialize,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AccessError>>,
{
    await_condition(fetch, predicate, config)
        .await
        .and_then(|converged| converged.into_present(predicate.name()))
        .map_err(|source| StepError::Convergence { target, source })
}

/// Waits until the entity is reported as not found.
pub(crate) async fn await_absent<T, F, Fut>(
    target: ResourceRef,
    fetch: F,
    predicate: &Predicate<T>,
    config: PollConfig,
) -> Result<(), StepError>
where
    T: Serialize,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AccessError>>,
{
    await_condition(fetch, predicate, config)
        .await
        .map(|_| ())
        .map_err(|source| StepError::Convergence { target, source })
}
