//! Condition predicates.
//!
//! A predicate maps the latest observation of an entity to a [`Verdict`].
//! Presence predicates treat absence as a reason to keep waiting; absence
//! predicates treat it as success.

use std::fmt;

use crate::resource::{keys, ConditionStatus, PipelineRun, Release, Resource, Snapshot};

/// Outcome of evaluating a predicate against one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Satisfied,
    NotYet,
    /// Unambiguous terminal failure; waiting longer cannot help.
    Failed(String),
}

/// What a fetch reported about the awaited entity.
#[derive(Debug)]
pub enum Observed<'a, T> {
    Present(&'a T),
    /// The accessor reported NotFound.
    Absent,
}

type Check<T> = Box<dyn Fn(Observed<'_, T>) -> Verdict + Send + Sync>;

/// A named, first-class condition on observations of `T`.
pub struct Predicate<T> {
    name: String,
    check: Check<T>,
}

impl<T> Predicate<T> {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(Observed<'_, T>) -> Verdict + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, observed: Observed<'_, T>) -> Verdict {
        (self.check)(observed)
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

/// Satisfied as soon as the entity exists.
pub fn present<T: 'static>(name: impl Into<String>) -> Predicate<T> {
    Predicate::new(name, |observed: Observed<'_, T>| match observed {
        Observed::Present(_) => Verdict::Satisfied,
        Observed::Absent => Verdict::NotYet,
    })
}

/// Satisfied once the entity is reported as not found.
pub fn absent<T: 'static>(name: impl Into<String>) -> Predicate<T> {
    Predicate::new(name, |observed: Observed<'_, T>| match observed {
        Observed::Present(_) => Verdict::NotYet,
        Observed::Absent => Verdict::Satisfied,
    })
}

/// Satisfied when the run's `Succeeded` condition is True, failed when it is False.
pub fn pipeline_finished(name: impl Into<String>) -> Predicate<PipelineRun> {
    Predicate::new(name, |observed: Observed<'_, PipelineRun>| {
        let Observed::Present(run) = observed else {
            return Verdict::NotYet;
        };
        match run.succeeded_condition() {
            Some(c) if c.status == ConditionStatus::True => Verdict::Satisfied,
            Some(c) if c.status == ConditionStatus::False => Verdict::Failed(format!(
                "pipelinerun {}/{} failed: {}{}",
                run.namespace(),
                run.name(),
                c.reason.as_deref().unwrap_or("no reason given"),
                c.message
                    .as_deref()
                    .map(|m| format!(" ({})", m))
                    .unwrap_or_default()
            )),
            _ => Verdict::NotYet,
        }
    })
}

/// Satisfied when Chains marked the run as signed. Any other explicit value of
/// the signing annotation is a definitive failure; no annotation means not yet.
pub fn build_signed() -> Predicate<PipelineRun> {
    Predicate::new("build pipelinerun signed", |observed: Observed<'_, PipelineRun>| {
        let Observed::Present(run) = observed else {
            return Verdict::NotYet;
        };
        match run.metadata.annotation(keys::CHAINS_SIGNED) {
            None => Verdict::NotYet,
            Some("true") => Verdict::Satisfied,
            Some(other) => Verdict::Failed(format!(
                "pipelinerun {}/{} has {}={}",
                run.namespace(),
                run.name(),
                keys::CHAINS_SIGNED,
                other
            )),
        }
    })
}

/// Satisfied when a snapshot containing `component` exists. Never fails.
pub fn snapshot_created(component: impl Into<String>) -> Predicate<Snapshot> {
    let component = component.into();
    Predicate::new(
        format!("snapshot created for component {}", component),
        move |observed: Observed<'_, Snapshot>| match observed {
            Observed::Present(snapshot)
                if snapshot.metadata.label(keys::COMPONENT) == Some(component.as_str())
                    || snapshot.spec.components.iter().any(|c| c.name == component) =>
            {
                Verdict::Satisfied
            }
            _ => Verdict::NotYet,
        },
    )
}

/// Satisfied when the resource carries a non-empty annotation `key`. Never fails.
pub fn annotated<T: Resource>(key: &'static str) -> Predicate<T> {
    Predicate::new(format!("{} annotated with {}", T::KIND, key), move |observed: Observed<'_, T>| {
        match observed {
            Observed::Present(r) if r.metadata().annotation(key).is_some_and(|v| !v.is_empty()) => {
                Verdict::Satisfied
            }
            _ => Verdict::NotYet,
        }
    })
}

/// Expected correlation labels on an integration test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub component: Option<String>,
    pub snapshot: String,
    pub scenario: String,
    pub environment: Option<String>,
}

impl Correlation {
    /// Label pairs that must match exactly.
    pub fn expected(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            (keys::SNAPSHOT, self.snapshot.as_str()),
            (keys::SCENARIO, self.scenario.as_str()),
        ];
        if let Some(component) = &self.component {
            pairs.push((keys::COMPONENT, component.as_str()));
        }
        if let Some(env) = &self.environment {
            pairs.push((keys::ENVIRONMENT, env.as_str()));
        }
        pairs
    }
}

/// Satisfied when a test run with exactly the expected correlation exists.
/// A mismatch is treated as not yet, never as failure.
pub fn correlated_test_run(correlation: Correlation) -> Predicate<PipelineRun> {
    Predicate::new(
        format!(
            "integration pipelinerun started for scenario {} and snapshot {}",
            correlation.scenario, correlation.snapshot
        ),
        move |observed: Observed<'_, PipelineRun>| {
            let Observed::Present(run) = observed else {
                return Verdict::NotYet;
            };
            let matches = correlation
                .expected()
                .iter()
                .all(|(key, value)| run.metadata.label(key) == Some(*value));
            if matches {
                Verdict::Satisfied
            } else {
                tracing::debug!(run = %run.name(), labels = ?run.metadata.labels, "test pipelinerun correlation mismatch");
                Verdict::NotYet
            }
        },
    )
}

/// Satisfied when the snapshot's tests are marked as passed, failed otherwise.
/// Meant for after the test runs converged: the first readable snapshot decides.
pub fn tests_passed() -> Predicate<Snapshot> {
    Predicate::new("snapshot marked as passed", |observed: Observed<'_, Snapshot>| {
        match observed {
            Observed::Present(snapshot) if snapshot.tests_succeeded() => Verdict::Satisfied,
            Observed::Present(snapshot) => Verdict::Failed(format!(
                "tests have not succeeded for snapshot {}/{}",
                snapshot.namespace(),
                snapshot.name()
            )),
            Observed::Absent => Verdict::NotYet,
        }
    })
}

/// Inverse of [`tests_passed`] for paths where testing must not happen.
pub fn tests_not_passed() -> Predicate<Snapshot> {
    Predicate::new("snapshot not marked as passed", |observed: Observed<'_, Snapshot>| {
        match observed {
            Observed::Present(snapshot) if snapshot.tests_succeeded() => Verdict::Failed(format!(
                "snapshot {}/{} is unexpectedly marked as passed",
                snapshot.namespace(),
                snapshot.name()
            )),
            Observed::Present(_) => Verdict::Satisfied,
            Observed::Absent => Verdict::NotYet,
        }
    })
}

/// Satisfied when the release reports `Succeeded`, failed when it reports failure.
pub fn release_succeeded() -> Predicate<Release> {
    Predicate::new("release succeeded", |observed: Observed<'_, Release>| {
        let Observed::Present(release) = observed else {
            return Verdict::NotYet;
        };
        match release.succeeded_condition().map(|c| c.status) {
            Some(ConditionStatus::True) => Verdict::Satisfied,
            Some(ConditionStatus::False) => {
                Verdict::Failed(format!("release {}/{} failed", release.namespace(), release.name()))
            }
            _ => Verdict::NotYet,
        }
    })
}
