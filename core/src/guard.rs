//! Scoped ownership of the resources a scenario creates.
//!
//! Every resource a scenario creates is tracked here. Releasing the guard
//! deletes them children first, then roots, then provisioning resources, and
//! awaits asynchronous deletions through the poller. On failure namespaced
//! resources are kept for diagnosis.

use serde::Serialize;

use crate::accessor::{Client, LabelSelector};
use crate::config::{StepTiming, TeardownPolicy};
use crate::converge::{await_condition, predicate, Observed, Predicate, Verdict};
use crate::resource::{Object, ResourceKind, ResourceRef};

/// Teardown order. Lower classes are deleted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownClass {
    /// Environments, snapshots, scenarios and other dependents.
    Child,
    /// Applications and components.
    Root,
    /// Cluster-level provisioning resources.
    Provisioning,
}

/// Whether a tracked resource survives a failed scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Follow the teardown policy.
    Policy,
    /// Delete regardless of outcome.
    Never,
}

/// What to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownTarget {
    Resource(ResourceRef),
    /// Every object of a kind in a namespace, including ones the platform created.
    AllOfKind { kind: ResourceKind, namespace: String },
}

impl std::fmt::Display for TeardownTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeardownTarget::Resource(target) => target.fmt(f),
            TeardownTarget::AllOfKind { kind, namespace } => write!(f, "all {} in {}", kind, namespace),
        }
    }
}

/// A tracked resource and how to release it.
#[derive(Debug, Clone)]
pub struct Tracked {
    pub target: TeardownTarget,
    pub class: TeardownClass,
    pub retention: Retention,
    /// Wait for the deletion to be observed.
    pub await_absence: Option<StepTiming>,
}

impl Tracked {
    pub fn new(target: ResourceRef, class: TeardownClass) -> Self {
        Self {
            target: TeardownTarget::Resource(target),
            class,
            retention: Retention::Policy,
            await_absence: None,
        }
    }

    pub fn all_of_kind(kind: ResourceKind, namespace: impl Into<String>, class: TeardownClass) -> Self {
        Self {
            target: TeardownTarget::AllOfKind {
                kind,
                namespace: namespace.into(),
            },
            class,
            retention: Retention::Policy,
            await_absence: None,
        }
    }

    pub fn awaiting(mut self, timing: StepTiming) -> Self {
        self.await_absence = Some(timing);
        self
    }

    pub fn always_released(mut self) -> Self {
        self.retention = Retention::Never;
        self
    }
}

/// What releasing a guard did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    pub deleted: Vec<TeardownTarget>,
    pub retained: Vec<TeardownTarget>,
    pub errors: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Tracks scenario resources and guarantees they are either released or
/// reported as left behind.
#[derive(Debug)]
pub struct LifecycleGuard {
    scope: String,
    tracked: Vec<Tracked>,
    released: bool,
}

impl LifecycleGuard {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tracked: Vec::new(),
            released: false,
        }
    }

    pub fn track(&mut self, tracked: Tracked) {
        tracing::debug!(scope = %self.scope, resource = %tracked.target, class = ?tracked.class, "tracking resource");
        self.tracked.push(tracked);
    }

    pub fn tracked(&self) -> &[Tracked] {
        &self.tracked
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Deletes tracked resources according to `policy` and the scenario outcome.
    ///
    /// Within a class, resources are deleted in reverse creation order. A failed
    /// deletion is recorded and teardown carries on with the next resource.
    pub async fn release(&mut self, client: &Client, policy: TeardownPolicy, failed: bool) -> TeardownReport {
        let mut report = TeardownReport::default();
        if self.released {
            return report;
        }
        self.released = true;

        let delete_namespaced = policy.applies(failed);
        let mut order: Vec<(usize, Tracked)> = std::mem::take(&mut self.tracked).into_iter().enumerate().collect();
        order.sort_by(|(ia, a), (ib, b)| a.class.cmp(&b.class).then(ib.cmp(ia)));

        for (_, tracked) in order {
            if tracked.retention == Retention::Policy && !delete_namespaced {
                report.retained.push(tracked.target);
                continue;
            }

            tracing::info!(scope = %self.scope, resource = %tracked.target, "deleting");
            match release_one(client, &tracked).await {
                Ok(()) => report.deleted.push(tracked.target),
                Err(e) => {
                    tracing::warn!(scope = %self.scope, resource = %tracked.target, error = %e, "teardown failed");
                    report.errors.push(format!("{}: {}", tracked.target, e));
                }
            }
        }

        if !report.retained.is_empty() {
            tracing::warn!(
                scope = %self.scope,
                failed,
                retained = report.retained.len(),
                "teardown skipped, resources kept"
            );
        }
        report
    }
}

async fn release_one(client: &Client, tracked: &Tracked) -> Result<(), String> {
    match &tracked.target {
        TeardownTarget::Resource(target) => {
            client.delete_ref(target).await.map_err(|e| e.to_string())?;
            if let Some(timing) = tracked.await_absence {
                let gone = predicate::absent::<Object>(format!("{} deleted", target));
                await_condition(move || client.get_ref(target), &gone, timing.poll())
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
        TeardownTarget::AllOfKind { kind, namespace } => {
            let kind = *kind;
            let everything = LabelSelector::everything();
            let selector = &everything;
            let objects = client
                .accessor()
                .list(kind, namespace, selector)
                .await
                .map_err(|e| e.to_string())?;
            for object in objects {
                client
                    .delete_ref(&object.resource_ref())
                    .await
                    .map_err(|e| e.to_string())?;
            }
            if let Some(timing) = tracked.await_absence {
                let empty = all_deleted(kind, namespace);
                await_condition(
                    move || client.accessor().list(kind, namespace, selector),
                    &empty,
                    timing.poll(),
                )
                .await
                .map_err(|e| e.to_string())?;
            }
        }
    }
    Ok(())
}

fn all_deleted(kind: ResourceKind, namespace: &str) -> Predicate<Vec<Object>> {
    Predicate::new(
        format!("all {} in {} deleted", kind, namespace),
        |observed: Observed<'_, Vec<Object>>| match observed {
            Observed::Present(objects) if !objects.is_empty() => Verdict::NotYet,
            _ => Verdict::Satisfied,
        },
    )
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        if !self.released && !self.tracked.is_empty() {
            tracing::warn!(
                scope = %self.scope,
                count = self.tracked.len(),
                "lifecycle guard dropped without release, resources left behind"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::accessor::InMemoryAccessor;
    use crate::resource::{Application, Component, DeploymentTargetClass, Environment, Resource};

    async fn setup() -> (Client, LifecycleGuard) {
        let client = Client::new(Arc::new(InMemoryAccessor::new()));
        let mut guard = LifecycleGuard::new("test");

        let app = client.create(&Application::new("app", "ns")).await.unwrap();
        guard.track(Tracked::new(app.resource_ref(), TeardownClass::Root));
        let class = client.create(&DeploymentTargetClass::sandbox("sandbox")).await.unwrap();
        guard.track(Tracked::new(class.resource_ref(), TeardownClass::Provisioning).always_released());
        let comp = client
            .create(&Component::new("comp", "ns", "app", "https://example.com/repo"))
            .await
            .unwrap();
        guard.track(Tracked::new(comp.resource_ref(), TeardownClass::Root));
        let env = client.create(&Environment::poc("env", "ns")).await.unwrap();
        guard.track(
            Tracked::new(env.resource_ref(), TeardownClass::Child)
                .awaiting(StepTiming::new(10, 1_000)),
        );

        (client, guard)
    }

    fn names(targets: &[TeardownTarget]) -> Vec<String> {
        targets
            .iter()
            .map(|t| match t {
                TeardownTarget::Resource(r) => r.name.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn release_deletes_children_then_roots_then_provisioning() {
        let (client, mut guard) = setup().await;

        let report = guard.release(&client, TeardownPolicy::default(), false).await;

        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(names(&report.deleted), vec!["env", "comp", "app", "sandbox"]);
        assert!(report.retained.is_empty());
        assert!(guard.is_released());
        assert!(client.get::<Application>("app", "ns").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_namespaced_resources_but_releases_class() {
        let (client, mut guard) = setup().await;

        let report = guard.release(&client, TeardownPolicy::default(), true).await;

        assert_eq!(names(&report.deleted), vec!["sandbox"]);
        assert_eq!(names(&report.retained), vec!["env", "comp", "app"]);
        assert!(client.get::<Environment>("env", "ns").await.is_ok());
        assert!(client.get::<DeploymentTargetClass>("sandbox", "").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn already_deleted_resource_is_not_an_error() {
        let (client, mut guard) = setup().await;
        client.delete::<Environment>("env", "ns").await.unwrap();

        let report = guard.release(&client, TeardownPolicy::default(), false).await;
        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn release_all_of_kind_includes_untracked_objects() {
        let client = Client::new(Arc::new(InMemoryAccessor::new()));
        client.create(&Environment::poc("a", "ns")).await.unwrap();
        client.create(&Environment::poc("b", "ns")).await.unwrap();
        client.create(&Environment::poc("c", "other")).await.unwrap();

        let mut guard = LifecycleGuard::new("test");
        guard.track(
            Tracked::all_of_kind(ResourceKind::Environment, "ns", TeardownClass::Child)
                .awaiting(StepTiming::new(30, 1_000)),
        );
        let report = guard.release(&client, TeardownPolicy::default(), false).await;

        assert!(report.is_clean());
        let remaining = client
            .list::<Environment>("ns", &LabelSelector::everything())
            .await
            .unwrap();
        assert!(remaining.is_empty());
        assert!(client.get::<Environment>("c", "other").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn second_release_is_a_no_op() {
        let (client, mut guard) = setup().await;
        guard.release(&client, TeardownPolicy::default(), false).await;

        let report = guard.release(&client, TeardownPolicy::default(), false).await;
        assert!(report.deleted.is_empty());
        assert!(report.errors.is_empty());
    }
}
