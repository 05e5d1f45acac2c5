//! Typed access and domain lookups on top of a [`ResourceAccessor`].

use std::sync::Arc;

use crate::resource::{
    keys, DeploymentTargetClass, Environment, Object, PipelineRun, Resource, ResourceRef,
    Snapshot, SnapshotEnvironmentBinding,
};

use super::{AccessError, LabelSelector, ResourceAccessor};

/// How to locate a Snapshot.
#[derive(Debug, Clone, Copy)]
pub enum SnapshotLookup<'a> {
    /// By exact name.
    Name(&'a str),
    /// Created from the given build PipelineRun.
    BuildPipelineRun(&'a str),
    /// Containing the given component.
    Component(&'a str),
}

/// Typed handle on the control plane, cheap to clone.
#[derive(Clone)]
pub struct Client {
    accessor: Arc<dyn ResourceAccessor>,
}

impl Client {
    pub fn new(accessor: Arc<dyn ResourceAccessor>) -> Self {
        Self { accessor }
    }

    pub fn accessor(&self) -> &Arc<dyn ResourceAccessor> {
        &self.accessor
    }

    pub async fn create<T: Resource>(&self, resource: &T) -> Result<T, AccessError> {
        let object = Object::from_resource(resource).map_err(encode_error::<T>)?;
        let created = self.accessor.create(object).await?;
        decode(created)
    }

    pub async fn get<T: Resource>(&self, name: &str, namespace: &str) -> Result<T, AccessError> {
        decode(self.accessor.get(T::KIND, name, namespace).await?)
    }

    pub async fn list<T: Resource>(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<T>, AccessError> {
        self.accessor
            .list(T::KIND, namespace, selector)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn delete<T: Resource>(&self, name: &str, namespace: &str) -> Result<(), AccessError> {
        self.accessor.delete(T::KIND, name, namespace).await
    }

    /// Deletes by identity; an already-absent resource counts as deleted.
    pub async fn delete_ref(&self, target: &ResourceRef) -> Result<(), AccessError> {
        match self
            .accessor
            .delete(target.kind, &target.name, &target.namespace)
            .await
        {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// Reads an untyped object by identity.
    pub async fn get_ref(&self, target: &ResourceRef) -> Result<Object, AccessError> {
        self.accessor
            .get(target.kind, &target.name, &target.namespace)
            .await
    }

    /// Most recent build PipelineRun for a component.
    pub async fn build_pipeline_run(
        &self,
        component: &str,
        application: &str,
        namespace: &str,
    ) -> Result<PipelineRun, AccessError> {
        let selector = LabelSelector::everything()
            .eq(keys::COMPONENT, component)
            .eq(keys::APPLICATION, application)
            .eq(keys::PIPELINE_TYPE, keys::PIPELINE_TYPE_BUILD);
        let runs: Vec<PipelineRun> = self.list(namespace, &selector).await?;
        most_recent(runs).ok_or_else(|| {
            AccessError::no_match(
                PipelineRun::KIND,
                format!(
                    "no build pipelinerun found for component {} (application: {}, namespace: {})",
                    component, application, namespace
                ),
            )
        })
    }

    /// Integration test PipelineRun started for a scenario and snapshot.
    pub async fn integration_pipeline_run(
        &self,
        scenario: &str,
        snapshot: &str,
        namespace: &str,
    ) -> Result<PipelineRun, AccessError> {
        let selector = LabelSelector::everything()
            .eq(keys::SCENARIO, scenario)
            .eq(keys::SNAPSHOT, snapshot)
            .eq(keys::PIPELINE_TYPE, keys::PIPELINE_TYPE_TEST);
        let runs: Vec<PipelineRun> = self.list(namespace, &selector).await?;
        most_recent(runs).ok_or_else(|| {
            AccessError::no_match(
                PipelineRun::KIND,
                format!(
                    "no pipelinerun found for integrationTestScenario {} (snapshot: {}, namespace: {})",
                    scenario, snapshot, namespace
                ),
            )
        })
    }

    pub async fn find_snapshot(
        &self,
        lookup: SnapshotLookup<'_>,
        namespace: &str,
    ) -> Result<Snapshot, AccessError> {
        let selector = match lookup {
            SnapshotLookup::Name(name) => return self.get(name, namespace).await,
            SnapshotLookup::BuildPipelineRun(run) => {
                LabelSelector::everything().eq(keys::BUILD_PIPELINE_RUN, run)
            }
            SnapshotLookup::Component(component) => {
                LabelSelector::everything().eq(keys::COMPONENT, component)
            }
        };
        let snapshots: Vec<Snapshot> = self.list(namespace, &selector).await?;
        most_recent(snapshots).ok_or_else(|| {
            AccessError::no_match(
                Snapshot::KIND,
                format!("no snapshot found for {:?} in namespace {}", lookup, namespace),
            )
        })
    }

    /// Ephemeral Environment provisioned for a snapshot and scenario.
    pub async fn ephemeral_environment(
        &self,
        application: &str,
        snapshot: &str,
        scenario: &str,
        namespace: &str,
    ) -> Result<Environment, AccessError> {
        let selector = LabelSelector::everything()
            .eq(keys::APPLICATION, application)
            .eq(keys::SNAPSHOT, snapshot)
            .eq(keys::SCENARIO, scenario);
        let envs: Vec<Environment> = self.list(namespace, &selector).await?;
        envs.into_iter().find(Environment::is_ephemeral).ok_or_else(|| {
            AccessError::no_match(
                Environment::KIND,
                format!(
                    "no ephemeral Environment found for snapshot {} and scenario {} in namespace {}",
                    snapshot, scenario, namespace
                ),
            )
        })
    }

    pub async fn snapshot_environment_binding(
        &self,
        application: &str,
        namespace: &str,
        environment: &str,
    ) -> Result<SnapshotEnvironmentBinding, AccessError> {
        let bindings: Vec<SnapshotEnvironmentBinding> =
            self.list(namespace, &LabelSelector::everything()).await?;
        bindings
            .into_iter()
            .find(|b| b.spec.application == application && b.spec.environment == environment)
            .ok_or_else(|| {
                AccessError::no_match(
                    SnapshotEnvironmentBinding::KIND,
                    format!(
                        "no SnapshotEnvironmentBinding found for application {} and environment {} in namespace {}",
                        application, environment, namespace
                    ),
                )
            })
    }

    /// The DeploymentTargetClass ephemeral environments can be provisioned from, if any.
    pub async fn available_deployment_target_class(
        &self,
    ) -> Result<Option<DeploymentTargetClass>, AccessError> {
        let classes: Vec<DeploymentTargetClass> =
            self.list("", &LabelSelector::everything()).await?;
        Ok(classes
            .into_iter()
            .find(|c| c.spec.provisioner == keys::SANDBOX_PROVISIONER))
    }

    /// Release PipelineRun running in the managed namespace for a release.
    pub async fn release_pipeline_run(
        &self,
        managed_namespace: &str,
        release: &str,
        release_namespace: &str,
    ) -> Result<PipelineRun, AccessError> {
        let selector = LabelSelector::everything()
            .eq(keys::RELEASE_NAME, release)
            .eq(keys::RELEASE_NAMESPACE, release_namespace);
        let runs: Vec<PipelineRun> = self.list(managed_namespace, &selector).await?;
        most_recent(runs).ok_or_else(|| {
            AccessError::no_match(
                PipelineRun::KIND,
                format!(
                    "no release pipelinerun found for release {}/{} in namespace {}",
                    release_namespace, release, managed_namespace
                ),
            )
        })
    }
}

fn decode<T: Resource>(object: Object) -> Result<T, AccessError> {
    object
        .into_resource()
        .map_err(|e| AccessError::Invalid(format!("failed to decode {}: {}", T::KIND, e)))
}

fn encode_error<T: Resource>(e: serde_json::Error) -> AccessError {
    AccessError::Invalid(format!("failed to encode {}: {}", T::KIND, e))
}

/// Picks the newest resource by creation time, then by name.
fn most_recent<T: Resource>(items: Vec<T>) -> Option<T> {
    items.into_iter().max_by(|a, b| {
        a.metadata()
            .creation_timestamp
            .cmp(&b.metadata().creation_timestamp)
            .then_with(|| a.name().cmp(b.name()))
    })
}
