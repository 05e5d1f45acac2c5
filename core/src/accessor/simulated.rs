//! Simulated platform that reconciles resources in reaction to accessor traffic.
//!
//! Every read runs one reconcile pass first. A pass moves each lifecycle chain
//! forward by at most one stage, so a poller always sees a few NotYet
//! observations before a transition lands.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::resource::{
    find_condition, keys, set_condition, Component, Condition, ConditionStatus, DeploymentTarget,
    DeploymentTargetClaim, DeploymentTargetClaimSpec, DeploymentTargetClass, DeploymentTargetSpec,
    Environment, EnvironmentSpec, IntegrationTestScenario, Object, ObjectMeta, PipelineRun,
    Release, ReleasePlan, Resource, ResourceKind, Snapshot, SnapshotEnvironmentBinding,
    SnapshotEnvironmentBindingSpec, SpaceRequest, SpaceRequestSpec,
};

use super::memory::{InMemoryAccessor, Store};
use super::{AccessError, LabelSelector, ResourceAccessor};

/// Marks a snapshot the integration controller already handled.
const PROCESSED_ANNOTATION: &str = "test.appstudio.openshift.io/processed";

/// Reconcile passes a running PipelineRun has been observed for.
const AGE_ANNOTATION: &str = "simulation.appstudio.openshift.io/passes";

/// Outcomes the simulated platform produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformBehavior {
    /// Build PipelineRuns succeed.
    #[serde(default = "yes")]
    pub build_succeeds: bool,
    /// Successful builds get a valid signature.
    #[serde(default = "yes")]
    pub sign_builds: bool,
    /// Integration test PipelineRuns succeed.
    #[serde(default = "yes")]
    pub tests_succeed: bool,
    /// Integration test PipelineRuns ever finish.
    #[serde(default = "yes")]
    pub tests_finish: bool,
    /// Release PipelineRuns succeed.
    #[serde(default = "yes")]
    pub release_succeeds: bool,
    /// Ephemeral environments and their bindings are torn down after testing.
    #[serde(default = "yes")]
    pub teardown_ephemeral: bool,
    /// Reconcile passes a PipelineRun keeps running before it finishes.
    #[serde(default = "default_pipeline_passes")]
    pub pipeline_passes: u64,
    /// Reads between reconcile passes; 1 reconciles on every read.
    #[serde(default = "default_reads_per_pass")]
    pub reads_per_pass: u64,
}

fn yes() -> bool {
    true
}

fn default_pipeline_passes() -> u64 {
    3
}

fn default_reads_per_pass() -> u64 {
    1
}

impl Default for PlatformBehavior {
    fn default() -> Self {
        Self {
            build_succeeds: true,
            sign_builds: true,
            tests_succeed: true,
            tests_finish: true,
            release_succeeds: true,
            teardown_ephemeral: true,
            pipeline_passes: default_pipeline_passes(),
            reads_per_pass: default_reads_per_pass(),
        }
    }
}

/// A change decided during a pass, applied once the pass has looked at everything.
enum Action {
    Insert(Object),
    Replace(Object),
    Remove(ResourceKind, String, String),
}

/// [`ResourceAccessor`] backed by an in-memory store plus platform controllers.
#[derive(Debug, Default)]
pub struct SimulatedPlatform {
    inner: InMemoryAccessor,
    behavior: PlatformBehavior,
    reads: AtomicU64,
}

impl SimulatedPlatform {
    pub fn new(behavior: PlatformBehavior) -> Self {
        Self {
            inner: InMemoryAccessor::new(),
            behavior,
            reads: AtomicU64::new(0),
        }
    }

    pub fn behavior(&self) -> &PlatformBehavior {
        &self.behavior
    }

    /// Makes the next `count` reads fail transiently.
    pub fn fail_next_reads(&self, count: u64) {
        self.inner.fail_next_reads(count);
    }

    /// Number of objects currently stored, across all namespaces.
    pub fn object_count(&self) -> usize {
        self.inner.with_store(|store| store.len())
    }

    /// Whether any object of `kind` exists in `namespace`.
    pub fn contains_any(&self, kind: ResourceKind, namespace: &str) -> bool {
        self.inner
            .with_store(|store| store.list(kind, Some(namespace)).next().is_some())
    }

    /// Runs one reconcile pass immediately.
    pub fn reconcile(&self) {
        self.inner.with_store(|store| {
            let actions = self.plan(store);
            for action in actions {
                apply(store, action);
            }
        });
    }

    fn tick(&self) {
        let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if reads % self.behavior.reads_per_pass.max(1) == 0 {
            self.reconcile();
        }
    }

    /// Decides the actions for one pass from the state at its start, so no
    /// chain advances twice in a single pass.
    fn plan(&self, store: &Store) -> Vec<Action> {
        let mut actions = Vec::new();
        self.plan_release(store, &mut actions);
        self.plan_ephemeral_teardown(store, &mut actions);
        self.plan_test_results(store, &mut actions);
        self.plan_test_runs(store, &mut actions);
        self.plan_integration(store, &mut actions);
        self.plan_snapshots(store, &mut actions);
        self.plan_signing(store, &mut actions);
        self.plan_builds(store, &mut actions);
        actions
    }

    /// Creates a build PipelineRun per component and finishes running builds.
    fn plan_builds(&self, store: &Store, actions: &mut Vec<Action>) {
        for component in typed::<Component>(store, None) {
            let ns = component.namespace().to_string();
            let name = component.name().to_string();
            let existing: Vec<PipelineRun> = typed::<PipelineRun>(store, Some(&ns))
                .into_iter()
                .filter(|r| {
                    r.metadata.label(keys::COMPONENT) == Some(name.as_str())
                        && r.pipeline_type() == Some(keys::PIPELINE_TYPE_BUILD)
                })
                .collect();

            if existing.is_empty() {
                let run = PipelineRun::new(
                    ObjectMeta::new(format!("{}-build-{}", name, short_id()), &ns)
                        .with_label(keys::COMPONENT, &name)
                        .with_label(keys::APPLICATION, &component.spec.application)
                        .with_label(keys::PIPELINE_TYPE, keys::PIPELINE_TYPE_BUILD)
                        .with_annotation(keys::SNAPSHOT, ""),
                );
                actions.push(insert(&run));
                continue;
            }

            for mut run in existing.into_iter().filter(|r| r.succeeded_condition().is_none()) {
                if self.advance(&mut run) {
                    finish(&mut run, self.behavior.build_succeeds);
                }
                actions.push(replace(&run));
            }
        }
    }

    /// Chains marks finished builds as signed, or as failed to sign.
    fn plan_signing(&self, store: &Store, actions: &mut Vec<Action>) {
        for mut run in builds(store) {
            if run.has_succeeded() && run.metadata.annotation(keys::CHAINS_SIGNED).is_none() {
                let verdict = if self.behavior.sign_builds { "true" } else { "failed" };
                run.metadata
                    .annotations
                    .insert(keys::CHAINS_SIGNED.to_string(), verdict.to_string());
                actions.push(replace(&run));
            }
        }
    }

    /// Creates a snapshot for each signed build, then annotates the build with it.
    fn plan_snapshots(&self, store: &Store, actions: &mut Vec<Action>) {
        for mut run in builds(store) {
            if run.metadata.annotation(keys::CHAINS_SIGNED) != Some("true") {
                continue;
            }
            let ns = run.namespace().to_string();
            let snapshot = typed::<Snapshot>(store, Some(&ns))
                .into_iter()
                .find(|s| s.metadata.label(keys::BUILD_PIPELINE_RUN) == Some(run.name()));

            let unannotated = run.metadata.annotation(keys::SNAPSHOT) == Some("");
            match snapshot {
                // A build already pointing at a snapshot never gets another one.
                None if unannotated => {
                    let component = run.metadata.label(keys::COMPONENT).unwrap_or_default();
                    let application = run.metadata.label(keys::APPLICATION).unwrap_or_default();
                    let snapshot = Snapshot::new(
                        ObjectMeta::new(format!("{}-{}", application, short_id()), &ns)
                            .with_label(keys::BUILD_PIPELINE_RUN, run.name())
                            .with_label(keys::COMPONENT, component)
                            .with_label(keys::APPLICATION, application)
                            .with_label(keys::EVENT_TYPE, "push"),
                        application,
                    )
                    .with_component(component, format!("quay.io/redhat-appstudio/{}@sha256:{}", component, short_id()));
                    actions.push(insert(&snapshot));
                }
                Some(snapshot) if unannotated => {
                    run.metadata
                        .annotations
                        .insert(keys::SNAPSHOT.to_string(), snapshot.name().to_string());
                    actions.push(replace(&run));
                }
                _ => {}
            }
        }
    }

    /// Provisions an ephemeral environment and starts a test run per scenario
    /// for every new snapshot. Without a usable DeploymentTargetClass nothing
    /// is provisioned and no test run starts.
    fn plan_integration(&self, store: &Store, actions: &mut Vec<Action>) {
        let class_available = typed::<DeploymentTargetClass>(store, None)
            .iter()
            .any(|c| c.spec.provisioner == keys::SANDBOX_PROVISIONER);

        for mut snapshot in typed::<Snapshot>(store, None) {
            if snapshot.metadata.annotation(PROCESSED_ANNOTATION).is_some() {
                continue;
            }
            let ns = snapshot.namespace().to_string();
            let application = snapshot.spec.application.clone();
            let scenarios = typed::<IntegrationTestScenario>(store, Some(&ns))
                .into_iter()
                .filter(|s| s.spec.application == application);

            for scenario in scenarios {
                if scenario.spec.environment.is_some() && !class_available {
                    continue;
                }
                let mut run_meta = ObjectMeta::new(
                    format!("{}-{}", scenario.name(), short_id()),
                    &ns,
                )
                .with_label(keys::SNAPSHOT, snapshot.name())
                .with_label(keys::SCENARIO, scenario.name())
                .with_label(keys::APPLICATION, &application)
                .with_label(keys::PIPELINE_TYPE, keys::PIPELINE_TYPE_TEST);
                if let Some(component) = snapshot.metadata.label(keys::COMPONENT) {
                    run_meta = run_meta.with_label(keys::COMPONENT, component);
                }

                if let Some(parent) = &scenario.spec.environment {
                    let env_name = format!("{}-{}", snapshot.name(), short_id());
                    let claim = format!("{}-dtc", env_name);
                    let env = Environment {
                        metadata: ObjectMeta::new(&env_name, &ns)
                            .with_label(keys::APPLICATION, &application)
                            .with_label(keys::SNAPSHOT, snapshot.name())
                            .with_label(keys::SCENARIO, scenario.name()),
                        spec: EnvironmentSpec {
                            display_name: env_name.clone(),
                            deployment_strategy: "AppStudioAutomated".to_string(),
                            parent_environment: Some(parent.name.clone()),
                            tags: vec![keys::EPHEMERAL_TAG.to_string()],
                            deployment_target_claim: Some(claim.clone()),
                        },
                    };
                    actions.push(insert(&env));
                    actions.push(insert(&DeploymentTargetClaim {
                        metadata: ObjectMeta::new(&claim, &ns),
                        spec: DeploymentTargetClaimSpec {
                            deployment_target_class_name: "isolation-level-namespace".to_string(),
                            target_name: Some(format!("{}-dt", env_name)),
                        },
                    }));
                    actions.push(insert(&DeploymentTarget {
                        metadata: ObjectMeta::new(format!("{}-dt", env_name), &ns),
                        spec: DeploymentTargetSpec {
                            deployment_target_class_name: "isolation-level-namespace".to_string(),
                            claim_ref: Some(claim.clone()),
                        },
                    }));
                    actions.push(insert(&SpaceRequest {
                        metadata: ObjectMeta::new(format!("{}-sr", env_name), &ns)
                            .with_label(keys::ENVIRONMENT, &env_name),
                        spec: SpaceRequestSpec {
                            tier_name: "appstudio-env".to_string(),
                        },
                    }));
                    actions.push(insert(&SnapshotEnvironmentBinding {
                        metadata: ObjectMeta::new(format!("{}-binding", env_name), &ns)
                            .with_label(keys::ENVIRONMENT, &env_name),
                        spec: SnapshotEnvironmentBindingSpec {
                            application: application.clone(),
                            environment: env_name.clone(),
                            snapshot: snapshot.name().to_string(),
                        },
                    }));
                    run_meta = run_meta.with_label(keys::ENVIRONMENT, &env_name);
                }
                actions.push(insert(&PipelineRun::new(run_meta)));
            }

            snapshot
                .metadata
                .annotations
                .insert(PROCESSED_ANNOTATION.to_string(), "true".to_string());
            actions.push(replace(&snapshot));
        }
    }

    fn plan_test_runs(&self, store: &Store, actions: &mut Vec<Action>) {
        if !self.behavior.tests_finish {
            return;
        }
        for mut run in typed::<PipelineRun>(store, None) {
            if run.pipeline_type() == Some(keys::PIPELINE_TYPE_TEST) && run.succeeded_condition().is_none() {
                if self.advance(&mut run) {
                    finish(&mut run, self.behavior.tests_succeed);
                }
                actions.push(replace(&run));
            }
        }
    }

    /// Marks a snapshot once every test run referencing it is terminal.
    fn plan_test_results(&self, store: &Store, actions: &mut Vec<Action>) {
        for mut snapshot in typed::<Snapshot>(store, None) {
            if snapshot.status.conditions.iter().any(|c| c.type_ == keys::TESTS_SUCCEEDED_CONDITION) {
                continue;
            }
            let runs: Vec<PipelineRun> = typed::<PipelineRun>(store, Some(snapshot.namespace()))
                .into_iter()
                .filter(|r| {
                    r.pipeline_type() == Some(keys::PIPELINE_TYPE_TEST)
                        && r.metadata.label(keys::SNAPSHOT) == Some(snapshot.name())
                })
                .collect();
            if runs.is_empty() || !runs.iter().all(PipelineRun::is_done) {
                continue;
            }
            let passed = runs.iter().all(PipelineRun::has_succeeded);
            let status = if passed { ConditionStatus::True } else { ConditionStatus::False };
            set_condition(
                &mut snapshot.status.conditions,
                Condition::new(keys::TESTS_SUCCEEDED_CONDITION, status)
                    .with_reason(if passed { "Passed" } else { "Failed" }),
            );
            actions.push(replace(&snapshot));
        }
    }

    /// Deletes the binding of a tested snapshot first, then its environment
    /// together with the provisioning resources.
    fn plan_ephemeral_teardown(&self, store: &Store, actions: &mut Vec<Action>) {
        if !self.behavior.teardown_ephemeral {
            return;
        }
        for env in typed::<Environment>(store, None).into_iter().filter(Environment::is_ephemeral) {
            let ns = env.namespace().to_string();
            let Some(snapshot_name) = env.metadata.label(keys::SNAPSHOT) else {
                continue;
            };
            let tested = store
                .get(ResourceKind::Snapshot, snapshot_name, &ns)
                .cloned()
                .and_then(|o| o.into_resource::<Snapshot>().ok())
                .map(|s| find_condition(&s.status.conditions, keys::TESTS_SUCCEEDED_CONDITION).is_some())
                .unwrap_or(true);
            if !tested {
                continue;
            }

            let bindings: Vec<SnapshotEnvironmentBinding> = typed(store, Some(&ns))
                .into_iter()
                .filter(|b: &SnapshotEnvironmentBinding| b.spec.environment == env.name())
                .collect();
            if !bindings.is_empty() {
                for binding in bindings {
                    actions.push(remove(&binding));
                }
                continue;
            }

            if let Some(claim) = &env.spec.deployment_target_claim {
                actions.push(Action::Remove(ResourceKind::DeploymentTargetClaim, claim.clone(), ns.clone()));
            }
            actions.push(Action::Remove(ResourceKind::DeploymentTarget, format!("{}-dt", env.name()), ns.clone()));
            actions.push(Action::Remove(ResourceKind::SpaceRequest, format!("{}-sr", env.name()), ns.clone()));
            actions.push(remove(&env));
        }
    }

    /// Starts a release PipelineRun in the target namespace per release, then
    /// finishes it and reports the result on the Release.
    fn plan_release(&self, store: &Store, actions: &mut Vec<Action>) {
        for mut release in typed::<Release>(store, None) {
            if release.succeeded_condition().is_some() {
                continue;
            }
            let ns = release.namespace().to_string();
            let Some(plan) = store
                .get(ResourceKind::ReleasePlan, &release.spec.release_plan, &ns)
                .cloned()
                .and_then(|o| o.into_resource::<ReleasePlan>().ok())
            else {
                continue;
            };
            let target = plan.spec.target.clone();
            let run = typed::<PipelineRun>(store, Some(&target)).into_iter().find(|r| {
                r.metadata.label(keys::RELEASE_NAME) == Some(release.name())
                    && r.metadata.label(keys::RELEASE_NAMESPACE) == Some(ns.as_str())
            });

            match run {
                None => {
                    let run = PipelineRun::new(
                        ObjectMeta::new(format!("release-pipelinerun-{}", short_id()), &target)
                            .with_label(keys::RELEASE_NAME, release.name())
                            .with_label(keys::RELEASE_NAMESPACE, &ns)
                            .with_label(keys::PIPELINE_TYPE, keys::PIPELINE_TYPE_RELEASE),
                    );
                    actions.push(insert(&run));
                }
                Some(mut run) if run.succeeded_condition().is_none() => {
                    if self.advance(&mut run) {
                        finish(&mut run, self.behavior.release_succeeds);
                    }
                    actions.push(replace(&run));
                }
                Some(run) => {
                    let status = if run.has_succeeded() { ConditionStatus::True } else { ConditionStatus::False };
                    set_condition(
                        &mut release.status.conditions,
                        Condition::new(keys::SUCCEEDED_CONDITION, status),
                    );
                    actions.push(replace(&release));
                }
            }
        }
    }
}

#[async_trait]
impl ResourceAccessor for SimulatedPlatform {
    async fn create(&self, object: Object) -> Result<Object, AccessError> {
        self.inner.create(object).await
    }

    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Object, AccessError> {
        self.tick();
        self.inner.get(kind, name, namespace).await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>, AccessError> {
        self.tick();
        self.inner.list(kind, namespace, selector).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<(), AccessError> {
        self.inner.delete(kind, name, namespace).await
    }
}

impl SimulatedPlatform {
    /// Ages a running PipelineRun by one pass; true once it should finish.
    fn advance(&self, run: &mut PipelineRun) -> bool {
        let age = run
            .metadata
            .annotation(AGE_ANNOTATION)
            .and_then(|a| a.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        run.metadata
            .annotations
            .insert(AGE_ANNOTATION.to_string(), age.to_string());
        age >= self.behavior.pipeline_passes
    }
}

fn typed<T: Resource>(store: &Store, namespace: Option<&str>) -> Vec<T> {
    store
        .list(T::KIND, namespace)
        .filter_map(|o| o.clone().into_resource().ok())
        .collect()
}

fn builds(store: &Store) -> Vec<PipelineRun> {
    typed::<PipelineRun>(store, None)
        .into_iter()
        .filter(|r| r.pipeline_type() == Some(keys::PIPELINE_TYPE_BUILD))
        .collect()
}

fn finish(run: &mut PipelineRun, succeeded: bool) {
    let condition = if succeeded {
        Condition::new(keys::SUCCEEDED_CONDITION, ConditionStatus::True).with_reason("Succeeded")
    } else {
        Condition::new(keys::SUCCEEDED_CONDITION, ConditionStatus::False)
            .with_reason("Failed")
            .with_message("Tasks Completed: 1 (Failed: 1, Cancelled 0), Skipped: 0")
    };
    set_condition(&mut run.status.conditions, condition);
    run.status.completion_time = Some(Utc::now());
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..5].to_string()
}

fn insert<T: Resource>(resource: &T) -> Action {
    match Object::from_resource(resource) {
        Ok(object) => Action::Insert(object),
        Err(e) => {
            tracing::warn!(kind = %T::KIND, error = %e, "simulated controller produced an unencodable object");
            Action::Remove(T::KIND, resource.name().to_string(), resource.namespace().to_string())
        }
    }
}

fn replace<T: Resource>(resource: &T) -> Action {
    match Object::from_resource(resource) {
        Ok(object) => Action::Replace(object),
        Err(e) => {
            tracing::warn!(kind = %T::KIND, error = %e, "simulated controller produced an unencodable object");
            Action::Remove(T::KIND, resource.name().to_string(), resource.namespace().to_string())
        }
    }
}

fn remove<T: Resource>(resource: &T) -> Action {
    Action::Remove(T::KIND, resource.name().to_string(), resource.namespace().to_string())
}

fn apply(store: &mut Store, action: Action) {
    match action {
        Action::Insert(object) => {
            let target = object.resource_ref();
            if let Err(e) = store.insert(object) {
                tracing::debug!(%target, error = %e, "simulated controller skipped insert");
            }
        }
        Action::Replace(object) => {
            if let Some(existing) = store.get_mut(object.kind, &object.metadata.name, &object.metadata.namespace) {
                *existing = object;
            }
        }
        Action::Remove(kind, name, namespace) => {
            store.remove(kind, &name, &namespace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Application, TestEnvironment};

    async fn seed(platform: &SimulatedPlatform, with_class: bool) {
        let create = |r: Object| platform.create(r);
        create(Object::from_resource(&Application::new("app", "ns")).unwrap()).await.unwrap();
        create(Object::from_resource(&Component::new("comp", "ns", "app", "https://example.com/repo")).unwrap())
            .await
            .unwrap();
        let scenario = IntegrationTestScenario {
            metadata: ObjectMeta::new("its", "ns"),
            spec: crate::resource::IntegrationTestScenarioSpec {
                application: "app".to_string(),
                environment: Some(TestEnvironment {
                    name: "user-picked-environment".to_string(),
                    type_: "POC".to_string(),
                }),
                ..Default::default()
            },
        };
        create(Object::from_resource(&scenario).unwrap()).await.unwrap();
        if with_class {
            create(Object::from_resource(&DeploymentTargetClass::sandbox("isolation-level-namespace")).unwrap())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn one_pass_advances_one_stage() {
        let platform = SimulatedPlatform::new(PlatformBehavior::default());
        seed(&platform, true).await;

        platform.reconcile();
        assert!(platform.contains_any(ResourceKind::PipelineRun, "ns"));
        assert!(!platform.contains_any(ResourceKind::Snapshot, "ns"));
    }

    #[tokio::test]
    async fn full_lifecycle_tears_down_ephemeral_resources() {
        let platform = SimulatedPlatform::new(PlatformBehavior::default());
        seed(&platform, true).await;

        let mut saw_environment = false;
        for _ in 0..20 {
            platform.reconcile();
            saw_environment |= platform.contains_any(ResourceKind::SpaceRequest, "ns");
        }
        assert!(saw_environment);
        assert!(!platform.contains_any(ResourceKind::SnapshotEnvironmentBinding, "ns"));
        assert!(!platform.contains_any(ResourceKind::SpaceRequest, "ns"));
        assert!(!platform.contains_any(ResourceKind::DeploymentTarget, "ns"));

        let snapshots = platform
            .list(ResourceKind::Snapshot, "ns", &LabelSelector::everything())
            .await
            .unwrap();
        let snapshot: Snapshot = snapshots[0].clone().into_resource().unwrap();
        assert!(snapshot.tests_succeeded());
    }

    #[tokio::test]
    async fn deleted_snapshot_of_annotated_build_stays_deleted() {
        let platform = SimulatedPlatform::new(PlatformBehavior::default());
        seed(&platform, true).await;
        for _ in 0..20 {
            platform.reconcile();
        }

        let snapshots = platform
            .list(ResourceKind::Snapshot, "ns", &LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 1);
        platform
            .delete(ResourceKind::Snapshot, &snapshots[0].resource_ref().name, "ns")
            .await
            .unwrap();

        for _ in 0..5 {
            platform.reconcile();
        }
        assert!(!platform.contains_any(ResourceKind::Snapshot, "ns"));
    }

    #[tokio::test]
    async fn no_class_means_no_provisioning() {
        let platform = SimulatedPlatform::new(PlatformBehavior::default());
        seed(&platform, false).await;

        for _ in 0..20 {
            platform.reconcile();
        }
        assert!(platform.contains_any(ResourceKind::Snapshot, "ns"));
        assert!(!platform.contains_any(ResourceKind::SpaceRequest, "ns"));
        assert!(!platform.contains_any(ResourceKind::DeploymentTargetClaim, "ns"));
        let tests = platform
            .list(
                ResourceKind::PipelineRun,
                "ns",
                &LabelSelector::everything().eq(keys::PIPELINE_TYPE, keys::PIPELINE_TYPE_TEST),
            )
            .await
            .unwrap();
        assert!(tests.is_empty());
    }
}
