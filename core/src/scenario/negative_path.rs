//! Negative path: no usable DeploymentTargetClass exists.
//!
//! A push snapshot created by hand must not provision anything, must not
//! start an integration test and must not be marked as passed.

use async_trait::async_trait;

use crate::accessor::{Client, LabelSelector, SnapshotLookup};
use crate::config::TimingConfig;
use crate::converge::predicate;
use crate::guard::{TeardownClass, Tracked};
use crate::resource::{
    keys, Application, Component, DeploymentTarget, DeploymentTargetClaim, Environment,
    IntegrationTestScenario, ObjectMeta, Resource, ResourceKind, ResourceRef, Snapshot,
    SpaceRequest,
};
use crate::suite::ScenarioFixture;

use super::context::{require, ScenarioContext};
use super::machine::Scenario;
use super::step::{PlannedStep, StepError};
use super::{await_present, create};

/// Environments a namespace may hold when nothing was provisioned: the
/// user-picked one plus one the platform may seed.
const MAX_ENVIRONMENTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateApplication,
    CreateComponent,
    CreateUserEnvironment,
    CreateIntegrationTestScenario,
    NoDeploymentTargetClass,
    CreatePushSnapshot,
    NothingProvisioned,
    NoIntegrationPipelineRun,
    SnapshotNotPassed,
}

pub struct NegativePath {
    fixture: ScenarioFixture,
}

impl NegativePath {
    pub fn new(fixture: ScenarioFixture) -> Self {
        Self { fixture }
    }
}

#[async_trait]
impl Scenario for NegativePath {
    type Step = Step;

    fn name(&self) -> &str {
        &self.fixture.name
    }

    fn plan(&self, _timing: &TimingConfig) -> Vec<PlannedStep<Step>> {
        use PlannedStep as P;
        vec![
            P::mutation("create application", Step::CreateApplication),
            P::mutation("create component", Step::CreateComponent),
            P::mutation("create user-picked environment", Step::CreateUserEnvironment),
            P::mutation("create integration test scenario", Step::CreateIntegrationTestScenario),
            P::check("no deployment target class available", Step::NoDeploymentTargetClass),
            P::mutation("create push snapshot", Step::CreatePushSnapshot),
            P::check("no provisioning resources created", Step::NothingProvisioned),
            P::check("no integration pipelinerun started", Step::NoIntegrationPipelineRun),
            P::check("snapshot not marked as passed", Step::SnapshotNotPassed),
        ]
    }

    async fn execute(
        &self,
        step: &Step,
        ctx: &mut ScenarioContext,
        client: &Client,
    ) -> Result<(), StepError> {
        let f = &self.fixture;
        let namespace = ctx.namespace.clone();
        let ns = namespace.as_str();

        match step {
            Step::CreateApplication => {
                let app = create(client, &Application::new(&f.application, ns)).await?;
                ctx.track(&app, TeardownClass::Root);
                ctx.application = Some(app);
            }
            Step::CreateComponent => {
                let app = require(&ctx.application, "application")?.name().to_string();
                let component =
                    create(client, &Component::new(&f.component, ns, app, &f.component_git_url))
                        .await?;
                ctx.track(&component, TeardownClass::Root);
                ctx.component = Some(component);
            }
            Step::CreateUserEnvironment => {
                let env = create(client, &Environment::poc(&f.user_environment, ns)).await?;
                // Every Environment in the namespace goes, not just this one.
                ctx.guard.track(
                    Tracked::all_of_kind(ResourceKind::Environment, ns, TeardownClass::Child)
                        .awaiting(ctx.timing.environments_deleted),
                );
                ctx.user_environment = Some(env);
            }
            Step::CreateIntegrationTestScenario => {
                let app = require(&ctx.application, "application")?;
                let env = require(&ctx.user_environment, "user-picked environment")?;
                let scenario = IntegrationTestScenario::new(
                    &f.integration_test_scenario,
                    ns,
                    app.name(),
                    &f.test.git_url,
                    &f.test.revision,
                    &f.test.path_in_repo,
                )
                .with_environment(env);
                let scenario = create(client, &scenario).await?;
                ctx.track(&scenario, TeardownClass::Child);
                ctx.integration_test_scenario = Some(scenario);
            }
            Step::NoDeploymentTargetClass => {
                let target = ResourceRef::new(ResourceKind::DeploymentTargetClass, "", "");
                match client.available_deployment_target_class().await {
                    Ok(None) => {}
                    Ok(Some(class)) => {
                        return Err(StepError::assertion(
                            class.resource_ref(),
                            format!(
                                "deployment target class '{}' with provisioner {} exists",
                                class.name(),
                                class.spec.provisioner
                            ),
                        ));
                    }
                    Err(source) => return Err(StepError::Access { target, source }),
                }
            }
            Step::CreatePushSnapshot => {
                let snapshot = Snapshot::new(
                    ObjectMeta::generated("snapshot-sample-", ns)
                        .with_label(keys::COMPONENT, &f.component)
                        .with_label(keys::APPLICATION, &f.application)
                        .with_label(keys::EVENT_TYPE, "push"),
                    &f.application,
                )
                .with_component(&f.component, &f.sample_image);
                let snapshot = create(client, &snapshot).await?;
                ctx.track(&snapshot, TeardownClass::Child);
                ctx.push_snapshot = Some(snapshot);
            }
            Step::NothingProvisioned => {
                let everything = LabelSelector::everything();
                expect_none::<SpaceRequest>(client, ns, &everything).await?;
                expect_none::<DeploymentTarget>(client, ns, &everything).await?;
                expect_none::<DeploymentTargetClaim>(client, ns, &everything).await?;

                let envs: Vec<Environment> = client
                    .list(ns, &everything)
                    .await
                    .map_err(|source| StepError::Access {
                        target: ResourceRef::new(ResourceKind::Environment, "", ns),
                        source,
                    })?;
                if envs.len() > MAX_ENVIRONMENTS {
                    return Err(StepError::Assertion {
                        target: None,
                        message: format!(
                            "expected at most {} Environments in namespace {}, found {}",
                            MAX_ENVIRONMENTS,
                            ns,
                            envs.len()
                        ),
                    });
                }
            }
            Step::NoIntegrationPipelineRun => {
                let snapshot = require(&ctx.push_snapshot, "push snapshot")?;
                let scenario = require(&ctx.integration_test_scenario, "integration test scenario")?;
                let target = ResourceRef::new(ResourceKind::PipelineRun, "", ns);
                match client
                    .integration_pipeline_run(scenario.name(), snapshot.name(), ns)
                    .await
                {
                    Err(e) if e.is_not_found() && e.to_string().contains("no pipelinerun found") => {
                        tracing::info!(snapshot = %snapshot.name(), "no integration pipelinerun, as expected");
                    }
                    Ok(run) => {
                        return Err(StepError::assertion(
                            run.resource_ref(),
                            format!(
                                "integration pipelinerun {} started for snapshot {}",
                                run.name(),
                                snapshot.name()
                            ),
                        ));
                    }
                    Err(source) => return Err(StepError::Access { target, source }),
                }
            }
            Step::SnapshotNotPassed => {
                let name = require(&ctx.push_snapshot, "push snapshot")?.name().to_string();
                let name = name.as_str();
                await_present(
                    ResourceRef::new(ResourceKind::Snapshot, name, ns),
                    move || client.find_snapshot(SnapshotLookup::Name(name), ns),
                    &predicate::tests_not_passed(),
                    ctx.timing.test_result_checked.poll(),
                )
                .await?;
            }
        }
        Ok(())
    }
}

/// Fails unless no resource of kind `T` exists in `namespace`.
async fn expect_none<T: Resource>(
    client: &Client,
    namespace: &str,
    selector: &LabelSelector,
) -> Result<(), StepError> {
    let found: Vec<T> = client
        .list(namespace, selector)
        .await
        .map_err(|source| StepError::Access {
            target: ResourceRef::new(T::KIND, "", namespace),
            source,
        })?;
    match found.first() {
        None => Ok(()),
        Some(first) => Err(StepError::assertion(
            first.resource_ref(),
            format!(
                "expected no {} in namespace {}, found {}",
                T::KIND,
                namespace,
                found.len()
            ),
        )),
    }
}
