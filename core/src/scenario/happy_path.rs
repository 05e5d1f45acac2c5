//! Happy path for namespace-backed ephemeral environments.
//!
//! Build, signature, snapshot, ephemeral environment and integration test,
//! then the platform tears the ephemeral environment down again.

use async_trait::async_trait;

use crate::accessor::{Client, SnapshotLookup};
use crate::config::TimingConfig;
use crate::converge::{predicate, Correlation};
use crate::guard::{TeardownClass, Tracked};
use crate::resource::{
    keys, Application, Component, DeploymentTargetClass, Environment, IntegrationTestScenario,
    PipelineRun, Resource, ResourceKind, ResourceRef, SnapshotEnvironmentBinding,
};
use crate::suite::ScenarioFixture;

use super::context::{require, ScenarioContext};
use super::machine::Scenario;
use super::step::{PlannedStep, StepError};
use super::{await_absent, await_present, create};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateApplication,
    CreateComponent,
    CreateDeploymentTargetClass,
    CreateUserEnvironment,
    CreateIntegrationTestScenario,
    BuildStarted,
    BuildFinished,
    BuildSigned,
    SnapshotCreated,
    BuildAnnotated,
    EphemeralEnvironmentCreated,
    TestPipelineStarted,
    TestPipelineFinished,
    SnapshotPassed,
    BindingDeleted,
    EphemeralEnvironmentDeleted,
}

pub struct HappyPath {
    fixture: ScenarioFixture,
}

impl HappyPath {
    pub fn new(fixture: ScenarioFixture) -> Self {
        Self { fixture }
    }
}

#[async_trait]
impl Scenario for HappyPath {
    type Step = Step;

    fn name(&self) -> &str {
        &self.fixture.name
    }

    fn plan(&self, timing: &TimingConfig) -> Vec<PlannedStep<Step>> {
        use PlannedStep as P;
        vec![
            P::mutation("create application", Step::CreateApplication),
            P::mutation("create component", Step::CreateComponent),
            P::mutation("create deployment target class", Step::CreateDeploymentTargetClass),
            P::mutation("create user-picked environment", Step::CreateUserEnvironment),
            P::mutation("create integration test scenario", Step::CreateIntegrationTestScenario),
            P::convergence(
                "build pipelinerun triggered",
                Step::BuildStarted,
                timing.build_started.timeout(),
            ),
            P::convergence(
                "build pipelinerun finished",
                Step::BuildFinished,
                timing.build_finished.timeout(),
            ),
            P::convergence(
                "build pipelinerun signed",
                Step::BuildSigned,
                timing.build_signed.timeout(),
            ),
            P::convergence(
                "snapshot created",
                Step::SnapshotCreated,
                timing.snapshot_created.timeout(),
            ),
            P::convergence(
                "build pipelinerun annotated with snapshot",
                Step::BuildAnnotated,
                timing.snapshot_annotated.timeout(),
            ),
            P::convergence(
                "ephemeral environment created",
                Step::EphemeralEnvironmentCreated,
                timing.ephemeral_environment_created.timeout(),
            ),
            P::convergence(
                "integration pipelinerun started",
                Step::TestPipelineStarted,
                timing.test_pipeline_started.timeout(),
            ),
            P::convergence(
                "integration pipelinerun finished",
                Step::TestPipelineFinished,
                timing.test_pipeline_finished.timeout(),
            ),
            P::check("snapshot marked as passed", Step::SnapshotPassed),
            P::convergence(
                "snapshot environment binding deleted",
                Step::BindingDeleted,
                timing.binding_deleted.timeout(),
            ),
            P::convergence(
                "ephemeral environment deleted",
                Step::EphemeralEnvironmentDeleted,
                timing.ephemeral_environment_deleted.timeout(),
            ),
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
        let timing = ctx.timing.clone();
        let (component, application) = (f.component.as_str(), f.application.as_str());

        match step {
            Step::CreateApplication => {
                let app = create(client, &Application::new(application, ns)).await?;
                ctx.track(&app, TeardownClass::Root);
                ctx.application = Some(app);
            }
            Step::CreateComponent => {
                let app = require(&ctx.application, "application")?.name().to_string();
                let resource = Component::new(component, ns, app, &f.component_git_url);
                let created = create(client, &resource).await?;
                ctx.track(&created, TeardownClass::Root);
                ctx.component = Some(created);
            }
            Step::CreateDeploymentTargetClass => {
                let class = DeploymentTargetClass::sandbox(&f.deployment_target_class);
                let class = create(client, &class).await?;
                ctx.guard.track(
                    Tracked::new(class.resource_ref(), TeardownClass::Provisioning)
                        .always_released(),
                );
                ctx.deployment_target_class = Some(class);
            }
            Step::CreateUserEnvironment => {
                let env = create(client, &Environment::poc(&f.user_environment, ns)).await?;
                ctx.track(&env, TeardownClass::Child);
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
            Step::BuildStarted => {
                let run = await_present(
                    ResourceRef::new(ResourceKind::PipelineRun, "", ns),
                    move || client.build_pipeline_run(component, application, ns),
                    &predicate::present("build pipelinerun triggered"),
                    timing.build_started.poll(),
                )
                .await?;
                // A fresh build must not point at a snapshot yet.
                let snapshot = run.metadata.annotation(keys::SNAPSHOT).unwrap_or_default();
                if !snapshot.is_empty() {
                    return Err(StepError::assertion(
                        run.resource_ref(),
                        format!(
                            "new build pipelinerun is already annotated with snapshot '{}'",
                            snapshot
                        ),
                    ));
                }
                tracing::info!(pipelinerun = %run.name(), "build pipelinerun triggered");
                ctx.build_pipeline_run = Some(run);
            }
            Step::BuildFinished => {
                let target = require(&ctx.build_pipeline_run, "build pipelinerun")?.resource_ref();
                let run = await_present(
                    target,
                    move || client.build_pipeline_run(component, application, ns),
                    &predicate::pipeline_finished("build pipelinerun finished"),
                    timing.build_finished.poll(),
                )
                .await?;
                ctx.build_pipeline_run = Some(run);
            }
            Step::BuildSigned => {
                let target = require(&ctx.build_pipeline_run, "build pipelinerun")?.resource_ref();
                let run = await_present(
                    target,
                    move || client.build_pipeline_run(component, application, ns),
                    &predicate::build_signed(),
                    timing.build_signed.poll(),
                )
                .await?;
                ctx.build_pipeline_run = Some(run);
            }
            Step::SnapshotCreated => {
                let snapshot = await_present(
                    ResourceRef::new(ResourceKind::Snapshot, "", ns),
                    move || client.find_snapshot(SnapshotLookup::Component(component), ns),
                    &predicate::snapshot_created(component),
                    timing.snapshot_created.poll(),
                )
                .await?;
                tracing::info!(snapshot = %snapshot.name(), "snapshot found");
                ctx.track(&snapshot, TeardownClass::Child);
                ctx.snapshot = Some(snapshot);
            }
            Step::BuildAnnotated => {
                let snapshot = require(&ctx.snapshot, "snapshot")?.name().to_string();
                let target = require(&ctx.build_pipeline_run, "build pipelinerun")?.resource_ref();
                let run = await_present(
                    target,
                    move || client.build_pipeline_run(component, application, ns),
                    &predicate::annotated::<PipelineRun>(keys::SNAPSHOT),
                    timing.snapshot_annotated.poll(),
                )
                .await?;
                let annotated = run.metadata.annotation(keys::SNAPSHOT).unwrap_or_default();
                if annotated != snapshot {
                    return Err(StepError::assertion(
                        run.resource_ref(),
                        format!(
                            "build pipelinerun annotated with snapshot '{}', expected '{}'",
                            annotated, snapshot
                        ),
                    ));
                }
                ctx.build_pipeline_run = Some(run);
            }
            Step::EphemeralEnvironmentCreated => {
                let snapshot = require(&ctx.snapshot, "snapshot")?;
                let scenario = require(&ctx.integration_test_scenario, "integration test scenario")?;
                let (app, snap, its) = (snapshot.spec.application.as_str(), snapshot.name(), scenario.name());
                let env = await_present(
                    ResourceRef::new(ResourceKind::Environment, "", ns),
                    move || client.ephemeral_environment(app, snap, its, ns),
                    &predicate::present("ephemeral environment created"),
                    timing.ephemeral_environment_created.poll(),
                )
                .await?;
                if env.name().is_empty() {
                    return Err(StepError::assertion(env.resource_ref(), "ephemeral environment has no name"));
                }
                tracing::info!(environment = %env.name(), "ephemeral environment found");
                ctx.ephemeral_environment = Some(env);
            }
            Step::TestPipelineStarted => {
                let snapshot = require(&ctx.snapshot, "snapshot")?.name().to_string();
                let scenario = require(&ctx.integration_test_scenario, "integration test scenario")?
                    .name()
                    .to_string();
                let env = require(&ctx.ephemeral_environment, "ephemeral environment")?
                    .name()
                    .to_string();
                let correlated = predicate::correlated_test_run(Correlation {
                    component: Some(component.to_string()),
                    snapshot: snapshot.clone(),
                    scenario: scenario.clone(),
                    environment: Some(env),
                });
                let (snap, its) = (snapshot.as_str(), scenario.as_str());
                let run = await_present(
                    ResourceRef::new(ResourceKind::PipelineRun, "", ns),
                    move || client.integration_pipeline_run(its, snap, ns),
                    &correlated,
                    timing.test_pipeline_started.poll(),
                )
                .await?;
                tracing::info!(pipelinerun = %run.name(), "integration pipelinerun started");
                ctx.test_pipeline_run = Some(run);
            }
            Step::TestPipelineFinished => {
                // The run correlated when it started; a rerun must not stand in for it.
                let target = require(&ctx.test_pipeline_run, "integration pipelinerun")?.resource_ref();
                let name = target.name.as_str();
                let run = await_present(
                    target.clone(),
                    move || client.get::<PipelineRun>(name, ns),
                    &predicate::pipeline_finished("integration pipelinerun finished"),
                    timing.test_pipeline_finished.poll(),
                )
                .await?;
                ctx.test_pipeline_run = Some(run);
            }
            Step::SnapshotPassed => {
                let build = require(&ctx.build_pipeline_run, "build pipelinerun")?
                    .name()
                    .to_string();
                let build = build.as_str();
                let target = require(&ctx.snapshot, "snapshot")?.resource_ref();
                let snapshot = await_present(
                    target,
                    move || client.find_snapshot(SnapshotLookup::BuildPipelineRun(build), ns),
                    &predicate::tests_passed(),
                    timing.test_result_checked.poll(),
                )
                .await?;
                ctx.snapshot = Some(snapshot);
            }
            Step::BindingDeleted => {
                let env = require(&ctx.ephemeral_environment, "ephemeral environment")?
                    .name()
                    .to_string();
                let env = env.as_str();
                await_absent(
                    ResourceRef::new(ResourceKind::SnapshotEnvironmentBinding, "", ns),
                    move || client.snapshot_environment_binding(application, ns, env),
                    &predicate::absent::<SnapshotEnvironmentBinding>(
                        "snapshot environment binding deleted",
                    ),
                    timing.binding_deleted.poll(),
                )
                .await?;
            }
            Step::EphemeralEnvironmentDeleted => {
                let env = require(&ctx.ephemeral_environment, "ephemeral environment")?;
                let snapshot = require(&ctx.snapshot, "snapshot")?;
                let scenario = require(&ctx.integration_test_scenario, "integration test scenario")?;
                let (app, snap, its) = (snapshot.spec.application.as_str(), snapshot.name(), scenario.name());
                await_absent(
                    env.resource_ref(),
                    move || client.ephemeral_environment(app, snap, its, ns),
                    &predicate::absent::<Environment>("ephemeral environment deleted"),
                    timing.ephemeral_environment_deleted.poll(),
                )
                .await?;
            }
        }
        Ok(())
    }
}
