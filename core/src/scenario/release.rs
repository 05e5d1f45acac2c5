//! Release path: a snapshot released from the dev namespace into a managed one.

use async_trait::async_trait;

use crate::accessor::Client;
use crate::config::TimingConfig;
use crate::converge::predicate;
use crate::guard::TeardownClass;
use crate::resource::{
    Application, ObjectMeta, Release, ReleasePlan, ReleasePlanAdmission, ReleasePlanAdmissionSpec,
    ReleasePlanSpec, ReleaseSpec, ReleaseStrategy, ReleaseStrategySpec, Resource, ResourceKind,
    ResourceRef, Snapshot,
};
use crate::suite::ScenarioFixture;

use super::context::{require, ScenarioContext};
use super::machine::Scenario;
use super::step::{PlannedStep, StepError};
use super::{await_present, create};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateApplication,
    CreateReleaseStrategy,
    CreateReleasePlan,
    CreateReleasePlanAdmission,
    CreateSnapshot,
    CreateRelease,
    PipelineStarted,
    PipelineFinished,
    ReleaseSucceeded,
}

pub struct ReleasePath {
    fixture: ScenarioFixture,
}

impl ReleasePath {
    pub fn new(fixture: ScenarioFixture) -> Self {
        Self { fixture }
    }
}

#[async_trait]
impl Scenario for ReleasePath {
    type Step = Step;

    fn name(&self) -> &str {
        &self.fixture.name
    }

    fn plan(&self, timing: &TimingConfig) -> Vec<PlannedStep<Step>> {
        use PlannedStep as P;
        vec![
            P::mutation("create application", Step::CreateApplication),
            P::mutation("create release strategy", Step::CreateReleaseStrategy),
            P::mutation("create release plan", Step::CreateReleasePlan),
            P::mutation("create release plan admission", Step::CreateReleasePlanAdmission),
            P::mutation("create snapshot", Step::CreateSnapshot),
            P::mutation("create release", Step::CreateRelease),
            P::convergence(
                "release pipelinerun started",
                Step::PipelineStarted,
                timing.release_pipeline_started.timeout(),
            ),
            P::convergence(
                "release pipelinerun finished",
                Step::PipelineFinished,
                timing.release_pipeline_finished.timeout(),
            ),
            P::convergence(
                "release succeeded",
                Step::ReleaseSucceeded,
                timing.release_succeeded.timeout(),
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
        let names = &f.release;
        let dev = ctx.namespace.clone();
        let managed = ctx.managed_namespace.clone();
        let timing = ctx.timing.clone();

        match step {
            Step::CreateApplication => {
                let app = create(client, &Application::new(&f.application, &dev)).await?;
                ctx.track(&app, TeardownClass::Root);
                ctx.application = Some(app);
            }
            Step::CreateReleaseStrategy => {
                let strategy = ReleaseStrategy {
                    metadata: ObjectMeta::new(&names.strategy, &managed),
                    spec: ReleaseStrategySpec {
                        pipeline: names.pipeline.clone(),
                        bundle: names.bundle.clone(),
                        policy: names.policy.clone(),
                    },
                };
                let strategy = create(client, &strategy).await?;
                ctx.track(&strategy, TeardownClass::Child);
                ctx.release_strategy = Some(strategy);
            }
            Step::CreateReleasePlan => {
                let app = require(&ctx.application, "application")?.name().to_string();
                let plan = ReleasePlan {
                    metadata: ObjectMeta::new(&names.plan, &dev),
                    spec: ReleasePlanSpec {
                        display_name: names.plan.clone(),
                        application: app,
                        target: managed.clone(),
                    },
                };
                let plan = create(client, &plan).await?;
                ctx.track(&plan, TeardownClass::Child);
                ctx.release_plan = Some(plan);
            }
            Step::CreateReleasePlanAdmission => {
                let app = require(&ctx.application, "application")?.name().to_string();
                let strategy = require(&ctx.release_strategy, "release strategy")?
                    .name()
                    .to_string();
                let admission = ReleasePlanAdmission {
                    metadata: ObjectMeta::new(&names.plan_admission, &managed),
                    spec: ReleasePlanAdmissionSpec {
                        display_name: names.plan_admission.clone(),
                        application: app,
                        origin: dev.clone(),
                        environment: String::new(),
                        release_strategy: strategy,
                    },
                };
                let admission = create(client, &admission).await?;
                ctx.track(&admission, TeardownClass::Child);
                ctx.release_plan_admission = Some(admission);
            }
            Step::CreateSnapshot => {
                let app = require(&ctx.application, "application")?.name().to_string();
                let snapshot = Snapshot::new(ObjectMeta::new(&names.snapshot, &dev), app)
                    .with_component(&f.component, &f.sample_image);
                let snapshot = create(client, &snapshot).await?;
                ctx.track(&snapshot, TeardownClass::Child);
                ctx.snapshot = Some(snapshot);
            }
            Step::CreateRelease => {
                let snapshot = require(&ctx.snapshot, "snapshot")?.name().to_string();
                let plan = require(&ctx.release_plan, "release plan")?.name().to_string();
                let release = Release {
                    metadata: ObjectMeta::new(&names.release, &dev),
                    spec: ReleaseSpec {
                        snapshot,
                        release_plan: plan,
                    },
                    status: Default::default(),
                };
                let release = create(client, &release).await?;
                ctx.track(&release, TeardownClass::Child);
                ctx.release = Some(release);
            }
            Step::PipelineStarted | Step::PipelineFinished => {
                let release = require(&ctx.release, "release")?.name().to_string();
                let (release, dev, managed) = (release.as_str(), dev.as_str(), managed.as_str());
                let (check, poll) = if *step == Step::PipelineStarted {
                    (
                        predicate::present("release pipelinerun started"),
                        timing.release_pipeline_started.poll(),
                    )
                } else {
                    (
                        predicate::pipeline_finished("release pipelinerun finished"),
                        timing.release_pipeline_finished.poll(),
                    )
                };
                let target = ctx
                    .release_pipeline_run
                    .as_ref()
                    .map(|run| run.resource_ref())
                    .unwrap_or_else(|| ResourceRef::new(ResourceKind::PipelineRun, "", managed));
                let run = await_present(
                    target,
                    move || client.release_pipeline_run(managed, release, dev),
                    &check,
                    poll,
                )
                .await?;
                tracing::info!(pipelinerun = %run.name(), namespace = %managed, "release pipelinerun observed");
                ctx.release_pipeline_run = Some(run);
            }
            Step::ReleaseSucceeded => {
                let target = require(&ctx.release, "release")?.resource_ref();
                let (name, dev) = (target.name.as_str(), dev.as_str());
                let release = await_present(
                    target.clone(),
                    move || client.get::<Release>(name, dev),
                    &predicate::release_succeeded(),
                    timing.release_succeeded.poll(),
                )
                .await?;
                ctx.release = Some(release);
            }
        }
        Ok(())
    }
}
