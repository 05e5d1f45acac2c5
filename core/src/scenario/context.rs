//! State shared between the steps of one scenario run.

use crate::config::TimingConfig;
use crate::guard::{LifecycleGuard, TeardownClass, Tracked};
use crate::resource::{
    Application, Component, DeploymentTargetClass, Environment, IntegrationTestScenario, PipelineRun,
    Release, ReleasePlan, ReleasePlanAdmission, ReleaseStrategy, Resource, Snapshot,
};

use super::step::StepError;

/// Everything earlier steps learned that later steps need.
///
/// One instance per scenario run; never shared between runs.
#[derive(Debug)]
pub struct ScenarioContext {
    pub namespace: String,
    /// Namespace release pipelines run in.
    pub managed_namespace: String,
    pub timing: TimingConfig,
    pub guard: LifecycleGuard,

    pub application: Option<Application>,
    pub component: Option<Component>,
    pub deployment_target_class: Option<DeploymentTargetClass>,
    pub user_environment: Option<Environment>,
    pub integration_test_scenario: Option<IntegrationTestScenario>,
    pub build_pipeline_run: Option<PipelineRun>,
    pub snapshot: Option<Snapshot>,
    pub push_snapshot: Option<Snapshot>,
    pub ephemeral_environment: Option<Environment>,
    pub test_pipeline_run: Option<PipelineRun>,

    pub release_strategy: Option<ReleaseStrategy>,
    pub release_plan: Option<ReleasePlan>,
    pub release_plan_admission: Option<ReleasePlanAdmission>,
    pub release: Option<Release>,
    pub release_pipeline_run: Option<PipelineRun>,
}

impl ScenarioContext {
    pub fn new(namespace: impl Into<String>, timing: TimingConfig) -> Self {
        let namespace = namespace.into();
        Self {
            managed_namespace: format!("{}-managed", namespace),
            guard: LifecycleGuard::new(namespace.clone()),
            namespace,
            timing,
            application: None,
            component: None,
            deployment_target_class: None,
            user_environment: None,
            integration_test_scenario: None,
            build_pipeline_run: None,
            snapshot: None,
            push_snapshot: None,
            ephemeral_environment: None,
            test_pipeline_run: None,
            release_strategy: None,
            release_plan: None,
            release_plan_admission: None,
            release: None,
            release_pipeline_run: None,
        }
    }

    pub fn with_managed_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.managed_namespace = namespace.into();
        self
    }

    /// Hands a resource to the lifecycle guard. Teardown waits until its
    /// deletion is observed.
    pub fn track<T: Resource>(&mut self, resource: &T, class: TeardownClass) {
        self.guard.track(
            Tracked::new(resource.resource_ref(), class).awaiting(self.timing.resource_deleted),
        );
    }
}

/// Borrows a value an earlier step recorded.
pub fn require<'a, T>(value: &'a Option<T>, what: &'static str) -> Result<&'a T, StepError> {
    value.as_ref().ok_or(StepError::MissingContext(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_value_names_what_is_missing() {
        let ctx = ScenarioContext::new("ns", TimingConfig::default());
        let err = require(&ctx.snapshot, "snapshot").unwrap_err();
        assert_eq!(err.to_string(), "scenario context has no snapshot");
    }

    #[test]
    fn managed_namespace_derives_from_namespace() {
        let ctx = ScenarioContext::new("release-e2e-1234", TimingConfig::default());
        assert_eq!(ctx.managed_namespace, "release-e2e-1234-managed");

        let ctx = ctx.with_managed_namespace("managed");
        assert_eq!(ctx.managed_namespace, "managed");
    }

    #[test]
    fn track_registers_with_guard() {
        let mut ctx = ScenarioContext::new("ns", TimingConfig::default());
        ctx.track(&Application::new("app", "ns"), TeardownClass::Root);
        assert_eq!(ctx.guard.tracked().len(), 1);
        assert_eq!(
            ctx.guard.tracked()[0].await_absence,
            Some(TimingConfig::default().resource_deleted)
        );
    }
}
