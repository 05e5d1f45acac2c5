//! Runs one scenario fixture end to end.

use serde::Serialize;

use crate::accessor::Client;
use crate::config::SuiteConfig;
use crate::guard::TeardownReport;
use crate::namespace::{GeneratedNamespaces, NamespaceProvisioner};
use crate::scenario::{
    Diagnostic, HappyPath, NegativePath, ReleasePath, ScenarioContext, ScenarioMachine,
    ScenarioReport, StepRecord,
};

use super::fixture::{ScenarioFixture, ScenarioKind};

/// Result of running a fixture.
#[derive(Debug, Serialize)]
pub struct ScenarioResult {
    /// The fixture that was run.
    pub scenario: String,
    pub kind: ScenarioKind,
    /// Namespace the scenario ran in.
    pub namespace: String,
    /// Managed namespace, for scenarios that use one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_namespace: Option<String>,
    /// Overall pass/fail: every step passed and teardown left nothing broken.
    pub passed: bool,
    pub steps: Vec<StepRecord>,
    /// The failing step, if any.
    pub failure: Option<Diagnostic>,
    pub teardown: TeardownReport,
    pub elapsed_ms: u64,
}

/// Ties namespace allocation, the scenario machine and the lifecycle guard together.
pub struct SuiteHarness {
    config: SuiteConfig,
    machine: ScenarioMachine,
    namespaces: Box<dyn NamespaceProvisioner>,
}

impl SuiteHarness {
    /// Creates a harness that allocates namespaces from the configured prefix.
    pub fn new(config: SuiteConfig, client: Client) -> Self {
        let namespaces = Box::new(GeneratedNamespaces::new(&config.namespace_prefix));
        Self {
            config,
            machine: ScenarioMachine::new(client),
            namespaces,
        }
    }

    /// Replaces the namespace provisioner.
    pub fn with_namespaces(mut self, namespaces: impl NamespaceProvisioner + 'static) -> Self {
        self.namespaces = Box::new(namespaces);
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Runs a fixture and releases what it created.
    ///
    /// Teardown always runs; whether namespaced resources are deleted follows
    /// the configured policy and the scenario outcome.
    pub async fn run(&self, fixture: &ScenarioFixture) -> ScenarioResult {
        let namespace = self.namespaces.allocate(&fixture.name);
        let mut ctx = ScenarioContext::new(&namespace, self.config.timing.clone());

        let managed_namespace = match fixture.kind {
            ScenarioKind::Release => {
                let managed = self.config.managed_namespace.clone().unwrap_or_else(|| {
                    self.namespaces.allocate(&format!("{}-managed", fixture.name))
                });
                ctx = ctx.with_managed_namespace(&managed);
                Some(managed)
            }
            _ => None,
        };

        tracing::info!(
            scenario = %fixture.name,
            kind = fixture.kind.as_str(),
            namespace = %namespace,
            managed_namespace = ?managed_namespace,
            "running scenario fixture"
        );

        let report = self.run_kind(fixture, &mut ctx).await;
        let failed = !report.passed();

        let teardown = ctx
            .guard
            .release(self.machine.client(), self.config.teardown, failed)
            .await;

        let passed = !failed && teardown.is_clean();
        if !passed {
            tracing::info!(
                scenario = %fixture.name,
                namespace = %namespace,
                step_failed = failed,
                teardown_errors = teardown.errors.len(),
                "scenario fixture failed"
            );
        }

        ScenarioResult {
            scenario: fixture.name.clone(),
            kind: fixture.kind,
            namespace,
            managed_namespace,
            passed,
            steps: report.steps,
            failure: report.failure,
            teardown,
            elapsed_ms: report.elapsed_ms,
        }
    }

    async fn run_kind(&self, fixture: &ScenarioFixture, ctx: &mut ScenarioContext) -> ScenarioReport {
        let fixture = fixture.clone();
        match fixture.kind {
            ScenarioKind::HappyPath => self.machine.run(&HappyPath::new(fixture), ctx).await,
            ScenarioKind::NegativePath => self.machine.run(&NegativePath::new(fixture), ctx).await,
            ScenarioKind::Release => self.machine.run(&ReleasePath::new(fixture), ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::accessor::SimulatedPlatform;

    struct Fixed(&'static str);

    impl NamespaceProvisioner for Fixed {
        fn allocate(&self, scenario: &str) -> String {
            format!("{}-{}", self.0, scenario)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn release_fixture_gets_a_managed_namespace() {
        let platform = Arc::new(SimulatedPlatform::default());
        let harness = SuiteHarness::new(SuiteConfig::default(), Client::new(platform))
            .with_namespaces(Fixed("test"));

        let result = harness
            .run(&ScenarioFixture::new("rel", ScenarioKind::Release))
            .await;

        assert!(result.passed, "{:?}", result.failure);
        assert_eq!(result.namespace, "test-rel");
        assert_eq!(result.managed_namespace.as_deref(), Some("test-rel-managed"));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_managed_namespace_wins() {
        let platform = Arc::new(SimulatedPlatform::default());
        let config = SuiteConfig {
            managed_namespace: Some("managed".to_string()),
            ..SuiteConfig::default()
        };
        let harness = SuiteHarness::new(config, Client::new(platform)).with_namespaces(Fixed("test"));

        let result = harness
            .run(&ScenarioFixture::new("rel", ScenarioKind::Release))
            .await;
        assert_eq!(result.managed_namespace.as_deref(), Some("managed"));
    }

    #[tokio::test(start_paused = true)]
    async fn result_serializes_for_reporting() {
        let platform = Arc::new(SimulatedPlatform::default());
        let harness = SuiteHarness::new(SuiteConfig::default(), Client::new(platform))
            .with_namespaces(Fixed("test"));

        let result = harness
            .run(&ScenarioFixture::new("neg", ScenarioKind::NegativePath))
            .await;
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["kind"], "negative_path");
        assert_eq!(json["namespace"], "test-neg");
        assert!(json.get("managed_namespace").is_none());
        assert_eq!(json["steps"].as_array().unwrap().len(), 9);
    }
}
