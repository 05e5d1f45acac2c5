//! Scenario integration tests.
//!
//! Every scenario runs against the simulated platform with paused tokio time,
//! so multi-minute convergence budgets elapse instantly and deterministically.
//!
//! Run with: `cargo test --test scenario_test`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use appstudio_e2e::guard::TeardownTarget;
use appstudio_e2e::resource::{keys, DeploymentTargetClass};
use appstudio_e2e::{
    AccessError, Client, LabelSelector, LastObservation, Object, PlatformBehavior,
    ResourceAccessor, ResourceKind, ScenarioFixture, ScenarioKind, ScenarioResult,
    SimulatedPlatform, StepOutcome, SuiteConfig, SuiteHarness, TimingConfig,
};

fn harness(platform: &Arc<SimulatedPlatform>, config: SuiteConfig) -> SuiteHarness {
    SuiteHarness::new(config, Client::new(platform.clone()))
}

async fn run(kind: ScenarioKind, behavior: PlatformBehavior) -> (Arc<SimulatedPlatform>, ScenarioResult) {
    let platform = Arc::new(SimulatedPlatform::new(behavior));
    let result = harness(&platform, SuiteConfig::default())
        .run(&ScenarioFixture::new(kind.as_str(), kind))
        .await;
    (platform, result)
}

fn failed_step(result: &ScenarioResult) -> &str {
    result
        .failure
        .as_ref()
        .map(|f| f.step.as_str())
        .unwrap_or("<none>")
}

fn names(targets: &[TeardownTarget]) -> Vec<String> {
    targets.iter().map(ToString::to_string).collect()
}

#[tokio::test(start_paused = true)]
async fn happy_path_converges_and_cleans_up() {
    let (platform, result) = run(ScenarioKind::HappyPath, PlatformBehavior::default()).await;

    assert!(result.passed, "failed at {}: {:?}", failed_step(&result), result.failure);
    assert_eq!(result.steps.len(), 16);
    assert!(result.steps.iter().all(|s| s.outcome == StepOutcome::Passed));
    assert!(result.teardown.retained.is_empty());

    let ns = result.namespace.as_str();
    assert!(ns.starts_with("e2e-happy-path-"));
    assert!(!platform.contains_any(ResourceKind::Application, ns));
    assert!(!platform.contains_any(ResourceKind::Component, ns));
    assert!(!platform.contains_any(ResourceKind::IntegrationTestScenario, ns));
    assert!(!platform.contains_any(ResourceKind::DeploymentTargetClass, ""));
    // The platform tore down the ephemeral environment and what provisioned it.
    assert!(!platform.contains_any(ResourceKind::Environment, ns));
    assert!(!platform.contains_any(ResourceKind::SnapshotEnvironmentBinding, ns));
    assert!(!platform.contains_any(ResourceKind::SpaceRequest, ns));
    // The snapshot the platform created is cleaned up with the rest.
    assert!(!platform.contains_any(ResourceKind::Snapshot, ns));
    assert!(names(&result.teardown.deleted)
        .iter()
        .any(|n| n.starts_with("Snapshot ")));
}

#[tokio::test(start_paused = true)]
async fn unsigned_build_fails_fast_and_keeps_evidence() {
    let behavior = PlatformBehavior {
        sign_builds: false,
        ..Default::default()
    };
    let (platform, result) = run(ScenarioKind::HappyPath, behavior).await;

    assert!(!result.passed);
    assert_eq!(failed_step(&result), "build pipelinerun signed");

    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, Some(ResourceKind::PipelineRun));
    let build = failure.name.as_deref().unwrap_or_default();
    assert!(build.contains("-build-"), "diagnostic names {:?}", failure.name);
    assert!(failure.reason.contains("failed: pipelinerun"), "{}", failure.reason);
    assert!(failure.reason.contains("after 1 attempt(s)"), "{}", failure.reason);
    assert!(matches!(failure.last_state, LastObservation::Present(_)));

    let skipped = result
        .steps
        .iter()
        .filter(|s| s.outcome == StepOutcome::Skipped)
        .count();
    assert_eq!(skipped, 8);

    // Namespaced resources stay for diagnosis; the cluster-scoped class goes.
    let ns = result.namespace.as_str();
    assert!(platform.contains_any(ResourceKind::Application, ns));
    assert!(platform.contains_any(ResourceKind::Component, ns));
    assert!(!platform.contains_any(ResourceKind::DeploymentTargetClass, ""));
    assert_eq!(
        names(&result.teardown.deleted),
        vec!["DeploymentTargetClass isolation-level-namespace"]
    );
    assert_eq!(result.teardown.retained.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_build_is_reported_without_waiting_for_timeout() {
    let behavior = PlatformBehavior {
        build_succeeds: false,
        ..Default::default()
    };
    let (_, result) = run(ScenarioKind::HappyPath, behavior).await;

    assert_eq!(failed_step(&result), "build pipelinerun finished");
    let failure = result.failure.as_ref().unwrap();
    assert!(failure.reason.contains("failed: Failed"), "{}", failure.reason);
    assert!(failure.elapsed_ms < TimingConfig::default().build_finished.timeout().as_millis() as u64);
}

#[tokio::test(start_paused = true)]
async fn stuck_test_pipeline_times_out_with_last_state() {
    let platform = Arc::new(SimulatedPlatform::new(PlatformBehavior {
        tests_finish: false,
        ..Default::default()
    }));
    let config = SuiteConfig {
        timing: TimingConfig::uniform(20, 1_000),
        ..SuiteConfig::default()
    };
    let result = harness(&platform, config)
        .run(&ScenarioFixture::new("stuck", ScenarioKind::HappyPath))
        .await;

    assert!(!result.passed);
    assert_eq!(failed_step(&result), "integration pipelinerun finished");

    let failure = result.failure.as_ref().unwrap();
    assert!(failure.reason.contains("timed out"), "{}", failure.reason);
    assert!(failure.elapsed_ms >= 20_000);
    match &failure.last_state {
        LastObservation::Present(run) => {
            assert_eq!(run["metadata"]["labels"]["test.appstudio.openshift.io/scenario"], "example-pass");
            // The wait follows the run that correlated when it started.
            assert_eq!(failure.name.as_deref(), run["metadata"]["name"].as_str());
        }
        other => panic!("expected a last observed pipelinerun, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn failing_tests_fail_the_scenario() {
    let behavior = PlatformBehavior {
        tests_succeed: false,
        ..Default::default()
    };
    let (_, result) = run(ScenarioKind::HappyPath, behavior).await;

    assert!(!result.passed);
    assert_eq!(failed_step(&result), "integration pipelinerun finished");
}

#[tokio::test(start_paused = true)]
async fn missing_ephemeral_teardown_times_out_on_binding() {
    let platform = Arc::new(SimulatedPlatform::new(PlatformBehavior {
        teardown_ephemeral: false,
        ..Default::default()
    }));
    let config = SuiteConfig {
        timing: TimingConfig::uniform(10, 1_000),
        ..SuiteConfig::default()
    };
    let result = harness(&platform, config)
        .run(&ScenarioFixture::new("no-teardown", ScenarioKind::HappyPath))
        .await;

    assert_eq!(failed_step(&result), "snapshot environment binding deleted");
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, Some(ResourceKind::SnapshotEnvironmentBinding));
    assert!(failure.name.as_deref().is_some_and(|n| !n.is_empty()), "{:?}", failure.name);
    assert!(failure.reason.contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn transient_read_failures_are_tolerated() {
    let platform = Arc::new(SimulatedPlatform::default());
    platform.fail_next_reads(3);

    let result = harness(&platform, SuiteConfig::default())
        .run(&ScenarioFixture::new("flaky", ScenarioKind::HappyPath))
        .await;

    assert!(result.passed, "failed at {}: {:?}", failed_step(&result), result.failure);
}

/// Fails the first snapshot lookup by build pipelinerun, then behaves.
struct DropsFirstSnapshotLookup {
    platform: Arc<SimulatedPlatform>,
    dropped: AtomicBool,
}

#[async_trait]
impl ResourceAccessor for DropsFirstSnapshotLookup {
    async fn create(&self, object: Object) -> Result<Object, AccessError> {
        self.platform.create(object).await
    }

    async fn get(&self, kind: ResourceKind, name: &str, namespace: &str) -> Result<Object, AccessError> {
        self.platform.get(kind, name, namespace).await
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>, AccessError> {
        let by_build = kind == ResourceKind::Snapshot
            && selector.to_string().contains(keys::BUILD_PIPELINE_RUN);
        if by_build && !self.dropped.swap(true, Ordering::SeqCst) {
            return Err(AccessError::Transient("connection reset".to_string()));
        }
        self.platform.list(kind, namespace, selector).await
    }

    async fn delete(&self, kind: ResourceKind, name: &str, namespace: &str) -> Result<(), AccessError> {
        self.platform.delete(kind, name, namespace).await
    }
}

#[tokio::test(start_paused = true)]
async fn transient_failure_on_test_result_read_is_retried() {
    let platform = Arc::new(SimulatedPlatform::default());
    let flaky = Arc::new(DropsFirstSnapshotLookup {
        platform: platform.clone(),
        dropped: AtomicBool::new(false),
    });

    let result = SuiteHarness::new(SuiteConfig::default(), Client::new(flaky.clone()))
        .run(&ScenarioFixture::new("flaky-result", ScenarioKind::HappyPath))
        .await;

    assert!(flaky.dropped.load(Ordering::SeqCst));
    assert!(result.passed, "failed at {}: {:?}", failed_step(&result), result.failure);
}

#[tokio::test(start_paused = true)]
async fn negative_path_provisions_nothing() {
    let (platform, result) = run(ScenarioKind::NegativePath, PlatformBehavior::default()).await;

    assert!(result.passed, "failed at {}: {:?}", failed_step(&result), result.failure);
    assert_eq!(result.steps.len(), 9);

    let ns = result.namespace.as_str();
    assert!(!platform.contains_any(ResourceKind::SpaceRequest, ns));
    assert!(!platform.contains_any(ResourceKind::DeploymentTarget, ns));
    assert!(!platform.contains_any(ResourceKind::DeploymentTargetClaim, ns));
    // Teardown removed every Environment in the namespace.
    assert!(!platform.contains_any(ResourceKind::Environment, ns));
    assert!(names(&result.teardown.deleted).contains(&format!("all Environment in {}", ns)));
}

#[tokio::test(start_paused = true)]
async fn negative_path_fails_when_a_class_is_available() {
    let platform = Arc::new(SimulatedPlatform::default());
    let client = Client::new(platform.clone());
    client
        .create(&DeploymentTargetClass::sandbox("isolation-level-namespace"))
        .await
        .unwrap();

    let result = SuiteHarness::new(SuiteConfig::default(), client)
        .run(&ScenarioFixture::new("neg", ScenarioKind::NegativePath))
        .await;

    assert!(!result.passed);
    assert_eq!(failed_step(&result), "no deployment target class available");
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, Some(ResourceKind::DeploymentTargetClass));
    assert_eq!(failure.namespace, result.namespace);
}

#[tokio::test(start_paused = true)]
async fn release_succeeds_in_managed_namespace() {
    let (platform, result) = run(ScenarioKind::Release, PlatformBehavior::default()).await;

    assert!(result.passed, "failed at {}: {:?}", failed_step(&result), result.failure);
    let managed = result.managed_namespace.clone().unwrap();
    assert_ne!(managed, result.namespace);

    // The release pipelinerun belongs to the platform and stays.
    assert!(platform.contains_any(ResourceKind::PipelineRun, &managed));
    assert!(!platform.contains_any(ResourceKind::ReleaseStrategy, &managed));
    assert!(!platform.contains_any(ResourceKind::ReleasePlanAdmission, &managed));
    assert!(!platform.contains_any(ResourceKind::Release, &result.namespace));
}

#[tokio::test(start_paused = true)]
async fn failed_release_pipeline_is_reported() {
    let behavior = PlatformBehavior {
        release_succeeds: false,
        ..Default::default()
    };
    let (_, result) = run(ScenarioKind::Release, behavior).await;

    assert!(!result.passed);
    assert_eq!(failed_step(&result), "release pipelinerun finished");
    assert_eq!(result.steps.last().unwrap().outcome, StepOutcome::Skipped);
}

#[tokio::test(start_paused = true)]
async fn teardown_on_failure_can_be_enabled() {
    let platform = Arc::new(SimulatedPlatform::new(PlatformBehavior {
        sign_builds: false,
        ..Default::default()
    }));
    let config = SuiteConfig::from_toml("[teardown]\non_failure = true\n").unwrap();
    let result = harness(&platform, config)
        .run(&ScenarioFixture::new("cleanup", ScenarioKind::HappyPath))
        .await;

    assert!(!result.passed);
    assert!(result.teardown.retained.is_empty());
    assert!(!platform.contains_any(ResourceKind::Application, &result.namespace));
}
