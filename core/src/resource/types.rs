//! Typed entities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{find_condition, keys, Condition, ConditionStatus, ObjectMeta, Resource, ResourceKind};

macro_rules! resource {
    ($ty:ident, $kind:expr) => {
        impl Resource for $ty {
            const KIND: ResourceKind = $kind;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
        }
    };
}

/// Status block carrying only conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionsStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ApplicationSpec,
}

impl Application {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            spec: ApplicationSpec {
                display_name: name.clone(),
            },
            metadata: ObjectMeta::new(name, namespace),
        }
    }
}

resource!(Application, ResourceKind::Application);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    #[serde(default)]
    pub component_name: String,
    #[serde(default)]
    pub application: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ComponentSpec,
}

impl Component {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        application: impl Into<String>,
        git_url: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            spec: ComponentSpec {
                component_name: name.clone(),
                application: application.into(),
                git_url: Some(git_url.into()),
                container_image: None,
            },
            metadata: ObjectMeta::new(name, namespace),
        }
    }
}

resource!(Component, ResourceKind::Component);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_ref: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PipelineRunSpec,
    #[serde(default)]
    pub status: PipelineRunStatus,
}

impl PipelineRun {
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            spec: PipelineRunSpec::default(),
            status: PipelineRunStatus::default(),
        }
    }

    /// The `Succeeded` condition, if the run has reported one.
    pub fn succeeded_condition(&self) -> Option<&Condition> {
        find_condition(&self.status.conditions, keys::SUCCEEDED_CONDITION)
    }

    /// Whether the run reached a terminal state, successful or not.
    pub fn is_done(&self) -> bool {
        self.succeeded_condition()
            .map(|c| c.status != ConditionStatus::Unknown)
            .unwrap_or(false)
    }

    pub fn has_succeeded(&self) -> bool {
        self.succeeded_condition()
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }

    pub fn pipeline_type(&self) -> Option<&str> {
        self.metadata.label(keys::PIPELINE_TYPE)
    }
}

resource!(PipelineRun, ResourceKind::PipelineRun);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotComponent {
    pub name: String,
    pub container_image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSpec {
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub components: Vec<SnapshotComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SnapshotSpec,
    #[serde(default)]
    pub status: ConditionsStatus,
}

impl Snapshot {
    pub fn new(metadata: ObjectMeta, application: impl Into<String>) -> Self {
        Self {
            metadata,
            spec: SnapshotSpec {
                application: application.into(),
                components: Vec::new(),
            },
            status: ConditionsStatus::default(),
        }
    }

    pub fn with_component(mut self, name: impl Into<String>, image: impl Into<String>) -> Self {
        self.spec.components.push(SnapshotComponent {
            name: name.into(),
            container_image: image.into(),
        });
        self
    }

    /// Whether the platform marked this snapshot's integration tests as passed.
    pub fn tests_succeeded(&self) -> bool {
        find_condition(&self.status.conditions, keys::TESTS_SUCCEEDED_CONDITION)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }
}

resource!(Snapshot, ResourceKind::Snapshot);

/// Environment an integration test scenario should deploy into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestEnvironment {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationTestScenarioSpec {
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub git_url: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub path_in_repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<TestEnvironment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationTestScenario {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: IntegrationTestScenarioSpec,
}

impl IntegrationTestScenario {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        application: impl Into<String>,
        git_url: impl Into<String>,
        revision: impl Into<String>,
        path_in_repo: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(name, namespace),
            spec: IntegrationTestScenarioSpec {
                application: application.into(),
                git_url: git_url.into(),
                revision: revision.into(),
                path_in_repo: path_in_repo.into(),
                environment: None,
            },
        }
    }

    /// Runs the tests against a copy of `environment`.
    pub fn with_environment(mut self, environment: &Environment) -> Self {
        self.spec.environment = Some(TestEnvironment {
            name: environment.metadata.name.clone(),
            type_: "POC".to_string(),
        });
        self
    }
}

resource!(IntegrationTestScenario, ResourceKind::IntegrationTestScenario);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub deployment_strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_environment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_target_claim: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: EnvironmentSpec,
}

impl Environment {
    /// A user-provisioned environment with the manual deployment strategy.
    pub fn poc(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            spec: EnvironmentSpec {
                display_name: name.clone(),
                deployment_strategy: "AppStudioAutomated".to_string(),
                ..Default::default()
            },
            metadata: ObjectMeta::new(name, namespace),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.spec.tags.iter().any(|t| t == keys::EPHEMERAL_TAG)
    }
}

resource!(Environment, ResourceKind::Environment);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEnvironmentBindingSpec {
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub snapshot: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEnvironmentBinding {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SnapshotEnvironmentBindingSpec,
}

resource!(SnapshotEnvironmentBinding, ResourceKind::SnapshotEnvironmentBinding);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTargetClassSpec {
    #[serde(default)]
    pub provisioner: String,
    #[serde(default)]
    pub reclaim_policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTargetClass {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentTargetClassSpec,
}

impl DeploymentTargetClass {
    /// The sandbox-provisioned class ephemeral environments rely on.
    pub fn sandbox(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(name, ""),
            spec: DeploymentTargetClassSpec {
                provisioner: keys::SANDBOX_PROVISIONER.to_string(),
                reclaim_policy: "Delete".to_string(),
            },
        }
    }
}

resource!(DeploymentTargetClass, ResourceKind::DeploymentTargetClass);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTargetSpec {
    #[serde(default)]
    pub deployment_target_class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentTargetSpec,
}

resource!(DeploymentTarget, ResourceKind::DeploymentTarget);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTargetClaimSpec {
    #[serde(default)]
    pub deployment_target_class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentTargetClaim {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentTargetClaimSpec,
}

resource!(DeploymentTargetClaim, ResourceKind::DeploymentTargetClaim);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceRequestSpec {
    #[serde(default)]
    pub tier_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceRequest {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SpaceRequestSpec,
}

resource!(SpaceRequest, ResourceKind::SpaceRequest);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseStrategySpec {
    #[serde(default)]
    pub pipeline: String,
    #[serde(default)]
    pub bundle: String,
    #[serde(default)]
    pub policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseStrategy {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReleaseStrategySpec,
}

resource!(ReleaseStrategy, ResourceKind::ReleaseStrategy);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePlanSpec {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub application: String,
    /// Managed namespace releases are carried out in.
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasePlan {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReleasePlanSpec,
}

resource!(ReleasePlan, ResourceKind::ReleasePlan);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePlanAdmissionSpec {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub application: String,
    /// Namespace releases are accepted from.
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub release_strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasePlanAdmission {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReleasePlanAdmissionSpec,
}

resource!(ReleasePlanAdmission, ResourceKind::ReleasePlanAdmission);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    #[serde(default)]
    pub snapshot: String,
    #[serde(default)]
    pub release_plan: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReleaseSpec,
    #[serde(default)]
    pub status: ConditionsStatus,
}

impl Release {
    pub fn succeeded_condition(&self) -> Option<&Condition> {
        find_condition(&self.status.conditions, keys::SUCCEEDED_CONDITION)
    }
}

resource!(Release, ResourceKind::Release);
