//! Scenario fixture loading and parsing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::accessor::PlatformBehavior;
use crate::error::{Error, Result};

/// Which scenario a fixture runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Build, test in an ephemeral environment, tear it down.
    #[default]
    HappyPath,
    /// No usable DeploymentTargetClass, so nothing gets provisioned.
    NegativePath,
    /// Release a snapshot into a managed namespace.
    Release,
}

impl ScenarioKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.replace('-', "_").as_str() {
            "happy_path" | "happy" => Some(Self::HappyPath),
            "negative_path" | "negative" => Some(Self::NegativePath),
            "release" => Some(Self::Release),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HappyPath => "happy_path",
            Self::NegativePath => "negative_path",
            Self::Release => "release",
        }
    }
}

/// Names, repositories and images a scenario uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFixture {
    /// Fixture name, also used in the generated namespace name.
    pub name: String,

    #[serde(default)]
    pub kind: ScenarioKind,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_application")]
    pub application: String,

    #[serde(default = "default_component")]
    pub component: String,

    #[serde(default = "default_component_git_url")]
    pub component_git_url: String,

    #[serde(default = "default_integration_test_scenario")]
    pub integration_test_scenario: String,

    #[serde(default)]
    pub test: TestRepo,

    /// Pre-provisioned environment the scenario's tests target.
    #[serde(default = "default_user_environment")]
    pub user_environment: String,

    #[serde(default = "default_deployment_target_class")]
    pub deployment_target_class: String,

    /// Image used for manually created snapshots.
    #[serde(default = "default_sample_image")]
    pub sample_image: String,

    #[serde(default)]
    pub release: ReleaseNames,

    /// How the simulated platform behaves when the fixture is rehearsed.
    #[serde(default)]
    pub platform: PlatformBehavior,
}

/// Where the integration test pipeline definition lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRepo {
    #[serde(default = "default_test_git_url")]
    pub git_url: String,
    #[serde(default = "default_test_revision")]
    pub revision: String,
    #[serde(default = "default_test_path")]
    pub path_in_repo: String,
}

impl Default for TestRepo {
    fn default() -> Self {
        Self {
            git_url: default_test_git_url(),
            revision: default_test_revision(),
            path_in_repo: default_test_path(),
        }
    }
}

/// Names of the resources the release scenario creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseNames {
    pub strategy: String,
    pub plan: String,
    pub plan_admission: String,
    pub snapshot: String,
    pub release: String,
    pub pipeline: String,
    pub bundle: String,
    pub policy: String,
}

impl Default for ReleaseNames {
    fn default() -> Self {
        Self {
            strategy: "strategy".to_string(),
            plan: "source-releaseplan".to_string(),
            plan_admission: "demo".to_string(),
            snapshot: "snapshot".to_string(),
            release: "release".to_string(),
            pipeline: "release".to_string(),
            bundle: "quay.io/hacbs-release/pipeline-release:0.13".to_string(),
            policy: "policy".to_string(),
        }
    }
}

fn default_application() -> String {
    "app".to_string()
}

fn default_component() -> String {
    "comp".to_string()
}

fn default_component_git_url() -> String {
    "https://github.com/redhat-appstudio-qe/hacbs-test-project".to_string()
}

fn default_integration_test_scenario() -> String {
    "example-pass".to_string()
}

fn default_test_git_url() -> String {
    "https://github.com/redhat-appstudio/integration-examples.git".to_string()
}

fn default_test_revision() -> String {
    "main".to_string()
}

fn default_test_path() -> String {
    "pipelines/integration_test_app.yaml".to_string()
}

fn default_user_environment() -> String {
    "user-picked-environment".to_string()
}

fn default_deployment_target_class() -> String {
    "isolation-level-namespace".to_string()
}

fn default_sample_image() -> String {
    "quay.io/redhat-appstudio/sample-image@sha256:841328df1b9f8c4087adbdcfec6cc99ac8308805dea83f6d415d6fb8d40227c1"
        .to_string()
}

impl ScenarioFixture {
    /// Fixture for `kind` with every name at its default.
    pub fn new(name: impl Into<String>, kind: ScenarioKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            application: default_application(),
            component: default_component(),
            component_git_url: default_component_git_url(),
            integration_test_scenario: default_integration_test_scenario(),
            test: TestRepo::default(),
            user_environment: default_user_environment(),
            deployment_target_class: default_deployment_target_class(),
            sample_image: default_sample_image(),
            release: ReleaseNames::default(),
            platform: PlatformBehavior::default(),
        }
    }

    pub fn with_platform(mut self, platform: PlatformBehavior) -> Self {
        self.platform = platform;
        self
    }

    /// Loads a fixture from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(Error::Io)?;

        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse fixture: {}", e)))
    }
}
