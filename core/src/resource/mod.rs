//! Resource model for the control plane under test.
//!
//! Entities are owned by the control plane; this module only describes their
//! shape so the suite can create them and read them back.

mod types;

pub use types::*;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Correlation and status keys shared with the platform.
pub mod keys {
    pub const APPLICATION: &str = "appstudio.openshift.io/application";
    pub const COMPONENT: &str = "appstudio.openshift.io/component";
    pub const SNAPSHOT: &str = "appstudio.openshift.io/snapshot";
    pub const ENVIRONMENT: &str = "appstudio.openshift.io/environment";
    pub const SCENARIO: &str = "test.appstudio.openshift.io/scenario";
    pub const BUILD_PIPELINE_RUN: &str = "appstudio.openshift.io/build-pipelinerun";
    pub const PIPELINE_TYPE: &str = "pipelines.appstudio.openshift.io/type";
    pub const EVENT_TYPE: &str = "pac.test.appstudio.openshift.io/event-type";
    pub const CHAINS_SIGNED: &str = "chains.tekton.dev/signed";
    pub const RELEASE_NAME: &str = "release.appstudio.openshift.io/name";
    pub const RELEASE_NAMESPACE: &str = "release.appstudio.openshift.io/namespace";

    /// Values of [`PIPELINE_TYPE`].
    pub const PIPELINE_TYPE_BUILD: &str = "build";
    pub const PIPELINE_TYPE_TEST: &str = "test";
    pub const PIPELINE_TYPE_RELEASE: &str = "release";

    /// Environment tag marking platform-managed ephemeral environments.
    pub const EPHEMERAL_TAG: &str = "ephemeral";

    pub const SUCCEEDED_CONDITION: &str = "Succeeded";
    pub const TESTS_SUCCEEDED_CONDITION: &str = "AppStudioTestSucceeded";

    /// Provisioner of a DeploymentTargetClass usable for ephemeral environments.
    pub const SANDBOX_PROVISIONER: &str = "appstudio.redhat.com/devsandbox";
}

/// Kinds of resources the suite manages or observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Application,
    Component,
    PipelineRun,
    Snapshot,
    IntegrationTestScenario,
    Environment,
    SnapshotEnvironmentBinding,
    DeploymentTargetClass,
    DeploymentTarget,
    DeploymentTargetClaim,
    SpaceRequest,
    ReleaseStrategy,
    ReleasePlan,
    ReleasePlanAdmission,
    Release,
}

impl ResourceKind {
    /// Returns true for kinds that live outside any namespace.
    pub fn is_cluster_scoped(self) -> bool {
        matches!(self, ResourceKind::DeploymentTargetClass)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity of a single resource on the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    /// Empty for cluster-scoped kinds.
    pub namespace: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let namespace = if kind.is_cluster_scoped() {
            String::new()
        } else {
            namespace.into()
        };
        Self {
            kind,
            name: name.into(),
            namespace,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{} {}", self.kind, self.name)
        } else {
            write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Standard object metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    /// Prefix for a server-generated name, used when `name` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Metadata whose name is chosen by the control plane.
    pub fn generated(prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            generate_name: Some(prefix.into()),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Tri-state status of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// A status condition as reported by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    pub fn new(type_: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: None,
            message: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Looks up a condition by type.
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Inserts or replaces a condition by type.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

/// A typed resource that can round-trip through the accessor.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn namespace(&self) -> &str {
        &self.metadata().namespace
    }

    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(Self::KIND, self.name(), self.namespace())
    }
}

/// Untyped form stored and transferred by accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: serde_json::Value,
}

impl Object {
    /// Converts a typed resource into its untyped form.
    pub fn from_resource<T: Resource>(resource: &T) -> serde_json::Result<Self> {
        let mut value = serde_json::to_value(resource)?;
        let take = |value: &mut serde_json::Value, key: &str| {
            value
                .get_mut(key)
                .map(serde_json::Value::take)
                .unwrap_or(serde_json::Value::Null)
        };
        let metadata = serde_json::from_value(take(&mut value, "metadata"))?;
        Ok(Self {
            kind: T::KIND,
            metadata,
            spec: take(&mut value, "spec"),
            status: take(&mut value, "status"),
        })
    }

    /// Converts back into a typed resource.
    pub fn into_resource<T: Resource>(self) -> serde_json::Result<T> {
        let mut value = serde_json::Map::new();
        value.insert("metadata".into(), serde_json::to_value(self.metadata)?);
        if !self.spec.is_null() {
            value.insert("spec".into(), self.spec);
        }
        if !self.status.is_null() {
            value.insert("status".into(), self.status);
        }
        serde_json::from_value(serde_json::Value::Object(value))
    }

    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.kind, &self.metadata.name, &self.metadata.namespace)
    }
}
