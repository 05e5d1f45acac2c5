//! Access to the remote control plane.
//!
//! The suite talks to the platform only through [`ResourceAccessor`]. Connection
//! setup and authentication belong to whoever constructs the accessor.

mod client;
pub mod memory;
pub mod simulated;

pub use client::{Client, SnapshotLookup};
pub use memory::InMemoryAccessor;
pub use simulated::{PlatformBehavior, SimulatedPlatform};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::resource::{Object, ObjectMeta, ResourceKind, ResourceRef};

/// Failure of a single accessor call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    /// The entity does not exist (yet, or any more).
    #[error("{message}")]
    NotFound { kind: ResourceKind, message: String },

    /// An entity with the same identity already exists.
    #[error("{0} already exists")]
    AlreadyExists(ResourceRef),

    /// The request was rejected as malformed.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Connectivity, throttling or any other failure expected to clear up.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl AccessError {
    /// NotFound for a concrete resource identity.
    pub fn not_found(target: &ResourceRef) -> Self {
        AccessError::NotFound {
            kind: target.kind,
            message: format!("{} not found", target),
        }
    }

    /// NotFound for a lookup that matched nothing.
    pub fn no_match(kind: ResourceKind, message: impl Into<String>) -> Self {
        AccessError::NotFound {
            kind,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound { .. })
    }
}

/// Equality-based label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    required: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector matching everything.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, metadata: &ObjectMeta) -> bool {
        self.required
            .iter()
            .all(|(k, v)| metadata.labels.get(k) == Some(v))
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .required
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Create/get/list/delete against the control plane.
///
/// `namespace` is ignored for cluster-scoped kinds.
#[async_trait]
pub trait ResourceAccessor: Send + Sync {
    /// Creates an object. Names are generated when only `generate_name` is set.
    async fn create(&self, object: Object) -> Result<Object, AccessError>;

    /// Reads a single object.
    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Object, AccessError>;

    /// Lists objects of a kind in a namespace matching the selector.
    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>, AccessError>;

    /// Deletes an object. Deletion may complete asynchronously.
    async fn delete(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<(), AccessError>;
}
