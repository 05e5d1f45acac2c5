//! In-memory control plane.
//!
//! Stores objects in a map and can be told to fail upcoming reads, which is how
//! tests exercise the poller's handling of transient access errors.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::resource::{Object, ResourceKind, ResourceRef};

use super::{AccessError, LabelSelector, ResourceAccessor};

type Key = (ResourceKind, String, String);

fn key(kind: ResourceKind, name: &str, namespace: &str) -> Key {
    let namespace = if kind.is_cluster_scoped() { "" } else { namespace };
    (kind, namespace.to_string(), name.to_string())
}

/// Object storage shared by the in-memory and simulated accessors.
#[derive(Debug, Default)]
pub struct Store {
    objects: BTreeMap<Key, Object>,
}

impl Store {
    pub fn get(&self, kind: ResourceKind, name: &str, namespace: &str) -> Option<&Object> {
        self.objects.get(&key(kind, name, namespace))
    }

    pub fn get_mut(&mut self, kind: ResourceKind, name: &str, namespace: &str) -> Option<&mut Object> {
        self.objects.get_mut(&key(kind, name, namespace))
    }

    pub fn contains(&self, target: &ResourceRef) -> bool {
        self.get(target.kind, &target.name, &target.namespace).is_some()
    }

    /// Inserts a new object, generating its name if requested.
    pub fn insert(&mut self, mut object: Object) -> Result<Object, AccessError> {
        if object.metadata.name.is_empty() {
            let prefix = object.metadata.generate_name.clone().ok_or_else(|| {
                AccessError::Invalid(format!("{} needs a name or generateName", object.kind))
            })?;
            let suffix = &uuid::Uuid::new_v4().simple().to_string()[..5];
            object.metadata.name = format!("{}{}", prefix, suffix);
        }
        if object.kind.is_cluster_scoped() {
            object.metadata.namespace.clear();
        } else if object.metadata.namespace.is_empty() {
            return Err(AccessError::Invalid(format!(
                "{} {} needs a namespace",
                object.kind, object.metadata.name
            )));
        }

        let k = key(object.kind, &object.metadata.name, &object.metadata.namespace);
        if self.objects.contains_key(&k) {
            return Err(AccessError::AlreadyExists(object.resource_ref()));
        }
        object.metadata.creation_timestamp.get_or_insert_with(Utc::now);
        self.objects.insert(k, object.clone());
        Ok(object)
    }

    pub fn remove(&mut self, kind: ResourceKind, name: &str, namespace: &str) -> Option<Object> {
        self.objects.remove(&key(kind, name, namespace))
    }

    /// Objects of a kind, optionally limited to one namespace.
    pub fn list<'a>(
        &'a self,
        kind: ResourceKind,
        namespace: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Object> + 'a {
        self.objects.values().filter(move |o| {
            o.kind == kind
                && (kind.is_cluster_scoped()
                    || namespace.map_or(true, |ns| o.metadata.namespace == ns))
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Plain in-memory [`ResourceAccessor`].
#[derive(Debug, Default)]
pub struct InMemoryAccessor {
    store: Mutex<Store>,
    /// Reads left that should fail with a transient error.
    failing_reads: AtomicU64,
    reads: AtomicU64,
}

impl InMemoryAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` get/list calls fail transiently.
    pub fn fail_next_reads(&self, count: u64) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Number of get/list calls served so far, failed ones included.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Runs `f` with exclusive access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut store)
    }

    fn begin_read(&self) -> Result<(), AccessError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(remaining) => Err(AccessError::Transient(format!(
                "injected read failure ({} left)",
                remaining - 1
            ))),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceAccessor for InMemoryAccessor {
    async fn create(&self, object: Object) -> Result<Object, AccessError> {
        self.with_store(|store| store.insert(object))
    }

    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Object, AccessError> {
        self.begin_read()?;
        self.with_store(|store| {
            store
                .get(kind, name, namespace)
                .cloned()
                .ok_or_else(|| AccessError::not_found(&ResourceRef::new(kind, name, namespace)))
        })
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Object>, AccessError> {
        self.begin_read()?;
        self.with_store(|store| {
            Ok(store
                .list(kind, Some(namespace))
                .filter(|o| selector.matches(&o.metadata))
                .cloned()
                .collect())
        })
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<(), AccessError> {
        self.with_store(|store| {
            store
                .remove(kind, name, namespace)
                .map(|_| ())
                .ok_or_else(|| AccessError::not_found(&ResourceRef::new(kind, name, namespace)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Application, ObjectMeta, Snapshot};

    fn object<T: crate::resource::Resource>(resource: &T) -> Object {
        Object::from_resource(resource).unwrap()
    }

    #[tokio::test]
    async fn create_then_get() {
        let accessor = InMemoryAccessor::new();
        accessor.create(object(&Application::new("app", "ns"))).await.unwrap();

        let got = accessor.get(ResourceKind::Application, "app", "ns").await.unwrap();
        assert_eq!(got.metadata.name, "app");
        assert!(got.metadata.creation_timestamp.is_some());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let accessor = InMemoryAccessor::new();
        accessor.create(object(&Application::new("app", "ns"))).await.unwrap();
        let err = accessor
            .create(object(&Application::new("app", "ns")))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn generated_names_use_prefix() {
        let accessor = InMemoryAccessor::new();
        let created = accessor
            .create(object(&Snapshot::new(ObjectMeta::generated("snapshot-sample-", "ns"), "app")))
            .await
            .unwrap();
        assert!(created.metadata.name.starts_with("snapshot-sample-"));
        assert_eq!(created.metadata.name.len(), "snapshot-sample-".len() + 5);
    }

    #[tokio::test]
    async fn namespaced_object_without_namespace_is_invalid() {
        let accessor = InMemoryAccessor::new();
        let err = accessor
            .create(object(&Application::new("app", "")))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Invalid(_)));
    }

    #[tokio::test]
    async fn injected_failures_clear_after_count() {
        let accessor = InMemoryAccessor::new();
        accessor.create(object(&Application::new("app", "ns"))).await.unwrap();
        accessor.fail_next_reads(2);

        for _ in 0..2 {
            let err = accessor
                .get(ResourceKind::Application, "app", "ns")
                .await
                .unwrap_err();
            assert!(matches!(err, AccessError::Transient(_)));
        }
        accessor.get(ResourceKind::Application, "app", "ns").await.unwrap();
        assert_eq!(accessor.reads(), 3);
    }

    #[tokio::test]
    async fn list_is_namespace_scoped() {
        let accessor = InMemoryAccessor::new();
        accessor.create(object(&Application::new("a", "ns-1"))).await.unwrap();
        accessor.create(object(&Application::new("b", "ns-2"))).await.unwrap();

        let listed = accessor
            .list(ResourceKind::Application, "ns-1", &LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].metadata.name, "a");
    }
}
