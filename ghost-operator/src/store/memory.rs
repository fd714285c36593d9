//! In-memory [`ObjectStore`] for tests and local runs.
//!
//! Mirrors the API server behaviours the reconciler relies on: keyed
//! objects, `resourceVersion` checks on replace, uid assignment on create
//! and "already exists" on duplicate create. Every write is recorded so
//! callers can assert on exactly what a reconciliation did, and faults can
//! be injected for the next matching operation.

use super::ObjectStore;
use crate::crd::{GhostApp, GhostAppStatus};
use crate::dependent::{DependentKind, DependentObject};
use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use kube::ResourceExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Store operation, used to match recorded writes and injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// `get_app`.
    GetApp,
    /// `patch_app_status`.
    PatchStatus,
    /// `get`.
    Get,
    /// `create`.
    Create,
    /// `replace`.
    Replace,
}

/// A write that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWrite {
    /// Operation performed.
    pub op: StoreOp,
    /// Dependent kind, `None` for GhostApp status writes.
    pub kind: Option<DependentKind>,
    /// Object name.
    pub name: String,
}

/// Failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Optimistic-concurrency rejection.
    Conflict,
    /// Transient store outage.
    Unavailable,
}

#[derive(Debug, Clone)]
struct FaultRule {
    op: StoreOp,
    kind: Option<DependentKind>,
    fault: Fault,
}

const CONFLICT_MESSAGE: &str =
    "the object has been modified; please apply your changes to the latest version and try again";

type AppKey = (String, String);
type ObjectKey = (DependentKind, String, String);

#[derive(Debug, Default)]
struct State {
    apps: BTreeMap<AppKey, GhostApp>,
    objects: BTreeMap<ObjectKey, DependentObject>,
    revision: u64,
    writes: Vec<StoreWrite>,
    faults: Vec<FaultRule>,
}

impl State {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    /// Remove and return the first fault matching `op` and `kind`.
    fn take_fault(
        &mut self,
        op: StoreOp,
        kind: Option<DependentKind>,
        name: &str,
    ) -> Option<OperatorError> {
        let idx = self
            .faults
            .iter()
            .position(|rule| rule.op == op && (rule.kind.is_none() || rule.kind == kind))?;
        let rule = self.faults.remove(idx);
        let kind = kind.map_or_else(|| "GhostApp".to_string(), |k| k.to_string());
        Some(match rule.fault {
            Fault::Conflict => OperatorError::Conflict {
                kind,
                name: name.to_string(),
                message: CONFLICT_MESSAGE.to_string(),
            },
            Fault::Unavailable => {
                OperatorError::StoreUnavailable(format!("injected outage on {kind}/{name}"))
            }
        })
    }
}

fn object_key(object: &DependentObject) -> ObjectKey {
    (
        object.kind(),
        object.namespace().to_string(),
        object.name().to_string(),
    )
}

/// Object store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryStore::insert_app`].
    pub fn with_app(self, app: GhostApp) -> Self {
        self.insert_app(app);
        self
    }

    /// Insert or overwrite a GhostApp, as a user applying a manifest would.
    ///
    /// `metadata.generation` starts at 1 and increments whenever the spec
    /// changes. An existing status is kept.
    pub fn insert_app(&self, mut app: GhostApp) {
        let mut state = self.state.write();
        let key = (app.namespace().unwrap_or_default(), app.name_any());
        match state.apps.get(&key) {
            Some(existing) => {
                let generation = existing.metadata.generation.unwrap_or(1);
                app.metadata.generation = if existing.spec == app.spec {
                    Some(generation)
                } else {
                    Some(generation + 1)
                };
                app.status = existing.status.clone();
            }
            None => app.metadata.generation = Some(1),
        }
        app.metadata.resource_version = Some(state.next_revision());
        state.apps.insert(key, app);
    }

    /// Remove a GhostApp. Dependents are left in place; garbage collection
    /// is the API server's job.
    pub fn remove_app(&self, namespace: &str, name: &str) -> Option<GhostApp> {
        self.state
            .write()
            .apps
            .remove(&(namespace.to_string(), name.to_string()))
    }

    /// Current copy of a GhostApp.
    pub fn app(&self, namespace: &str, name: &str) -> Option<GhostApp> {
        self.state
            .read()
            .apps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Seed a dependent object directly, bypassing the write log.
    pub fn insert_object(&self, mut object: DependentObject) {
        let mut state = self.state.write();
        object.metadata_mut().resource_version = Some(state.next_revision());
        state.objects.insert(object_key(&object), object);
    }

    /// Current copy of a dependent object.
    pub fn object(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> Option<DependentObject> {
        self.state
            .read()
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Every stored object of `kind`, ordered by namespace and name.
    pub fn objects_of(&self, kind: DependentKind) -> Vec<DependentObject> {
        self.state
            .read()
            .objects
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// Writes recorded since the last [`MemoryStore::clear_writes`].
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.state.read().writes.clone()
    }

    /// Dependent creates and replaces, ignoring status writes.
    pub fn dependent_writes(&self) -> Vec<StoreWrite> {
        self.state
            .read()
            .writes
            .iter()
            .filter(|w| w.kind.is_some())
            .cloned()
            .collect()
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        self.state.write().writes.clear();
    }

    /// Fail the next `op` on `kind` (any kind when `None`) with `fault`.
    pub fn fail_next(&self, op: StoreOp, kind: Option<DependentKind>, fault: Fault) {
        self.state.write().faults.push(FaultRule { op, kind, fault });
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_app(&self, namespace: &str, name: &str) -> OperatorResult<Option<GhostApp>> {
        let mut state = self.state.write();
        if let Some(err) = state.take_fault(StoreOp::GetApp, None, name) {
            return Err(err);
        }
        Ok(state
            .apps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn patch_app_status(
        &self,
        namespace: &str,
        name: &str,
        status: &GhostAppStatus,
    ) -> OperatorResult<()> {
        let mut state = self.state.write();
        if let Some(err) = state.take_fault(StoreOp::PatchStatus, None, name) {
            return Err(err);
        }
        let revision = state.next_revision();
        let app = state
            .apps
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| OperatorError::NotFound {
                kind: "GhostApp".to_string(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            })?;
        app.status = Some(status.clone());
        app.metadata.resource_version = Some(revision);
        state.writes.push(StoreWrite {
            op: StoreOp::PatchStatus,
            kind: None,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn get(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<DependentObject>> {
        let mut state = self.state.write();
        if let Some(err) = state.take_fault(StoreOp::Get, Some(kind), name) {
            return Err(err);
        }
        Ok(state
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create(&self, object: &DependentObject) -> OperatorResult<DependentObject> {
        let key = object_key(object);
        let mut state = self.state.write();
        if let Some(err) = state.take_fault(StoreOp::Create, Some(key.0), &key.2) {
            return Err(err);
        }
        if state.objects.contains_key(&key) {
            return Err(OperatorError::Conflict {
                kind: key.0.to_string(),
                name: key.2,
                message: "already exists".to_string(),
            });
        }

        let mut created = object.clone();
        let revision = state.next_revision();
        let meta = created.metadata_mut();
        meta.uid = Some(format!("{}-{}-{}", key.1, key.2, revision));
        meta.resource_version = Some(revision);

        state.writes.push(StoreWrite {
            op: StoreOp::Create,
            kind: Some(key.0),
            name: key.2.clone(),
        });
        state.objects.insert(key, created.clone());
        Ok(created)
    }

    async fn replace(&self, object: &DependentObject) -> OperatorResult<DependentObject> {
        let key = object_key(object);
        let mut state = self.state.write();
        if let Some(err) = state.take_fault(StoreOp::Replace, Some(key.0), &key.2) {
            return Err(err);
        }
        let Some(current) = state.objects.get(&key) else {
            return Err(OperatorError::NotFound {
                kind: key.0.to_string(),
                name: key.2,
                namespace: key.1,
            });
        };
        if current.metadata().resource_version != object.metadata().resource_version {
            return Err(OperatorError::Conflict {
                kind: key.0.to_string(),
                name: key.2,
                message: "resourceVersion mismatch".to_string(),
            });
        }

        let uid = current.metadata().uid.clone();
        let mut replaced = object.clone();
        let revision = state.next_revision();
        let meta = replaced.metadata_mut();
        meta.uid = uid;
        meta.resource_version = Some(revision);

        state.writes.push(StoreWrite {
            op: StoreOp::Replace,
            kind: Some(key.0),
            name: key.2.clone(),
        });
        state.objects.insert(key, replaced.clone());
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config_map(name: &str) -> DependentObject {
        DependentObject::ConfigMap(ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("blogs".to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn create_assigns_identity_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("cm")).await.unwrap();
        assert!(created.metadata().uid.is_some());
        assert!(created.metadata().resource_version.is_some());

        let err = store.create(&config_map("cm")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn replace_checks_resource_version() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("cm")).await.unwrap();

        let replaced = store.replace(&created).await.unwrap();
        assert_eq!(replaced.metadata().uid, created.metadata().uid);
        assert_ne!(
            replaced.metadata().resource_version,
            created.metadata().resource_version
        );

        // `created` now carries a stale resourceVersion.
        let err = store.replace(&created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn replace_missing_object_is_not_found() {
        let store = MemoryStore::new();
        let err = store.replace(&config_map("cm")).await.unwrap_err();
        assert!(matches!(err, OperatorError::NotFound { .. }));
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Create, Some(DependentKind::ConfigMap), Fault::Unavailable);

        let err = store.create(&config_map("cm")).await.unwrap_err();
        assert!(matches!(err, OperatorError::StoreUnavailable(_)));
        assert!(store.writes().is_empty());

        store.create(&config_map("cm")).await.unwrap();
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn fault_for_other_kind_does_not_fire() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Create, Some(DependentKind::Service), Fault::Conflict);
        store.create(&config_map("cm")).await.unwrap();
        assert_eq!(
            store
                .objects_of(DependentKind::ConfigMap)
                .iter()
                .map(|o| o.name().to_string())
                .collect::<Vec<_>>(),
            vec!["cm".to_string()]
        );
    }

    #[test]
    fn spec_changes_bump_generation() {
        let store = MemoryStore::new();
        let mut app = crate::resources::fixtures::app("blog");
        store.insert_app(app.clone());
        store.insert_app(app.clone());
        assert_eq!(store.app("blogs", "blog").unwrap().metadata.generation, Some(1));

        app.spec.replicas = 2;
        store.insert_app(app);
        assert_eq!(store.app("blogs", "blog").unwrap().metadata.generation, Some(2));
    }

    #[tokio::test]
    async fn status_patch_requires_app() {
        let store = MemoryStore::new();
        let err = store
            .patch_app_status("blogs", "missing", &GhostAppStatus::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OperatorError::NotFound { .. }));
    }
}
