//! Create-or-update of a single dependent object.

use crate::crd::GhostApp;
use crate::dependent::{Dependent, DependentKind, ObjectState};
use crate::error::{OperatorError, OperatorResult};
use crate::store::ObjectStore;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::fmt;

/// What [`ensure`] did to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The object did not exist and was created.
    Created,
    /// The object existed and was replaced.
    Updated,
    /// The object already matched; nothing was written.
    Unchanged,
}

impl fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnsureOutcome::Created => "created",
            EnsureOutcome::Updated => "updated",
            EnsureOutcome::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// Bring the `D` object owned by `app` in line with its desired state.
///
/// A missing object is created. An existing one is mutated according to the
/// kind's update policy and replaced only when that changed something.
pub async fn ensure<D: Dependent>(
    store: &dyn ObjectStore,
    app: &GhostApp,
) -> OperatorResult<EnsureOutcome> {
    let namespace = app.namespace().unwrap_or_default();
    let name = D::KIND.object_name(&app.name_any());

    let live = store
        .get(D::KIND, &namespace, &name)
        .await?
        .map(D::from_object)
        .transpose()?;

    let (mut object, state) = match live {
        Some(_) if !D::MUTABLE_AFTER_CREATE => {
            log_outcome(D::KIND, &name, EnsureOutcome::Unchanged);
            return Ok(EnsureOutcome::Unchanged);
        }
        Some(live) => (live, ObjectState::Live),
        None => {
            let mut object = D::default();
            object.meta_mut().name = Some(name.clone());
            object.meta_mut().namespace = Some(namespace.clone());
            (object, ObjectState::Absent)
        }
    };
    let before = object.clone();

    set_controller_reference(app, object.meta_mut(), D::KIND, &name)?;
    D::apply_update_policy(&mut object, D::desired(app)?, state);

    let outcome = match state {
        ObjectState::Absent => {
            store.create(&object.into_object()).await?;
            EnsureOutcome::Created
        }
        ObjectState::Live if object != before => {
            store.replace(&object.into_object()).await?;
            EnsureOutcome::Updated
        }
        ObjectState::Live => EnsureOutcome::Unchanged,
    };

    log_outcome(D::KIND, &name, outcome);
    Ok(outcome)
}

fn log_outcome(kind: DependentKind, name: &str, outcome: EnsureOutcome) {
    tracing::info!(kind = %kind, name = %name, result = %outcome, "Ensured dependent");
}

/// Make `app` the controller of the object described by `meta`.
///
/// Already being controlled by `app` is a no-op. Being controlled by anyone
/// else is an error.
fn set_controller_reference(
    app: &GhostApp,
    meta: &mut ObjectMeta,
    kind: DependentKind,
    name: &str,
) -> OperatorResult<()> {
    let owner = app
        .controller_owner_ref(&())
        .ok_or_else(|| OperatorError::OwnerReference {
            kind,
            name: name.to_string(),
            reason: "owner has no name or uid".to_string(),
        })?;

    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    if refs.iter().any(|r| r.uid == owner.uid) {
        return Ok(());
    }
    if let Some(existing) = refs.iter().find(|r| r.controller == Some(true)) {
        return Err(OperatorError::OwnerReference {
            kind,
            name: name.to_string(),
            reason: format!(
                "already controlled by {}/{}",
                existing.kind, existing.name
            ),
        });
    }
    refs.push(owner);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependent::DependentObject;
    use crate::resources::fixtures;
    use crate::store::{MemoryStore, MockObjectStore, StoreOp};
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::{ConfigMap, Service};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    fn config_map(store: &MemoryStore) -> ConfigMap {
        let object = store
            .object(DependentKind::ConfigMap, "blogs", "blog-ghost-config")
            .unwrap();
        ConfigMap::from_object(object).unwrap()
    }

    #[tokio::test]
    async fn creates_then_leaves_unchanged() {
        let store = MemoryStore::new();
        let app = fixtures::app("blog");

        let first = ensure::<ConfigMap>(&store, &app).await.unwrap();
        assert_eq!(first, EnsureOutcome::Created);

        let second = ensure::<ConfigMap>(&store, &app).await.unwrap();
        assert_eq!(second, EnsureOutcome::Unchanged);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn created_object_is_controlled_by_app() {
        let store = MemoryStore::new();
        let app = fixtures::app("blog");
        ensure::<ConfigMap>(&store, &app).await.unwrap();

        let refs = config_map(&store).metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "GhostApp");
        assert_eq!(refs[0].name, "blog");
        assert_eq!(refs[0].uid, "uid-blog");
        assert_eq!(refs[0].controller, Some(true));
    }

    #[tokio::test]
    async fn spec_change_updates() {
        let store = MemoryStore::new();
        let mut app = fixtures::app("blog");
        ensure::<Deployment>(&store, &app).await.unwrap();

        app.spec.replicas = 3;
        let outcome = ensure::<Deployment>(&store, &app).await.unwrap();
        assert_eq!(outcome, EnsureOutcome::Updated);
    }

    #[tokio::test]
    async fn existing_service_is_never_touched() {
        let store = MemoryStore::new();
        let mut app = fixtures::app("blog");
        ensure::<Service>(&store, &app).await.unwrap();

        app.spec.ingress.enabled = true;
        store.clear_writes();
        let outcome = ensure::<Service>(&store, &app).await.unwrap();
        assert_eq!(outcome, EnsureOutcome::Unchanged);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn owner_without_uid_is_rejected() {
        let store = MemoryStore::new();
        let mut app = fixtures::app("blog");
        app.metadata.uid = None;

        let err = ensure::<ConfigMap>(&store, &app).await.unwrap_err();
        assert!(matches!(
            err,
            OperatorError::OwnerReference {
                kind: DependentKind::ConfigMap,
                ..
            }
        ));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn foreign_controller_is_rejected() {
        let store = MemoryStore::new();
        let app = fixtures::app("blog");
        let mut foreign = ConfigMap::desired(&app).unwrap();
        foreign.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: "other".to_string(),
            uid: "uid-other".to_string(),
            controller: Some(true),
            block_owner_deletion: None,
        }]);
        store.insert_object(DependentObject::ConfigMap(foreign));

        let err = ensure::<ConfigMap>(&store, &app).await.unwrap_err();
        assert!(
            err.to_string().contains("already controlled by Deployment/other"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn non_controller_owner_is_kept() {
        let store = MemoryStore::new();
        let app = fixtures::app("blog");
        let mut shared = ConfigMap::desired(&app).unwrap();
        shared.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            name: "parent".to_string(),
            uid: "uid-parent".to_string(),
            controller: None,
            block_owner_deletion: None,
        }]);
        store.insert_object(DependentObject::ConfigMap(shared));

        let outcome = ensure::<ConfigMap>(&store, &app).await.unwrap();
        assert_eq!(outcome, EnsureOutcome::Updated);
        assert_eq!(config_map(&store).metadata.owner_references.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let mut store = MockObjectStore::new();
        store.expect_get().returning(|_, _, _| Ok(None));
        store.expect_create().returning(|object| {
            Err(OperatorError::StoreUnavailable(format!(
                "cannot create {}",
                object.name()
            )))
        });

        let err = ensure::<ConfigMap>(&store, &fixtures::app("blog"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Object store unavailable: cannot create blog-ghost-config"
        );
    }

    #[tokio::test]
    async fn read_failure_writes_nothing() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::Get, None, crate::store::Fault::Unavailable);
        assert!(
            ensure::<ConfigMap>(&store, &fixtures::app("blog"))
                .await
                .is_err()
        );
        assert!(store.writes().is_empty());
    }
}
