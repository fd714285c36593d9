//! [`ObjectStore`] backed by the Kubernetes API server.

use super::ObjectStore;
use crate::crd::{GhostApp, GhostAppStatus};
use crate::dependent::{DependentKind, DependentObject};
use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Object store talking to the API server through a [`kube::Client`].
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    /// Create a store that writes as `field_manager`.
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        }
    }

    async fn get_typed<K>(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| classify(e, &kind.to_string(), namespace, name))
    }

    async fn create_typed<K>(&self, kind: DependentKind, object: &K) -> OperatorResult<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let namespace = object.meta().namespace.clone().unwrap_or_default();
        let name = object.meta().name.clone().unwrap_or_default();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&self.post_params(), object)
            .await
            .map_err(|e| classify(e, &kind.to_string(), &namespace, &name))
    }

    async fn replace_typed<K>(&self, kind: DependentKind, object: &K) -> OperatorResult<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let namespace = object.meta().namespace.clone().unwrap_or_default();
        let name = object.meta().name.clone().unwrap_or_default();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        // The object carries the resourceVersion it was read at, so a
        // concurrent write surfaces as 409.
        api.replace(&name, &self.post_params(), object)
            .await
            .map_err(|e| classify(e, &kind.to_string(), &namespace, &name))
    }
}

/// Map API server failures onto the operator's error taxonomy.
fn classify(err: kube::Error, kind: &str, namespace: &str, name: &str) -> OperatorError {
    match err {
        kube::Error::Api(resp) if resp.code == 409 => OperatorError::Conflict {
            kind: kind.to_string(),
            name: name.to_string(),
            message: resp.message,
        },
        kube::Error::Api(resp) if resp.code == 404 => OperatorError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        kube::Error::Api(resp) if resp.code == 429 || resp.code >= 500 => {
            OperatorError::StoreUnavailable(format!("{} ({})", resp.message, resp.code))
        }
        other => other.into(),
    }
}

/// JSON merge patch for the status subresource. An unset `reason` is sent as
/// `null` so that a stale reason is cleared.
fn status_patch(status: &GhostAppStatus) -> OperatorResult<serde_json::Value> {
    let mut body = serde_json::to_value(status)?;
    if status.reason.is_none() {
        body["reason"] = serde_json::Value::Null;
    }
    Ok(serde_json::json!({ "status": body }))
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_app(&self, namespace: &str, name: &str) -> OperatorResult<Option<GhostApp>> {
        let api: Api<GhostApp> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| classify(e, "GhostApp", namespace, name))
    }

    async fn patch_app_status(
        &self,
        namespace: &str,
        name: &str,
        status: &GhostAppStatus,
    ) -> OperatorResult<()> {
        let api: Api<GhostApp> = Api::namespaced(self.client.clone(), namespace);
        let patch = status_patch(status)?;

        api.patch_status(
            name,
            &PatchParams::apply(&self.field_manager),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|e| classify(e, "GhostApp", namespace, name))?;

        Ok(())
    }

    async fn get(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<DependentObject>> {
        let object = match kind {
            DependentKind::ConfigMap => self
                .get_typed::<ConfigMap>(kind, namespace, name)
                .await?
                .map(DependentObject::ConfigMap),
            DependentKind::PersistentVolumeClaim => self
                .get_typed::<PersistentVolumeClaim>(kind, namespace, name)
                .await?
                .map(DependentObject::PersistentVolumeClaim),
            DependentKind::Deployment => self
                .get_typed::<Deployment>(kind, namespace, name)
                .await?
                .map(DependentObject::Deployment),
            DependentKind::Service => self
                .get_typed::<Service>(kind, namespace, name)
                .await?
                .map(DependentObject::Service),
            DependentKind::Ingress => self
                .get_typed::<Ingress>(kind, namespace, name)
                .await?
                .map(DependentObject::Ingress),
        };
        Ok(object)
    }

    async fn create(&self, object: &DependentObject) -> OperatorResult<DependentObject> {
        let kind = object.kind();
        let created = match object {
            DependentObject::ConfigMap(o) => {
                DependentObject::ConfigMap(self.create_typed(kind, o).await?)
            }
            DependentObject::PersistentVolumeClaim(o) => {
                DependentObject::PersistentVolumeClaim(self.create_typed(kind, o).await?)
            }
            DependentObject::Deployment(o) => {
                DependentObject::Deployment(self.create_typed(kind, o).await?)
            }
            DependentObject::Service(o) => {
                DependentObject::Service(self.create_typed(kind, o).await?)
            }
            DependentObject::Ingress(o) => {
                DependentObject::Ingress(self.create_typed(kind, o).await?)
            }
        };
        Ok(created)
    }

    async fn replace(&self, object: &DependentObject) -> OperatorResult<DependentObject> {
        let kind = object.kind();
        let replaced = match object {
            DependentObject::ConfigMap(o) => {
                DependentObject::ConfigMap(self.replace_typed(kind, o).await?)
            }
            DependentObject::PersistentVolumeClaim(o) => {
                DependentObject::PersistentVolumeClaim(self.replace_typed(kind, o).await?)
            }
            DependentObject::Deployment(o) => {
                DependentObject::Deployment(self.replace_typed(kind, o).await?)
            }
            DependentObject::Service(o) => {
                DependentObject::Service(self.replace_typed(kind, o).await?)
            }
            DependentObject::Ingress(o) => {
                DependentObject::Ingress(self.replace_typed(kind, o).await?)
            }
        };
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::GhostAppPhase;
    use kube::core::ErrorResponse;
    use serde_json::json;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn conflicts_are_classified() {
        let err = classify(api_error(409), "Deployment", "blogs", "blog");
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Conflict writing Deployment/blog: boom");
    }

    #[test]
    fn server_errors_are_store_unavailable() {
        for code in [429, 500, 503] {
            let err = classify(api_error(code), "Service", "blogs", "blog");
            assert!(matches!(err, OperatorError::StoreUnavailable(_)), "code {code}");
        }
        let err = classify(api_error(422), "Service", "blogs", "blog");
        assert!(matches!(err, OperatorError::KubeError(_)));
    }

    #[test]
    fn running_status_patch_clears_reason() {
        let status = GhostAppStatus {
            replicas: 2,
            phase: Some(GhostAppPhase::Running),
            reason: None,
            observed_generation: Some(3),
        };
        assert_eq!(
            status_patch(&status).unwrap(),
            json!({"status": {
                "replicas": 2,
                "phase": "Running",
                "reason": null,
                "observedGeneration": 3
            }})
        );
    }
}
