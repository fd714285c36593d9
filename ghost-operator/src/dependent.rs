//! The five object kinds a GhostApp owns.
//!
//! [`DependentKind`] names a kind, [`DependentObject`] carries a live or
//! desired object of any kind, and [`Dependent`] ties each Kubernetes type to
//! its desired-state builder and its update policy.

use crate::crd::GhostApp;
use crate::error::{OperatorError, OperatorResult};
use crate::resources;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of object owned by a GhostApp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependentKind {
    /// Rendered Ghost config.
    ConfigMap,
    /// Content storage claim.
    PersistentVolumeClaim,
    /// Ghost workload.
    Deployment,
    /// In-cluster network endpoint.
    Service,
    /// External route.
    Ingress,
}

impl DependentKind {
    /// Every kind, in reconciliation order.
    pub const ALL: [DependentKind; 5] = [
        DependentKind::ConfigMap,
        DependentKind::PersistentVolumeClaim,
        DependentKind::Deployment,
        DependentKind::Service,
        DependentKind::Ingress,
    ];

    /// Name of this kind's object for the GhostApp called `app_name`.
    pub fn object_name(self, app_name: &str) -> String {
        match self {
            DependentKind::ConfigMap => resources::config_map_name(app_name),
            DependentKind::PersistentVolumeClaim => resources::pvc_name(app_name),
            DependentKind::Deployment | DependentKind::Service | DependentKind::Ingress => {
                app_name.to_string()
            }
        }
    }
}

impl fmt::Display for DependentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependentKind::ConfigMap => "ConfigMap",
            DependentKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            DependentKind::Deployment => "Deployment",
            DependentKind::Service => "Service",
            DependentKind::Ingress => "Ingress",
        };
        f.write_str(s)
    }
}

/// An object of one of the dependent kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum DependentObject {
    /// ConfigMap object.
    ConfigMap(ConfigMap),
    /// PersistentVolumeClaim object.
    PersistentVolumeClaim(PersistentVolumeClaim),
    /// Deployment object.
    Deployment(Deployment),
    /// Service object.
    Service(Service),
    /// Ingress object.
    Ingress(Ingress),
}

impl DependentObject {
    /// Kind tag.
    pub fn kind(&self) -> DependentKind {
        match self {
            DependentObject::ConfigMap(_) => DependentKind::ConfigMap,
            DependentObject::PersistentVolumeClaim(_) => DependentKind::PersistentVolumeClaim,
            DependentObject::Deployment(_) => DependentKind::Deployment,
            DependentObject::Service(_) => DependentKind::Service,
            DependentObject::Ingress(_) => DependentKind::Ingress,
        }
    }

    /// Object metadata.
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            DependentObject::ConfigMap(o) => &o.metadata,
            DependentObject::PersistentVolumeClaim(o) => &o.metadata,
            DependentObject::Deployment(o) => &o.metadata,
            DependentObject::Service(o) => &o.metadata,
            DependentObject::Ingress(o) => &o.metadata,
        }
    }

    /// Mutable object metadata.
    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            DependentObject::ConfigMap(o) => &mut o.metadata,
            DependentObject::PersistentVolumeClaim(o) => &mut o.metadata,
            DependentObject::Deployment(o) => &mut o.metadata,
            DependentObject::Service(o) => &mut o.metadata,
            DependentObject::Ingress(o) => &mut o.metadata,
        }
    }

    /// Object name, empty if unset.
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// Object namespace, empty if unset.
    pub fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }
}

/// Whether the object being mutated already exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Freshly built, about to be created.
    Absent,
    /// Fetched from the store.
    Live,
}

/// A Kubernetes type owned by a GhostApp.
pub trait Dependent: Resource<DynamicType = ()> + Default + Clone + PartialEq + Send {
    /// Kind tag for this type.
    const KIND: DependentKind;

    /// Whether an existing object is ever touched again after creation.
    const MUTABLE_AFTER_CREATE: bool = true;

    /// Desired state computed from the GhostApp.
    fn desired(app: &GhostApp) -> OperatorResult<Self>;

    /// Fold `desired` into `live` according to this kind's update policy.
    fn apply_update_policy(live: &mut Self, desired: Self, state: ObjectState);

    /// Wrap into the tagged enum.
    fn into_object(self) -> DependentObject;

    /// Unwrap from the tagged enum.
    fn from_object(object: DependentObject) -> OperatorResult<Self>;
}

/// Add desired labels and annotations without dropping ones set by others.
fn merge_metadata(live: &mut ObjectMeta, desired: ObjectMeta) {
    if let Some(labels) = desired.labels {
        live.labels.get_or_insert_with(Default::default).extend(labels);
    }
    if let Some(annotations) = desired.annotations {
        live.annotations
            .get_or_insert_with(Default::default)
            .extend(annotations);
    }
}

/// Requests are equal when they name the same resources in the same amounts,
/// whatever notation each quantity uses.
fn same_requests(
    live: Option<&BTreeMap<String, Quantity>>,
    desired: Option<&BTreeMap<String, Quantity>>,
) -> bool {
    match (live, desired) {
        (Some(live), Some(desired)) => {
            live.len() == desired.len()
                && live.iter().all(|(key, qty)| {
                    desired
                        .get(key)
                        .is_some_and(|d| resources::same_quantity(&qty.0, &d.0))
                })
        }
        (live, desired) => live == desired,
    }
}

fn unexpected(expected: DependentKind, object: &DependentObject) -> OperatorError {
    OperatorError::UnexpectedKind {
        expected,
        actual: object.kind(),
    }
}

impl Dependent for ConfigMap {
    const KIND: DependentKind = DependentKind::ConfigMap;

    fn desired(app: &GhostApp) -> OperatorResult<Self> {
        resources::build_configmap(app)
    }

    fn apply_update_policy(live: &mut Self, desired: Self, _state: ObjectState) {
        merge_metadata(&mut live.metadata, desired.metadata);
        live.data = desired.data;
    }

    fn into_object(self) -> DependentObject {
        DependentObject::ConfigMap(self)
    }

    fn from_object(object: DependentObject) -> OperatorResult<Self> {
        match object {
            DependentObject::ConfigMap(cm) => Ok(cm),
            other => Err(unexpected(Self::KIND, &other)),
        }
    }
}

impl Dependent for PersistentVolumeClaim {
    const KIND: DependentKind = DependentKind::PersistentVolumeClaim;

    fn desired(app: &GhostApp) -> OperatorResult<Self> {
        Ok(resources::build_pvc(app))
    }

    /// Access modes and storage class are immutable once bound; only the
    /// requested size follows the spec afterwards.
    fn apply_update_policy(live: &mut Self, desired: Self, state: ObjectState) {
        merge_metadata(&mut live.metadata, desired.metadata);
        match state {
            ObjectState::Absent => live.spec = desired.spec,
            ObjectState::Live => {
                let requests = desired
                    .spec
                    .and_then(|s| s.resources)
                    .and_then(|r| r.requests);
                let resources = live
                    .spec
                    .get_or_insert_with(Default::default)
                    .resources
                    .get_or_insert_with(Default::default);
                if !same_requests(resources.requests.as_ref(), requests.as_ref()) {
                    resources.requests = requests;
                }
            }
        }
    }

    fn into_object(self) -> DependentObject {
        DependentObject::PersistentVolumeClaim(self)
    }

    fn from_object(object: DependentObject) -> OperatorResult<Self> {
        match object {
            DependentObject::PersistentVolumeClaim(pvc) => Ok(pvc),
            other => Err(unexpected(Self::KIND, &other)),
        }
    }
}

impl Dependent for Deployment {
    const KIND: DependentKind = DependentKind::Deployment;

    fn desired(app: &GhostApp) -> OperatorResult<Self> {
        Ok(resources::build_deployment(app))
    }

    /// The selector is fixed at creation; the API server rejects changes to it.
    /// Afterwards only replicas and container images are reconciled.
    fn apply_update_policy(live: &mut Self, desired: Self, state: ObjectState) {
        if state == ObjectState::Absent {
            merge_metadata(&mut live.metadata, desired.metadata);
            live.spec = desired.spec;
            return;
        }

        let Some(desired_spec) = desired.spec else {
            return;
        };
        let desired_image = desired_spec
            .template
            .spec
            .as_ref()
            .and_then(|pod| pod.containers.first())
            .and_then(|c| c.image.clone());

        let Some(live_spec) = live.spec.as_mut() else {
            return;
        };
        if live_spec.replicas != desired_spec.replicas {
            live_spec.replicas = desired_spec.replicas;
        }
        if let Some(pod) = live_spec.template.spec.as_mut() {
            for container in pod.containers.iter_mut() {
                if container.image != desired_image {
                    container.image = desired_image.clone();
                }
            }
        }
    }

    fn into_object(self) -> DependentObject {
        DependentObject::Deployment(self)
    }

    fn from_object(object: DependentObject) -> OperatorResult<Self> {
        match object {
            DependentObject::Deployment(deploy) => Ok(deploy),
            other => Err(unexpected(Self::KIND, &other)),
        }
    }
}

impl Dependent for Service {
    const KIND: DependentKind = DependentKind::Service;
    const MUTABLE_AFTER_CREATE: bool = false;

    fn desired(app: &GhostApp) -> OperatorResult<Self> {
        Ok(resources::build_service(app))
    }

    fn apply_update_policy(live: &mut Self, desired: Self, state: ObjectState) {
        if state == ObjectState::Absent {
            merge_metadata(&mut live.metadata, desired.metadata);
            live.spec = desired.spec;
        }
    }

    fn into_object(self) -> DependentObject {
        DependentObject::Service(self)
    }

    fn from_object(object: DependentObject) -> OperatorResult<Self> {
        match object {
            DependentObject::Service(svc) => Ok(svc),
            other => Err(unexpected(Self::KIND, &other)),
        }
    }
}

impl Dependent for Ingress {
    const KIND: DependentKind = DependentKind::Ingress;

    fn desired(app: &GhostApp) -> OperatorResult<Self> {
        Ok(resources::build_ingress(app))
    }

    fn apply_update_policy(live: &mut Self, desired: Self, _state: ObjectState) {
        merge_metadata(&mut live.metadata, desired.metadata);
        live.spec = desired.spec;
    }

    fn into_object(self) -> DependentObject {
        DependentObject::Ingress(self)
    }

    fn from_object(object: DependentObject) -> OperatorResult<Self> {
        match object {
            DependentObject::Ingress(ing) => Ok(ing),
            other => Err(unexpected(Self::KIND, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::fixtures;

    #[test]
    fn object_names_per_kind() {
        assert_eq!(
            DependentKind::ConfigMap.object_name("blog"),
            "blog-ghost-config"
        );
        assert_eq!(
            DependentKind::PersistentVolumeClaim.object_name("blog"),
            "blog-ghost-content-pvc"
        );
        for kind in [
            DependentKind::Deployment,
            DependentKind::Service,
            DependentKind::Ingress,
        ] {
            assert_eq!(kind.object_name("blog"), "blog");
        }
    }

    #[test]
    fn from_object_rejects_other_kinds() {
        let svc = DependentObject::Service(Service::default());
        let err = ConfigMap::from_object(svc).unwrap_err();
        assert!(matches!(
            err,
            OperatorError::UnexpectedKind {
                expected: DependentKind::ConfigMap,
                actual: DependentKind::Service
            }
        ));
    }

    #[test]
    fn deployment_update_keeps_selector() {
        let app = fixtures::app("blog");
        let mut live = Deployment::desired(&app).unwrap();
        let original_selector = live.spec.as_ref().unwrap().selector.clone();
        // Simulate a selector written by an older operator version.
        live.spec.as_mut().unwrap().selector.match_labels =
            Some([("legacy".to_string(), "true".to_string())].into());

        let mut changed = app.clone();
        changed.spec.replicas = 3;
        changed.spec.image = "ghost:4".into();
        Deployment::apply_update_policy(
            &mut live,
            Deployment::desired(&changed).unwrap(),
            ObjectState::Live,
        );

        let spec = live.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(
            spec.template.spec.unwrap().containers[0].image.as_deref(),
            Some("ghost:4")
        );
        assert_ne!(spec.selector, original_selector);
        assert_eq!(
            spec.selector.match_labels.unwrap()["legacy"],
            "true".to_string()
        );
    }

    #[test]
    fn deployment_update_ignores_other_fields() {
        let app = fixtures::app("blog");
        let mut live = Deployment::desired(&app).unwrap();
        live.spec.as_mut().unwrap().revision_history_limit = Some(2);
        let before = live.clone();

        Deployment::apply_update_policy(
            &mut live,
            Deployment::desired(&app).unwrap(),
            ObjectState::Live,
        );
        assert_eq!(live, before);
    }

    #[test]
    fn pvc_update_only_touches_requests() {
        let mut app = fixtures::app("blog");
        app.spec.persistent.enabled = true;
        let mut live = PersistentVolumeClaim::desired(&app).unwrap();

        app.spec.persistent.size = "20Gi".into();
        app.spec.persistent.storage_class = Some("other".into());
        PersistentVolumeClaim::apply_update_policy(
            &mut live,
            PersistentVolumeClaim::desired(&app).unwrap(),
            ObjectState::Live,
        );

        let spec = live.spec.unwrap();
        assert_eq!(spec.storage_class_name, None);
        let requests = spec.resources.unwrap().requests.unwrap();
        assert_eq!(requests["storage"].0, "20Gi");
    }

    #[test]
    fn pvc_update_ignores_canonicalized_size() {
        let mut app = fixtures::app("blog");
        app.spec.persistent.enabled = true;
        app.spec.persistent.size = "1.5Gi".into();
        let mut live = PersistentVolumeClaim::desired(&app).unwrap();
        // The API server hands the request back in canonical form.
        let resources = live.spec.as_mut().unwrap().resources.as_mut().unwrap();
        resources.requests = Some(BTreeMap::from([(
            "storage".to_string(),
            Quantity("1536Mi".to_string()),
        )]));
        let before = live.clone();

        PersistentVolumeClaim::apply_update_policy(
            &mut live,
            PersistentVolumeClaim::desired(&app).unwrap(),
            ObjectState::Live,
        );
        assert_eq!(live, before);
    }

    #[test]
    fn labels_merge_without_dropping_foreign_ones() {
        let app = fixtures::app("blog");
        let mut live = ConfigMap::default();
        live.metadata.labels = Some([("team".to_string(), "web".to_string())].into());

        ConfigMap::apply_update_policy(
            &mut live,
            ConfigMap::desired(&app).unwrap(),
            ObjectState::Live,
        );
        let labels = live.metadata.labels.unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels["team"], "web");
    }
}
