//! Desired-state builders for the objects a GhostApp owns.
//!
//! Every builder is a pure function of the GhostApp: no I/O, no clocks, no
//! randomness. Two calls with the same resource produce identical objects.

mod configmap;
mod deployment;
mod ingress;
mod pvc;
mod quantity;
mod service;

pub use configmap::{build_configmap, render_config};
pub use deployment::build_deployment;
pub use ingress::build_ingress;
pub use pvc::build_pvc;
pub use quantity::{is_valid_quantity, same_quantity};
pub use service::build_service;

use crate::crd::GhostApp;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Port Ghost listens on inside the container.
pub const GHOST_PORT: i32 = 2368;

/// Name of the HTTP port on the container and the Service.
pub const HTTP_PORT_NAME: &str = "http";

/// Value of the `app.kubernetes.io/name` label on every dependent.
pub const APP_NAME: &str = "ghostapp";

/// Label key carrying [`APP_NAME`].
pub const NAME_LABEL: &str = "app.kubernetes.io/name";

/// Label key carrying the GhostApp name.
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Key of the Ghost config inside the ConfigMap.
pub const CONFIG_FILE: &str = "config.json";

/// Where the ConfigMap is mounted.
pub const CONFIG_MOUNT_PATH: &str = "/etc/ghost/config";

/// Where Ghost keeps its content.
pub const CONTENT_MOUNT_PATH: &str = "/var/lib/ghost/content";

/// Path Ghost reads its production config from.
pub const RUNTIME_CONFIG_PATH: &str = "/var/lib/ghost/config.production.json";

const CONFIG_MAP_SUFFIX: &str = "-ghost-config";
const PVC_SUFFIX: &str = "-ghost-content-pvc";

/// Labels shared by every dependent; also the pod and Service selector.
pub fn labels(app: &GhostApp) -> BTreeMap<String, String> {
    BTreeMap::from([
        (NAME_LABEL.to_string(), APP_NAME.to_string()),
        (INSTANCE_LABEL.to_string(), app.name_any()),
    ])
}

/// Name of the config ConfigMap.
pub fn config_map_name(app_name: &str) -> String {
    format!("{app_name}{CONFIG_MAP_SUFFIX}")
}

/// Name of the content PersistentVolumeClaim.
pub fn pvc_name(app_name: &str) -> String {
    format!("{app_name}{PVC_SUFFIX}")
}

fn object_meta(app: &GhostApp, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: app.namespace(),
        labels: Some(labels(app)),
        ..Default::default()
    }
}
